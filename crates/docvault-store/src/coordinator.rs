//! Transaction coordinator.
//!
//! An insert is an explicit ordered [`InsertPlan`]: the main row, then the
//! author's owner entry, then each child. All steps share one
//! `BEGIN IMMEDIATE` transaction; dropping the handle on any early exit
//! rolls the whole unit back.
//!
//! Gated mutations read the acting principal's access entry inside the same
//! immediate transaction as the statement they gate, so no other writer can
//! change the entry between the check and the write.

use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};

use docvault_core::{
    AccessEntry, ChildRecord, DocumentBody, DocumentId, DocumentKind, DocumentMeta, EntityNaming,
    PrincipalId,
};
use docvault_perms::GateDecision;

use crate::codec::{self, id_param, to_sql};
use crate::error::{Result, StoreError};
use crate::statements::KindStatements;
use crate::traits::WriteOutcome;

/// One step of an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteStep {
    InsertDocument {
        id: DocumentId,
        meta: DocumentMeta,
        body: DocumentBody,
    },
    GrantOwner(AccessEntry),
    InsertChild(ChildRecord),
}

impl WriteStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InsertDocument { .. } => "insert_document",
            Self::GrantOwner(_) => "grant_owner",
            Self::InsertChild(_) => "insert_child",
        }
    }

    /// The table this step writes to.
    pub fn table(&self, naming: &EntityNaming) -> &'static str {
        match self {
            Self::InsertDocument { .. } => naming.main_table,
            Self::GrantOwner(_) => naming.access_table,
            Self::InsertChild(_) => naming.child_table().unwrap_or("<none>"),
        }
    }
}

/// Ordered steps creating one document.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    kind: DocumentKind,
    id: DocumentId,
    steps: Vec<WriteStep>,
}

impl InsertPlan {
    /// Plan the insert of `body` by `author` at `now`.
    pub fn new(
        body: DocumentBody,
        author: PrincipalId,
        now: i64,
        children: Vec<ChildRecord>,
    ) -> Self {
        let kind = body.kind();
        let id = DocumentId::generate();
        let mut steps = Vec::with_capacity(children.len() + 2);
        steps.push(WriteStep::InsertDocument {
            id,
            meta: DocumentMeta::created(author, now),
            body,
        });
        steps.push(WriteStep::GrantOwner(AccessEntry::owner(id, author)));
        steps.extend(children.into_iter().map(WriteStep::InsertChild));
        Self { kind, id, steps }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn steps(&self) -> &[WriteStep] {
        &self.steps
    }

    /// Number of child steps.
    pub fn child_count(&self) -> usize {
        self.steps.len().saturating_sub(2)
    }
}

/// Runs insert plans and gated mutations against one kind's statements.
pub struct TransactionCoordinator<'a> {
    stmts: &'a KindStatements,
}

impl<'a> TransactionCoordinator<'a> {
    pub fn new(stmts: &'a KindStatements) -> Self {
        Self { stmts }
    }

    /// Execute `plan` as one unit and return the stored id.
    pub fn insert(&self, conn: &mut Connection, plan: &InsertPlan) -> Result<DocumentId> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        for step in plan.steps() {
            self.apply_step(&tx, plan.id(), step).map_err(|source| {
                let table = step.table(&self.stmts.naming);
                tracing::error!(
                    kind = %plan.kind(),
                    id = %plan.id(),
                    step = step.name(),
                    table,
                    error = %source,
                    "insert step failed, rolling back"
                );
                StoreError::WriteStep {
                    step: step.name(),
                    table,
                    source: Box::new(source),
                }
            })?;
        }

        tx.commit()?;
        tracing::debug!(
            kind = %plan.kind(),
            id = %plan.id(),
            children = plan.child_count(),
            "committed insert"
        );
        Ok(plan.id())
    }

    fn apply_step(&self, tx: &Transaction<'_>, id: DocumentId, step: &WriteStep) -> Result<()> {
        match step {
            WriteStep::InsertDocument { id, meta, body } => {
                let mut values = vec![
                    rusqlite::types::Value::Text(id_param(*id)),
                    meta.author.get().into(),
                    meta.reg_date.into(),
                    meta.last_mod_user.get().into(),
                    meta.last_mod_date.into(),
                ];
                values.extend(body.encode().iter().map(to_sql));

                let mut stmt = tx.prepare_cached(&self.stmts.insert)?;
                let stored: String =
                    stmt.query_row(params_from_iter(values), |row| row.get(0))?;
                if codec::document_id(&stored)? != *id {
                    return Err(StoreError::InvalidData(format!(
                        "insert returned id {stored}, expected {id}"
                    )));
                }
                Ok(())
            }
            WriteStep::GrantOwner(entry) => {
                let mut stmt = tx.prepare_cached(&self.stmts.insert_access)?;
                stmt.execute(rusqlite::params![
                    entry.reader.get(),
                    id_param(entry.document),
                    entry.can_edit,
                    entry.can_delete
                ])?;
                Ok(())
            }
            WriteStep::InsertChild(record) => {
                let sql = self.stmts.child.as_ref().ok_or_else(|| {
                    StoreError::InvalidData(format!("{} has no child table", self.stmts.kind))
                })?;
                let mut values = vec![rusqlite::types::Value::Text(id_param(id))];
                values.extend(record.encode().iter().map(to_sql));

                let mut stmt = tx.prepare_cached(&sql.insert)?;
                stmt.execute(params_from_iter(values))?;
                Ok(())
            }
        }
    }

    /// Run `apply` inside an immediate transaction if `decide` allows it.
    ///
    /// `decide` sees the principal's own entry and whether the document
    /// exists. Anything but [`GateDecision::Allowed`] rolls back untouched.
    pub fn gated<D, F>(
        &self,
        conn: &mut Connection,
        id: DocumentId,
        principal: PrincipalId,
        decide: D,
        apply: F,
    ) -> Result<WriteOutcome>
    where
        D: FnOnce(Option<&AccessEntry>, bool) -> GateDecision,
        F: FnOnce(&Transaction<'_>, &KindStatements) -> Result<()>,
    {
        self.gated_on(
            conn,
            id,
            principal,
            principal,
            |own, _, exists| decide(own, exists),
            apply,
        )
    }

    /// Like [`gated`](Self::gated) for mutations of another principal's
    /// entry: `decide` also sees `target`'s current entry, read in the same
    /// transaction.
    pub fn gated_on<D, F>(
        &self,
        conn: &mut Connection,
        id: DocumentId,
        principal: PrincipalId,
        target: PrincipalId,
        decide: D,
        apply: F,
    ) -> Result<WriteOutcome>
    where
        D: FnOnce(Option<&AccessEntry>, Option<&AccessEntry>, bool) -> GateDecision,
        F: FnOnce(&Transaction<'_>, &KindStatements) -> Result<()>,
    {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let entry = codec::access_entry(&tx, self.stmts, id, principal)?;
        let target_entry = if target == principal {
            entry
        } else {
            codec::access_entry(&tx, self.stmts, id, target)?
        };
        let exists = entry.is_some()
            || target_entry.is_some()
            || codec::document_exists(&tx, self.stmts, id)?;
        let decision = decide(entry.as_ref(), target_entry.as_ref(), exists);

        if decision.is_allowed() {
            apply(&tx, self.stmts)?;
            tx.commit()?;
        }
        Ok(decision.into())
    }
}
