//! Documents: the stored read model and the kind-tagged payload.

use serde::{Deserialize, Serialize};

use crate::access::AccessEntry;
use crate::body::{Consuming, Owner, Project, Task, Vehicle};
use crate::error::Result;
use crate::fields::{FieldReader, FieldValue};
use crate::kind::DocumentKind;
use crate::naming::ColumnDef;
use crate::types::{DocumentId, PrincipalId};

/// Bookkeeping columns shared by every document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub author: PrincipalId,
    /// Creation time (Unix ms).
    pub reg_date: i64,
    pub last_mod_user: PrincipalId,
    /// Last modification time (Unix ms).
    pub last_mod_date: i64,
}

impl DocumentMeta {
    /// Metadata of a document created by `author` at `now`.
    pub const fn created(author: PrincipalId, now: i64) -> Self {
        Self {
            author,
            reg_date: now,
            last_mod_user: author,
            last_mod_date: now,
        }
    }
}

/// Kind-specific payload of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentBody {
    Task(Task),
    Project(Project),
    Vehicle(Vehicle),
    Owner(Owner),
    Consuming(Consuming),
}

impl DocumentBody {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Task(_) => DocumentKind::Task,
            Self::Project(_) => DocumentKind::Project,
            Self::Vehicle(_) => DocumentKind::Vehicle,
            Self::Owner(_) => DocumentKind::Owner,
            Self::Consuming(_) => DocumentKind::Consuming,
        }
    }

    /// Encode to column values in registration order.
    pub fn encode(&self) -> Vec<FieldValue> {
        match self {
            Self::Task(b) => b.encode(),
            Self::Project(b) => b.encode(),
            Self::Vehicle(b) => b.encode(),
            Self::Owner(b) => b.encode(),
            Self::Consuming(b) => b.encode(),
        }
    }

    /// Decode a payload of `kind` from column values.
    pub fn decode(kind: DocumentKind, columns: &[ColumnDef], values: &[FieldValue]) -> Result<Self> {
        let mut r = FieldReader::new(columns, values)?;
        Ok(match kind {
            DocumentKind::Task => Self::Task(Task::decode(&mut r)?),
            DocumentKind::Project => Self::Project(Project::decode(&mut r)?),
            DocumentKind::Vehicle => Self::Vehicle(Vehicle::decode(&mut r)?),
            DocumentKind::Owner => Self::Owner(Owner::decode(&mut r)?),
            DocumentKind::Consuming => Self::Consuming(Consuming::decode(&mut r)?),
        })
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_consuming(&self) -> Option<&Consuming> {
        match self {
            Self::Consuming(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Task> for DocumentBody {
    fn from(body: Task) -> Self {
        Self::Task(body)
    }
}

impl From<Project> for DocumentBody {
    fn from(body: Project) -> Self {
        Self::Project(body)
    }
}

impl From<Vehicle> for DocumentBody {
    fn from(body: Vehicle) -> Self {
        Self::Vehicle(body)
    }
}

impl From<Owner> for DocumentBody {
    fn from(body: Owner) -> Self {
        Self::Owner(body)
    }
}

impl From<Consuming> for DocumentBody {
    fn from(body: Consuming) -> Self {
        Self::Consuming(body)
    }
}

/// A stored document as seen by one principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub meta: DocumentMeta,
    pub body: DocumentBody,
    /// The reading principal's own entry; the row that made this visible.
    pub access: AccessEntry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::standard_naming;
    use serde_json::json;
    use uuid::Uuid;

    fn roundtrip(body: DocumentBody) -> DocumentBody {
        let kind = body.kind();
        let naming = standard_naming(kind);
        let values = body.encode();
        assert_eq!(values.len(), naming.columns.len(), "{kind} column count");
        DocumentBody::decode(kind, naming.columns, &values).unwrap()
    }

    #[test]
    fn test_every_kind_matches_its_columns() {
        let mut consuming = Consuming::new(Uuid::new_v4(), 1200.5, 40.0, 61.2);
        consuming
            .add_info
            .insert("station".into(), json!("north"));

        let bodies: Vec<DocumentBody> = vec![
            Task::new("Fix bug").priority(1).project(Uuid::new_v4()).into(),
            Project::new("Apollo").into(),
            Vehicle::new(Uuid::new_v4()).into(),
            Owner::new("@driver").into(),
            consuming.into(),
        ];

        for body in bodies {
            assert_eq!(roundtrip(body.clone()), body);
        }
    }

    #[test]
    fn test_body_serde_is_kind_tagged() {
        let body: DocumentBody = Task::new("Write docs").into();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["kind"], "task");
        assert_eq!(value["title"], "Write docs");
    }

    #[test]
    fn test_decode_with_wrong_kind_fails() {
        let body: DocumentBody = Owner::new("@someone").into();
        let values = body.encode();
        let task_columns = standard_naming(DocumentKind::Task).columns;
        assert!(DocumentBody::decode(DocumentKind::Task, task_columns, &values).is_err());
    }
}
