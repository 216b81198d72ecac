//! Entity naming: document kind to table family resolution.
//!
//! Every document kind owns a main table, an access table holding the
//! per-principal ledger, and optionally one child table. Registrations are
//! made once at process start through [`EntityRegistryBuilder`] and validated
//! before anything can query with them; the resulting [`EntityRegistry`] is
//! immutable.
//!
//! Table and column names are only ever taken from this registry, so SQL
//! text built from it cannot carry caller-supplied identifiers.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, Result};
use crate::kind::DocumentKind;

/// Columns every main table carries, in select order.
pub const META_COLUMNS: [&str; 5] = ["id", "author", "reg_date", "last_mod_user", "last_mod_date"];

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    /// SQL type name used in DDL.
    pub fn sql_name(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

/// One kind-specific column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    /// Whether the column is `NOT NULL`.
    pub required: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            required: false,
        }
    }
}

/// Shape of the rows held by a child table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildShape {
    /// Task to label association.
    Label,
    /// Image attached to a consumption record.
    Image,
}

impl ChildShape {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Image => "image",
        }
    }
}

/// A child table owned by a document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildTable {
    pub name: &'static str,
    /// Column referencing the parent document id.
    pub parent_column: &'static str,
    pub shape: ChildShape,
    pub columns: &'static [ColumnDef],
    /// Columns forming a uniqueness constraint together with the parent column.
    pub unique: &'static [&'static str],
}

/// The static table family of one document kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNaming {
    pub main_table: &'static str,
    pub access_table: &'static str,
    /// Kind-specific columns in body encoding order.
    pub columns: &'static [ColumnDef],
    pub child: Option<ChildTable>,
    /// Body columns usable for reference listings.
    pub lookups: &'static [&'static str],
}

impl EntityNaming {
    /// Names of the kind-specific columns, in body encoding order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// Child table name, if this kind owns children.
    pub fn child_table(&self) -> Option<&'static str> {
        self.child.as_ref().map(|c| c.name)
    }

    /// Whether `column` is a registered lookup column.
    pub fn has_lookup(&self, column: &str) -> bool {
        self.lookups.iter().any(|l| *l == column)
    }

    fn tables(&self) -> impl Iterator<Item = &'static str> + '_ {
        [self.main_table, self.access_table]
            .into_iter()
            .chain(self.child_table())
    }
}

/// Immutable kind → table family mapping.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    entries: BTreeMap<DocumentKind, EntityNaming>,
}

impl EntityRegistry {
    /// Start building a registry.
    pub fn builder() -> EntityRegistryBuilder {
        EntityRegistryBuilder::default()
    }

    /// Registry with every built-in kind registered under its standard tables.
    pub fn standard() -> Self {
        let mut builder = Self::builder();
        for kind in DocumentKind::ALL {
            builder = builder.register(kind, standard_naming(kind));
        }
        // The standard tables are fixed and known to be valid.
        builder
            .build()
            .unwrap_or_else(|e| unreachable!("standard registry is invalid: {e}"))
    }

    /// Resolve a kind to its table family.
    pub fn resolve(&self, kind: DocumentKind) -> Result<&EntityNaming> {
        self.entries
            .get(&kind)
            .ok_or_else(|| CoreError::UnknownKind(kind.as_str().to_string()))
    }

    /// Registered kinds, in kind order.
    pub fn kinds(&self) -> impl Iterator<Item = DocumentKind> + '_ {
        self.entries.keys().copied()
    }

    /// Iterate over all registrations.
    pub fn iter(&self) -> impl Iterator<Item = (DocumentKind, &EntityNaming)> {
        self.entries.iter().map(|(k, n)| (*k, n))
    }
}

/// Builder for [`EntityRegistry`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct EntityRegistryBuilder {
    entries: Vec<(DocumentKind, EntityNaming)>,
}

impl EntityRegistryBuilder {
    /// Register a table family for a kind.
    pub fn register(mut self, kind: DocumentKind, naming: EntityNaming) -> Self {
        self.entries.push((kind, naming));
        self
    }

    /// Validate all registrations and freeze them.
    pub fn build(self) -> Result<EntityRegistry> {
        let mut entries = BTreeMap::new();
        let mut tables = BTreeSet::new();

        for (kind, naming) in self.entries {
            validate_naming(kind, &naming)?;

            for table in naming.tables() {
                if !tables.insert(table) {
                    return Err(CoreError::InvalidRegistry(format!(
                        "table `{table}` is registered more than once"
                    )));
                }
            }

            if entries.insert(kind, naming).is_some() {
                return Err(CoreError::InvalidRegistry(format!(
                    "kind `{kind}` is registered more than once"
                )));
            }
        }

        Ok(EntityRegistry { entries })
    }
}

fn validate_naming(kind: DocumentKind, naming: &EntityNaming) -> Result<()> {
    for table in naming.tables() {
        check_identifier(kind, table)?;
    }

    let mut seen = BTreeSet::new();
    for column in naming.columns {
        check_identifier(kind, column.name)?;
        if META_COLUMNS.contains(&column.name) || !seen.insert(column.name) {
            return Err(CoreError::InvalidRegistry(format!(
                "{kind}: column `{}` is duplicated or shadows a meta column",
                column.name
            )));
        }
    }

    for lookup in naming.lookups {
        if !seen.contains(lookup) {
            return Err(CoreError::InvalidRegistry(format!(
                "{kind}: lookup `{lookup}` is not a body column"
            )));
        }
    }

    if let Some(child) = &naming.child {
        check_identifier(kind, child.parent_column)?;
        let mut child_columns = BTreeSet::from([child.parent_column]);
        for column in child.columns {
            check_identifier(kind, column.name)?;
            if !child_columns.insert(column.name) {
                return Err(CoreError::InvalidRegistry(format!(
                    "{kind}: child column `{}` is duplicated",
                    column.name
                )));
            }
        }
        if let Some(missing) = child.unique.iter().find(|u| !child_columns.contains(*u)) {
            return Err(CoreError::InvalidRegistry(format!(
                "{kind}: unique column `{missing}` is not a child column"
            )));
        }
    }

    Ok(())
}

fn check_identifier(kind: DocumentKind, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_lowercase())
        && chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidRegistry(format!(
            "{kind}: `{name}` is not a valid identifier"
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Standard table families
// ─────────────────────────────────────────────────────────────────────────────

use ColumnType::{Blob, Integer, Real, Text};

const TASK_COLUMNS: &[ColumnDef] = &[
    ColumnDef::optional("reg_number", Text),
    ColumnDef::required("title", Text),
    ColumnDef::optional("body", Text),
    ColumnDef::optional("assignee", Integer),
    ColumnDef::optional("project_id", Text),
    ColumnDef::optional("parent_id", Text),
    ColumnDef::optional("task_type_id", Text),
    ColumnDef::optional("target_date", Integer),
    ColumnDef::optional("start_date", Integer),
    ColumnDef::required("status", Integer),
    ColumnDef::optional("status_date", Integer),
    ColumnDef::required("priority", Integer),
    ColumnDef::optional("cancel_comment", Text),
];

const TASK_LABEL_COLUMNS: &[ColumnDef] = &[ColumnDef::required("label_id", Text)];

const PROJECT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("name", Text),
    ColumnDef::required("status", Integer),
    ColumnDef::optional("finish_date", Integer),
    ColumnDef::optional("manager", Integer),
    ColumnDef::optional("coder", Integer),
    ColumnDef::optional("tester", Integer),
];

const VEHICLE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("owner_id", Text),
    ColumnDef::optional("vin", Text),
    ColumnDef::optional("brand", Text),
    ColumnDef::optional("model", Text),
    ColumnDef::optional("fuel_type", Text),
    ColumnDef::required("status", Integer),
];

const OWNER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("telegram_name", Text),
    ColumnDef::optional("full_name", Text),
    ColumnDef::optional("email", Text),
    ColumnDef::optional("country", Text),
];

const CONSUMING_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("vehicle_id", Text),
    ColumnDef::required("status", Integer),
    ColumnDef::required("total_km", Real),
    ColumnDef::required("last_liters", Real),
    ColumnDef::required("last_cost", Real),
    ColumnDef::optional("event_date", Integer),
    ColumnDef::required("add_info", Text),
];

const CONSUMING_IMAGE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::required("image_data", Blob),
    ColumnDef::required("type", Text),
    ColumnDef::required("confidence", Real),
    ColumnDef::required("add_info", Text),
    ColumnDef::optional("description", Text),
    ColumnDef::required("num_of_seq", Integer),
];

/// The standard table family for a kind.
pub fn standard_naming(kind: DocumentKind) -> EntityNaming {
    match kind {
        DocumentKind::Task => EntityNaming {
            main_table: "prj__tasks",
            access_table: "prj__task_readers",
            columns: TASK_COLUMNS,
            child: Some(ChildTable {
                name: "prj__task_labels",
                parent_column: "task_id",
                shape: ChildShape::Label,
                columns: TASK_LABEL_COLUMNS,
                unique: &["label_id"],
            }),
            lookups: &["project_id", "assignee"],
        },
        DocumentKind::Project => EntityNaming {
            main_table: "prj__projects",
            access_table: "prj__project_readers",
            columns: PROJECT_COLUMNS,
            child: None,
            lookups: &["manager"],
        },
        DocumentKind::Vehicle => EntityNaming {
            main_table: "qtracker__vehicles",
            access_table: "qtracker__vehicle_readers",
            columns: VEHICLE_COLUMNS,
            child: None,
            lookups: &["owner_id"],
        },
        DocumentKind::Owner => EntityNaming {
            main_table: "qtracker__owners",
            access_table: "qtracker__owner_readers",
            columns: OWNER_COLUMNS,
            child: None,
            lookups: &["telegram_name"],
        },
        DocumentKind::Consuming => EntityNaming {
            main_table: "qtracker__consumings",
            access_table: "qtracker__consuming_readers",
            columns: CONSUMING_COLUMNS,
            child: Some(ChildTable {
                name: "qtracker__consuming_images",
                parent_column: "consuming_id",
                shape: ChildShape::Image,
                columns: CONSUMING_IMAGE_COLUMNS,
                unique: &[],
            }),
            lookups: &["vehicle_id"],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_resolves_every_kind() {
        let registry = EntityRegistry::standard();
        for kind in DocumentKind::ALL {
            let naming = registry.resolve(kind).unwrap();
            assert!(naming.access_table.ends_with("_readers"));
        }
        assert_eq!(
            registry.resolve(DocumentKind::Task).unwrap().child_table(),
            Some("prj__task_labels")
        );
        assert_eq!(registry.resolve(DocumentKind::Vehicle).unwrap().child_table(), None);
    }

    #[test]
    fn test_unregistered_kind_is_unknown() {
        let registry = EntityRegistry::builder()
            .register(DocumentKind::Task, standard_naming(DocumentKind::Task))
            .build()
            .unwrap();

        let err = registry.resolve(DocumentKind::Vehicle).unwrap_err();
        assert!(matches!(err, CoreError::UnknownKind(name) if name == "vehicle"));
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec![DocumentKind::Task]);
    }

    #[test]
    fn test_rejects_invalid_table_name() {
        let mut naming = standard_naming(DocumentKind::Project);
        naming.main_table = "projects; DROP TABLE users";
        let err = EntityRegistry::builder()
            .register(DocumentKind::Project, naming)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRegistry(_)));
    }

    #[test]
    fn test_rejects_shared_tables() {
        let mut vehicle = standard_naming(DocumentKind::Vehicle);
        vehicle.access_table = "prj__project_readers";
        let err = EntityRegistry::builder()
            .register(DocumentKind::Project, standard_naming(DocumentKind::Project))
            .register(DocumentKind::Vehicle, vehicle)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRegistry(msg) if msg.contains("prj__project_readers")));
    }

    #[test]
    fn test_rejects_duplicate_kind() {
        let err = EntityRegistry::builder()
            .register(DocumentKind::Owner, standard_naming(DocumentKind::Owner))
            .register(DocumentKind::Owner, standard_naming(DocumentKind::Owner))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRegistry(_)));
    }

    #[test]
    fn test_rejects_lookup_outside_columns() {
        let mut owner = standard_naming(DocumentKind::Owner);
        owner.lookups = &["author"];
        let err = EntityRegistry::builder()
            .register(DocumentKind::Owner, owner)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRegistry(msg) if msg.contains("author")));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(check_identifier(DocumentKind::Task, "prj__tasks").is_ok());
        assert!(check_identifier(DocumentKind::Task, "_x9").is_ok());
        assert!(check_identifier(DocumentKind::Task, "9x").is_err());
        assert!(check_identifier(DocumentKind::Task, "Tasks").is_err());
        assert!(check_identifier(DocumentKind::Task, "").is_err());
    }
}
