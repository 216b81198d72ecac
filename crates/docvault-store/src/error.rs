//! Error types for the store module.

use rusqlite::ErrorCode;
use thiserror::Error;

use docvault_core::CoreError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A step of a multi-table write failed; the whole unit was rolled back.
    #[error("write step `{step}` on `{table}` failed: {source}")]
    WriteStep {
        step: &'static str,
        table: &'static str,
        source: Box<StoreError>,
    },

    /// A uniqueness or reference constraint was violated.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The kind is not registered with this store.
    #[error("unknown document kind: {0}")]
    UnknownKind(String),

    /// The registry handed to the store is malformed.
    #[error("invalid registry: {0}")]
    Registry(String),

    /// Connection pool failure (closed pool, failed blocking task).
    #[error("connection pool error: {0}")]
    Pool(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error, or the step failure it wraps, is a constraint violation.
    pub fn is_constraint(&self) -> bool {
        match self {
            Self::Constraint(_) => true,
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == ErrorCode::ConstraintViolation
            }
            Self::WriteStep { source, .. } => source.is_constraint(),
            _ => false,
        }
    }

    /// The failing write step, if this is a step failure.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            Self::WriteStep { step, .. } => Some(step),
            _ => None,
        }
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownKind(kind) => Self::UnknownKind(kind),
            CoreError::InvalidRegistry(msg) => Self::Registry(msg),
            CoreError::Decode(msg) => Self::InvalidData(msg),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_detection_through_step() {
        let err = StoreError::WriteStep {
            step: "insert_child",
            table: "prj__task_labels",
            source: Box::new(StoreError::Constraint("duplicate label".into())),
        };
        assert!(err.is_constraint());
        assert_eq!(err.step(), Some("insert_child"));
        assert!(!StoreError::Pool("closed".into()).is_constraint());
    }

    #[test]
    fn test_core_errors_map() {
        let err: StoreError = CoreError::UnknownKind("widget".into()).into();
        assert!(matches!(err, StoreError::UnknownKind(k) if k == "widget"));
        let err: StoreError = CoreError::Decode("bad".into()).into();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }
}
