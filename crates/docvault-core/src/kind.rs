//! Document kinds: the logical entity types that map onto table families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A logical document type.
///
/// Each kind maps to exactly one table family (main table, access table,
/// optional child table) through the [`EntityRegistry`](crate::EntityRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    // Project tracking
    /// A unit of work inside a project.
    Task,
    /// A project grouping tasks.
    Project,

    // Vehicle tracking
    /// A tracked vehicle.
    Vehicle,
    /// A vehicle owner.
    Owner,
    /// A fuel consumption record for a vehicle.
    Consuming,
}

impl DocumentKind {
    /// All kinds, in registration order.
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Task,
        DocumentKind::Project,
        DocumentKind::Vehicle,
        DocumentKind::Owner,
        DocumentKind::Consuming,
    ];

    /// Stable lowercase name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Vehicle => "vehicle",
            Self::Owner => "owner",
            Self::Consuming => "consuming",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownKind(s.to_string()))
    }
}
