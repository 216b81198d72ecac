//! Kind-specific document payloads.
//!
//! Each struct encodes to the column order of its standard table family
//! (see [`crate::naming`]) and decodes back from it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::fields::{FieldReader, FieldValue};
use crate::types::PrincipalId;

/// A unit of work inside a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub reg_number: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub assignee: Option<PrincipalId>,
    pub project: Option<Uuid>,
    pub parent: Option<Uuid>,
    pub task_type: Option<Uuid>,
    pub target_date: Option<i64>,
    pub start_date: Option<i64>,
    pub status: i32,
    pub status_date: Option<i64>,
    pub priority: i32,
    pub cancel_comment: Option<String>,
}

impl Task {
    /// Create a task with a title and default status/priority.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn assignee(mut self, assignee: PrincipalId) -> Self {
        self.assignee = Some(assignee);
        self
    }

    pub fn project(mut self, project: Uuid) -> Self {
        self.project = Some(project);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub(crate) fn encode(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::opt_text(self.reg_number.as_deref()),
            FieldValue::text(self.title.as_str()),
            FieldValue::opt_text(self.body.as_deref()),
            FieldValue::opt_principal(self.assignee),
            FieldValue::opt_uuid(self.project),
            FieldValue::opt_uuid(self.parent),
            FieldValue::opt_uuid(self.task_type),
            FieldValue::opt_int(self.target_date),
            FieldValue::opt_int(self.start_date),
            self.status.into(),
            FieldValue::opt_int(self.status_date),
            self.priority.into(),
            FieldValue::opt_text(self.cancel_comment.as_deref()),
        ]
    }

    pub(crate) fn decode(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            reg_number: r.opt_text()?,
            title: r.text()?,
            body: r.opt_text()?,
            assignee: r.opt_principal()?,
            project: r.opt_uuid()?,
            parent: r.opt_uuid()?,
            task_type: r.opt_uuid()?,
            target_date: r.opt_int()?,
            start_date: r.opt_int()?,
            status: r.small_int()?,
            status_date: r.opt_int()?,
            priority: r.small_int()?,
            cancel_comment: r.opt_text()?,
        })
    }
}

/// A project grouping tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub status: i32,
    pub finish_date: Option<i64>,
    pub manager: Option<PrincipalId>,
    pub coder: Option<PrincipalId>,
    pub tester: Option<PrincipalId>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn encode(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::text(self.name.as_str()),
            self.status.into(),
            FieldValue::opt_int(self.finish_date),
            FieldValue::opt_principal(self.manager),
            FieldValue::opt_principal(self.coder),
            FieldValue::opt_principal(self.tester),
        ]
    }

    pub(crate) fn decode(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.text()?,
            status: r.small_int()?,
            finish_date: r.opt_int()?,
            manager: r.opt_principal()?,
            coder: r.opt_principal()?,
            tester: r.opt_principal()?,
        })
    }
}

/// A tracked vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub owner: Uuid,
    pub vin: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub fuel_type: Option<String>,
    pub status: i32,
}

impl Vehicle {
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            ..Self::default()
        }
    }

    pub(crate) fn encode(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::uuid(self.owner),
            FieldValue::opt_text(self.vin.as_deref()),
            FieldValue::opt_text(self.brand.as_deref()),
            FieldValue::opt_text(self.model.as_deref()),
            FieldValue::opt_text(self.fuel_type.as_deref()),
            self.status.into(),
        ]
    }

    pub(crate) fn decode(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            owner: r.uuid()?,
            vin: r.opt_text()?,
            brand: r.opt_text()?,
            model: r.opt_text()?,
            fuel_type: r.opt_text()?,
            status: r.small_int()?,
        })
    }
}

/// A vehicle owner, usually reached through a messenger handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub telegram_name: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
}

impl Owner {
    pub fn new(telegram_name: impl Into<String>) -> Self {
        Self {
            telegram_name: telegram_name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn encode(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::text(self.telegram_name.as_str()),
            FieldValue::opt_text(self.full_name.as_deref()),
            FieldValue::opt_text(self.email.as_deref()),
            FieldValue::opt_text(self.country.as_deref()),
        ]
    }

    pub(crate) fn decode(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            telegram_name: r.text()?,
            full_name: r.opt_text()?,
            email: r.opt_text()?,
            country: r.opt_text()?,
        })
    }
}

/// A fuel consumption record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consuming {
    pub vehicle: Uuid,
    pub status: i32,
    pub total_km: f64,
    pub last_liters: f64,
    pub last_cost: f64,
    pub event_date: Option<i64>,
    #[serde(default)]
    pub add_info: Map<String, Value>,
}

impl Consuming {
    pub fn new(vehicle: Uuid, total_km: f64, last_liters: f64, last_cost: f64) -> Self {
        Self {
            vehicle,
            total_km,
            last_liters,
            last_cost,
            ..Self::default()
        }
    }

    pub(crate) fn encode(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::uuid(self.vehicle),
            self.status.into(),
            self.total_km.into(),
            self.last_liters.into(),
            self.last_cost.into(),
            FieldValue::opt_int(self.event_date),
            FieldValue::json(&self.add_info),
        ]
    }

    pub(crate) fn decode(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            vehicle: r.uuid()?,
            status: r.small_int()?,
            total_km: r.real()?,
            last_liters: r.real()?,
            last_cost: r.real()?,
            event_date: r.opt_int()?,
            add_info: r.json()?,
        })
    }
}
