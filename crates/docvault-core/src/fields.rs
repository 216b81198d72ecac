//! Column values exchanged between bodies and stores.
//!
//! Bodies encode to a flat list of [`FieldValue`]s in the column order
//! registered for their kind, and decode back from the same order through a
//! [`FieldReader`]. Values are storage classes only: UUIDs and JSON travel as
//! text, flags as integers.

use bytes::Bytes;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::naming::ColumnDef;
use crate::types::PrincipalId;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Bytes),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(Self::Null, |v| Self::Text(v.to_string()))
    }

    pub fn uuid(value: Uuid) -> Self {
        Self::Text(value.hyphenated().to_string())
    }

    pub fn opt_uuid(value: Option<Uuid>) -> Self {
        value.map_or(Self::Null, Self::uuid)
    }

    pub fn opt_int(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }

    pub fn opt_principal(value: Option<PrincipalId>) -> Self {
        value.map_or(Self::Null, |p| Self::Integer(p.get()))
    }

    pub fn json(value: &Map<String, Value>) -> Self {
        Self::Text(Value::Object(value.clone()).to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

/// Sequential decoder over one row's values.
pub struct FieldReader<'a> {
    columns: &'a [ColumnDef],
    values: &'a [FieldValue],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    /// Create a reader; fails if the value count does not match the columns.
    pub fn new(columns: &'a [ColumnDef], values: &'a [FieldValue]) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(CoreError::Decode(format!(
                "expected {} columns, got {}",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            columns,
            values,
            pos: 0,
        })
    }

    fn next(&mut self) -> Result<(&'static str, &'a FieldValue)> {
        let name = self
            .columns
            .get(self.pos)
            .map(|c| c.name)
            .ok_or_else(|| CoreError::Decode("read past the last column".into()))?;
        let values: &'a [FieldValue] = self.values;
        let value = &values[self.pos];
        self.pos += 1;
        Ok((name, value))
    }

    fn mismatch(column: &str, expected: &str, got: &FieldValue) -> CoreError {
        CoreError::Decode(format!("column `{column}`: expected {expected}, got {got:?}"))
    }

    pub fn opt_text(&mut self) -> Result<Option<String>> {
        match self.next()? {
            (_, FieldValue::Null) => Ok(None),
            (_, FieldValue::Text(s)) => Ok(Some(s.clone())),
            (column, other) => Err(Self::mismatch(column, "text", other)),
        }
    }

    pub fn text(&mut self) -> Result<String> {
        let column = self.peek_name();
        self.opt_text()?
            .ok_or_else(|| CoreError::Decode(format!("column `{column}` is null")))
    }

    pub fn opt_int(&mut self) -> Result<Option<i64>> {
        match self.next()? {
            (_, FieldValue::Null) => Ok(None),
            (_, FieldValue::Integer(i)) => Ok(Some(*i)),
            (column, other) => Err(Self::mismatch(column, "integer", other)),
        }
    }

    pub fn int(&mut self) -> Result<i64> {
        let column = self.peek_name();
        self.opt_int()?
            .ok_or_else(|| CoreError::Decode(format!("column `{column}` is null")))
    }

    pub fn small_int(&mut self) -> Result<i32> {
        let column = self.peek_name();
        let value = self.int()?;
        i32::try_from(value)
            .map_err(|_| CoreError::Decode(format!("column `{column}`: {value} out of range")))
    }

    pub fn real(&mut self) -> Result<f64> {
        match self.next()? {
            (_, FieldValue::Real(r)) => Ok(*r),
            // SQLite hands back whole reals as integers when stored that way
            (_, FieldValue::Integer(i)) => Ok(*i as f64),
            (column, other) => Err(Self::mismatch(column, "real", other)),
        }
    }

    pub fn opt_uuid(&mut self) -> Result<Option<Uuid>> {
        let column = self.peek_name();
        self.opt_text()?
            .map(|s| {
                Uuid::parse_str(&s)
                    .map_err(|e| CoreError::Decode(format!("column `{column}`: {e}")))
            })
            .transpose()
    }

    pub fn uuid(&mut self) -> Result<Uuid> {
        let column = self.peek_name();
        self.opt_uuid()?
            .ok_or_else(|| CoreError::Decode(format!("column `{column}` is null")))
    }

    pub fn opt_principal(&mut self) -> Result<Option<PrincipalId>> {
        Ok(self.opt_int()?.map(PrincipalId::new))
    }

    pub fn json(&mut self) -> Result<Map<String, Value>> {
        let column = self.peek_name();
        let text = self.text()?;
        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(CoreError::Decode(format!(
                "column `{column}`: expected a JSON object, got {other}"
            ))),
            Err(e) => Err(CoreError::Decode(format!("column `{column}`: {e}"))),
        }
    }

    pub fn blob(&mut self) -> Result<Bytes> {
        match self.next()? {
            (_, FieldValue::Blob(b)) => Ok(b.clone()),
            (column, other) => Err(Self::mismatch(column, "blob", other)),
        }
    }

    fn peek_name(&self) -> &'static str {
        self.columns.get(self.pos).map_or("?", |c| c.name)
    }
}
