//! Child records: rows owned by exactly one parent document.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;
use crate::fields::{FieldReader, FieldValue};
use crate::naming::{ChildShape, ColumnDef};

/// Association of a task with a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelLink {
    pub label: Uuid,
}

/// An image attached to a consumption record (receipt photo, odometer shot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub data: Bytes,
    pub image_type: String,
    /// Recognition confidence in `0.0..=1.0`.
    pub confidence: f64,
    #[serde(default)]
    pub add_info: Map<String, Value>,
    pub description: Option<String>,
    pub num_of_seq: i32,
}

impl Image {
    pub fn new(data: impl Into<Bytes>, image_type: impl Into<String>, num_of_seq: i32) -> Self {
        Self {
            data: data.into(),
            image_type: image_type.into(),
            confidence: 1.0,
            add_info: Map::new(),
            description: None,
            num_of_seq,
        }
    }
}

/// A row in a kind's child table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ChildRecord {
    Label(LabelLink),
    Image(Image),
}

impl ChildRecord {
    pub fn label(label: Uuid) -> Self {
        Self::Label(LabelLink { label })
    }

    /// The child table shape this record belongs to.
    pub fn shape(&self) -> ChildShape {
        match self {
            Self::Label(_) => ChildShape::Label,
            Self::Image(_) => ChildShape::Image,
        }
    }

    /// Encode to child column values (excluding the parent column).
    pub fn encode(&self) -> Vec<FieldValue> {
        match self {
            Self::Label(link) => vec![FieldValue::uuid(link.label)],
            Self::Image(image) => vec![
                FieldValue::Blob(image.data.clone()),
                FieldValue::text(image.image_type.as_str()),
                image.confidence.into(),
                FieldValue::json(&image.add_info),
                FieldValue::opt_text(image.description.as_deref()),
                image.num_of_seq.into(),
            ],
        }
    }

    /// Decode a child of `shape` from column values (excluding the parent column).
    pub fn decode(shape: ChildShape, columns: &[ColumnDef], values: &[FieldValue]) -> Result<Self> {
        let mut r = FieldReader::new(columns, values)?;
        match shape {
            ChildShape::Label => Ok(Self::Label(LabelLink { label: r.uuid()? })),
            ChildShape::Image => Ok(Self::Image(Image {
                data: r.blob()?,
                image_type: r.text()?,
                confidence: r.real()?,
                add_info: r.json()?,
                description: r.opt_text()?,
                num_of_seq: r.small_int()?,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::DocumentKind;
    use crate::naming::standard_naming;

    #[test]
    fn test_image_matches_child_columns() {
        let child = standard_naming(DocumentKind::Consuming).child.unwrap();
        let mut image = Image::new(vec![0xffu8, 0xd8, 0xff], "odometer", 1);
        image.description = Some("dashboard".into());

        let record = ChildRecord::Image(image);
        let values = record.encode();
        let decoded = ChildRecord::decode(child.shape, child.columns, &values).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_label_shape() {
        let record = ChildRecord::label(Uuid::new_v4());
        assert_eq!(record.shape(), ChildShape::Label);
        assert_eq!(record.encode().len(), 1);
    }
}
