//! Payload validation, performed before any store I/O.

use crate::body::{Consuming, Owner, Project, Task, Vehicle};
use crate::child::{ChildRecord, Image};
use crate::document::DocumentBody;
use crate::error::ValidationError;
use crate::kind::DocumentKind;
use crate::naming::EntityNaming;

/// Validate a payload destined for `kind`.
///
/// This checks:
/// - The payload's kind matches the target kind
/// - Required fields are present and not blank
/// - Numeric fields are within range
pub fn validate_body(kind: DocumentKind, body: &DocumentBody) -> Result<(), ValidationError> {
    // 1. Kind match
    if body.kind() != kind {
        return Err(ValidationError::KindMismatch {
            expected: kind,
            got: body.kind(),
        });
    }

    // 2. Per-kind fields
    match body {
        DocumentBody::Task(task) => validate_task(task),
        DocumentBody::Project(project) => validate_project(project),
        DocumentBody::Vehicle(vehicle) => validate_vehicle(vehicle),
        DocumentBody::Owner(owner) => validate_owner(owner),
        DocumentBody::Consuming(consuming) => validate_consuming(consuming),
    }
}

/// Validate child records against the kind's child table.
pub fn validate_children(
    kind: DocumentKind,
    naming: &EntityNaming,
    children: &[ChildRecord],
) -> Result<(), ValidationError> {
    if children.is_empty() {
        return Ok(());
    }

    let child = naming
        .child
        .as_ref()
        .ok_or(ValidationError::ChildrenNotSupported(kind))?;

    for record in children {
        if record.shape() != child.shape {
            return Err(ValidationError::ChildKindMismatch {
                kind,
                child: record.shape().as_str(),
            });
        }
        if let ChildRecord::Image(image) = record {
            validate_image(kind, image)?;
        }
    }

    Ok(())
}

fn require_text(kind: DocumentKind, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { kind, field });
    }
    Ok(())
}

fn require_non_negative(kind: DocumentKind, field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidField {
            kind,
            field,
            reason: format!("{value} is not a non-negative number"),
        });
    }
    Ok(())
}

fn validate_task(task: &Task) -> Result<(), ValidationError> {
    require_text(DocumentKind::Task, "title", &task.title)
}

fn validate_project(project: &Project) -> Result<(), ValidationError> {
    require_text(DocumentKind::Project, "name", &project.name)
}

fn validate_vehicle(vehicle: &Vehicle) -> Result<(), ValidationError> {
    if vehicle.owner.is_nil() {
        return Err(ValidationError::MissingField {
            kind: DocumentKind::Vehicle,
            field: "owner_id",
        });
    }
    Ok(())
}

fn validate_owner(owner: &Owner) -> Result<(), ValidationError> {
    require_text(DocumentKind::Owner, "telegram_name", &owner.telegram_name)
}

fn validate_consuming(consuming: &Consuming) -> Result<(), ValidationError> {
    let kind = DocumentKind::Consuming;
    if consuming.vehicle.is_nil() {
        return Err(ValidationError::MissingField {
            kind,
            field: "vehicle_id",
        });
    }
    require_non_negative(kind, "total_km", consuming.total_km)?;
    require_non_negative(kind, "last_liters", consuming.last_liters)?;
    require_non_negative(kind, "last_cost", consuming.last_cost)
}

fn validate_image(kind: DocumentKind, image: &Image) -> Result<(), ValidationError> {
    if image.data.is_empty() {
        return Err(ValidationError::MissingField {
            kind,
            field: "image_data",
        });
    }
    require_text(kind, "type", &image.image_type)?;
    if !(0.0..=1.0).contains(&image.confidence) {
        return Err(ValidationError::InvalidField {
            kind,
            field: "confidence",
            reason: format!("{} is outside 0..=1", image.confidence),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::standard_naming;
    use uuid::Uuid;

    #[test]
    fn test_blank_title_is_missing() {
        let body: DocumentBody = Task::new("   ").into();
        let err = validate_body(DocumentKind::Task, &body).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField { kind: DocumentKind::Task, field: "title" }
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let body: DocumentBody = Project::new("Apollo").into();
        let err = validate_body(DocumentKind::Task, &body).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::KindMismatch { expected: DocumentKind::Task, got: DocumentKind::Project }
        ));
    }

    #[test]
    fn test_consuming_rejects_negative_cost() {
        let body: DocumentBody = Consuming::new(Uuid::new_v4(), 10.0, 5.0, -1.0).into();
        let err = validate_body(DocumentKind::Consuming, &body).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "last_cost", .. }));
    }

    #[test]
    fn test_vehicle_needs_owner() {
        let body: DocumentBody = Vehicle::default().into();
        assert!(validate_body(DocumentKind::Vehicle, &body).is_err());
        let body: DocumentBody = Vehicle::new(Uuid::new_v4()).into();
        assert!(validate_body(DocumentKind::Vehicle, &body).is_ok());
    }

    #[test]
    fn test_children_on_childless_kind() {
        let naming = standard_naming(DocumentKind::Project);
        let children = [ChildRecord::label(Uuid::new_v4())];
        let err = validate_children(DocumentKind::Project, &naming, &children).unwrap_err();
        assert!(matches!(err, ValidationError::ChildrenNotSupported(DocumentKind::Project)));
        assert!(validate_children(DocumentKind::Project, &naming, &[]).is_ok());
    }

    #[test]
    fn test_child_shape_mismatch() {
        let naming = standard_naming(DocumentKind::Consuming);
        let children = [ChildRecord::label(Uuid::new_v4())];
        let err = validate_children(DocumentKind::Consuming, &naming, &children).unwrap_err();
        assert!(matches!(err, ValidationError::ChildKindMismatch { child: "label", .. }));
    }

    #[test]
    fn test_image_confidence_range() {
        let naming = standard_naming(DocumentKind::Consuming);
        let mut image = Image::new(vec![1u8, 2, 3], "receipt", 0);
        image.confidence = 1.5;
        let err = validate_children(DocumentKind::Consuming, &naming, &[ChildRecord::Image(image)])
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "confidence", .. }));
    }
}
