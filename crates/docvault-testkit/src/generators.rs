//! Proptest generators for property-based testing.

use proptest::prelude::*;
use uuid::Uuid;

use docvault_core::{
    ChildRecord, Consuming, DocumentBody, DocumentKind, Owner, PrincipalId, Project, Task,
    Vehicle,
};

/// Generate a non-anonymous principal.
pub fn principal() -> impl Strategy<Value = PrincipalId> {
    (1i64..=1000).prop_map(PrincipalId::new)
}

/// Generate a random UUID.
pub fn uuid() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Generate a non-nil UUID.
pub fn reference() -> impl Strategy<Value = Uuid> {
    (1u128..=u128::MAX).prop_map(Uuid::from_u128)
}

/// Generate a DocumentKind.
pub fn document_kind() -> impl Strategy<Value = DocumentKind> {
    prop_oneof![
        Just(DocumentKind::Task),
        Just(DocumentKind::Project),
        Just(DocumentKind::Vehicle),
        Just(DocumentKind::Owner),
        Just(DocumentKind::Consuming),
    ]
}

/// Generate a non-blank title.
pub fn title() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,39}".prop_map(String::from)
}

pub fn task_body() -> impl Strategy<Value = DocumentBody> {
    (title(), 0i32..5, 0i32..4, proptest::option::of(reference())).prop_map(
        |(title, priority, status, project)| {
            let mut task = Task::new(title).priority(priority).status(status);
            task.project = project;
            task.into()
        },
    )
}

pub fn project_body() -> impl Strategy<Value = DocumentBody> {
    (title(), proptest::option::of(principal())).prop_map(|(name, manager)| {
        let mut project = Project::new(name);
        project.manager = manager;
        project.into()
    })
}

pub fn vehicle_body() -> impl Strategy<Value = DocumentBody> {
    (reference(), proptest::option::of("[A-HJ-NPR-Z0-9]{17}")).prop_map(|(owner, vin)| {
        let mut vehicle = Vehicle::new(owner);
        vehicle.vin = vin;
        vehicle.into()
    })
}

pub fn owner_body() -> impl Strategy<Value = DocumentBody> {
    "@[a-z][a-z0-9_]{2,15}".prop_map(|name| Owner::new(name).into())
}

pub fn consuming_body() -> impl Strategy<Value = DocumentBody> {
    (reference(), 0.0f64..500_000.0, 0.0f64..120.0, 0.0f64..500.0).prop_map(
        |(vehicle, total_km, liters, cost)| Consuming::new(vehicle, total_km, liters, cost).into(),
    )
}

/// Generate a valid body of any kind.
pub fn document_body() -> impl Strategy<Value = DocumentBody> {
    prop_oneof![
        task_body(),
        project_body(),
        vehicle_body(),
        owner_body(),
        consuming_body(),
    ]
}

/// Generate up to `max` distinct label children.
pub fn labels(max: usize) -> impl Strategy<Value = Vec<ChildRecord>> {
    proptest::collection::hash_set(reference(), 0..=max)
        .prop_map(|set| set.into_iter().map(ChildRecord::label).collect())
}

/// Parameters for one insert.
#[derive(Debug, Clone)]
pub struct InsertParams {
    pub author: PrincipalId,
    pub body: DocumentBody,
}

impl Arbitrary for InsertParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (principal(), document_body())
            .prop_map(|(author, body)| InsertParams { author, body })
            .boxed()
    }
}

/// Generate a sequence of inserts spread over `principals` authors.
pub fn insert_ops(
    kind_body: impl Strategy<Value = DocumentBody>,
    principals: usize,
    max: usize,
) -> impl Strategy<Value = Vec<(usize, DocumentBody)>> {
    proptest::collection::vec((0..principals.max(1), kind_body), 0..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_core::validate_body;

    proptest! {
        #[test]
        fn generated_bodies_validate(params: InsertParams) {
            prop_assert!(validate_body(params.body.kind(), &params.body).is_ok());
            prop_assert!(!params.author.is_anonymous());
        }

        #[test]
        fn generated_labels_are_distinct(children in labels(8)) {
            let mut seen = std::collections::HashSet::new();
            for child in &children {
                match child {
                    ChildRecord::Label(link) => prop_assert!(seen.insert(link.label)),
                    ChildRecord::Image(_) => prop_assert!(false, "labels() produced an image"),
                }
            }
        }
    }
}
