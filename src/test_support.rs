//! Entities shared by unit tests.
use crate::entities::{Entity, RoleDescription};
use std::sync::Arc;

pub(crate) fn person() -> Arc<Entity> {
    Arc::new(Entity::person("person", "persons", "An individual", ""))
}

/// Flattened role codes: first_parent = 0, second_parent = 1, child = 2.
pub(crate) fn household() -> Arc<Entity> {
    let roles = vec![
        RoleDescription::new("parent").subroles(["first_parent", "second_parent"]),
        RoleDescription::new("child").plural("children"),
    ];
    Arc::new(Entity::group("household", "households", "A household", "", roles).unwrap())
}
