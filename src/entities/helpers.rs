use super::{Entity, EntityError, Role, RoleDescription};
use std::any::Any;
use std::sync::Arc;

/// Builds a person entity, or a group entity from `roles`.
pub fn build_entity(
    key: &str,
    plural: &str,
    label: &str,
    doc: &str,
    roles: Option<Vec<RoleDescription>>,
    is_person: bool,
) -> Result<Entity, EntityError> {
    if is_person {
        return Ok(Entity::person(key, plural, label, doc));
    }
    let roles = roles.ok_or_else(|| EntityError::MissingRoles { entity: key.to_string() })?;
    Entity::group(key, plural, label, doc, roles)
}

/// Accepts nothing, or a [`Role`] (bare or behind an `Arc`).
pub fn check_role_validity(role: Option<&dyn Any>) -> Result<(), EntityError> {
    match role {
        None => Ok(()),
        Some(value) if value.is::<Role>() || value.is::<Arc<Role>>() => Ok(()),
        Some(_) => Err(EntityError::InvalidRole),
    }
}
