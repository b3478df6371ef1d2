//! Entities are the subjects rules apply to: persons, and groups of persons
//! (households, families, companies) in which every member holds a [`Role`].
mod entity;
mod group;
mod helpers;
mod role;
mod traits;

pub use entity::Entity;
pub use group::{GroupEntity, RoleCode, RoleCodes};
pub use helpers::{build_entity, check_role_validity};
pub use role::{Role, RoleDescription};
pub use traits::{Documentable, Personifiable, Rolifiable, VariableLookup};

pub use self::error::EntityError;
mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum EntityError {
        #[error("Group entity '{entity}' must be given an iterable of roles")]
        MissingRoles { entity: String },
        #[error("Not a valid role")]
        InvalidRole,
        #[error("Role '{role}' is declared more than once in entity '{entity}'")]
        DuplicateRole { entity: String, role: String },
        #[error("You tried to calculate or to set a value for variable '{variable}', but it was not found in the loaded tax and benefit system")]
        VariableNotFound { variable: String },
        #[error(
            "You tried to compute the variable '{variable}' for the entity '{requested}';\nhowever the variable '{variable}' is defined for '{actual}'.\nLearn more about entities in our documentation:\n<https://openfisca.org/doc/coding-the-legislation/50_entities.html>."
        )]
        WrongEntity { variable: String, requested: String, actual: String },
    }
}

/// Removes the indentation shared by every non-blank line.
pub(crate) fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| line.get(margin..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
