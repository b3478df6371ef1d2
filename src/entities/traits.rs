//! Capability interfaces shared by entities and roles.
use super::{EntityError, Role};
use crate::variables::Variable;
use std::sync::Arc;

/// Anything identified by a key and carrying human documentation.
pub trait Documentable {
    fn key(&self) -> &str;
    fn plural(&self) -> Option<&str>;
    fn label(&self) -> Option<&str>;
    fn doc(&self) -> &str;
}

/// A class of simulated subjects, able to resolve the variables defined on it.
pub trait Personifiable: Documentable {
    fn is_person(&self) -> bool;

    fn variable(&self, name: &str, check_existence: bool) -> Result<Option<Arc<Variable>>, EntityError>;
}

/// A position members hold inside a group entity.
pub trait Rolifiable: Documentable {
    /// Key of the entity the role belongs to.
    fn entity(&self) -> &str;
    fn max(&self) -> Option<usize>;
    fn subroles(&self) -> &[Arc<Role>];
}

/// The variable registry an entity delegates lookups to.
pub trait VariableLookup: Send + Sync {
    fn get_variable(&self, name: &str, check_existence: bool) -> Result<Option<Arc<Variable>>, EntityError>;
}
