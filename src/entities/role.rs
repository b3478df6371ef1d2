use super::{Documentable, Rolifiable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Declarative description of a role, as written in a rule system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescription {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subroles: Vec<String>,
}

impl RoleDescription {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Default::default() }
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = Some(plural.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn subroles<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subroles = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Role of a person within a group entity, e.g. the parent of a household.
///
/// Built once when its entity is defined and immutable afterwards. The link
/// to the entity is its key only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    key: String,
    plural: Option<String>,
    label: Option<String>,
    doc: String,
    max: Option<usize>,
    entity: String,
    subroles: Vec<Arc<Role>>,
}

impl Role {
    pub fn new(description: &RoleDescription, entity: &str) -> Self {
        Self {
            key: description.key.clone(),
            plural: description.plural.clone(),
            label: description.label.clone(),
            doc: super::dedent(&description.doc),
            max: description.max,
            entity: entity.to_string(),
            subroles: Vec::new(),
        }
    }

    /// Attaches subroles; the role then holds at most one member per subrole.
    pub(crate) fn with_subroles(mut self, subroles: Vec<Arc<Role>>) -> Self {
        self.max = Some(subroles.len());
        self.subroles = subroles;
        self
    }

    pub fn has_subroles(&self) -> bool {
        !self.subroles.is_empty()
    }

    /// Whether at most one member of a group can hold this role.
    pub fn is_single_holder(&self) -> bool {
        !self.has_subroles() && self.max == Some(1)
    }
}

impl Documentable for Role {
    fn key(&self) -> &str {
        &self.key
    }

    fn plural(&self) -> Option<&str> {
        self.plural.as_deref()
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn doc(&self) -> &str {
        &self.doc
    }
}

impl Rolifiable for Role {
    fn entity(&self) -> &str {
        &self.entity
    }

    fn max(&self) -> Option<usize> {
        self.max
    }

    fn subroles(&self) -> &[Arc<Role>] {
        &self.subroles
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role({})", self.key)
    }
}
