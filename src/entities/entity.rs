use super::{Documentable, EntityError, GroupEntity, Personifiable, Role, RoleDescription, VariableLookup};
use crate::variables::Variable;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

/// A class of subjects calculations run on: an individual, a household, a company.
///
/// Group entities carry a [`GroupEntity`] role structure; persons do not.
/// An entity owns no data. It is a registry key, and a gateway to the
/// variables of the tax and benefit system it is attached to.
#[derive(Debug)]
pub struct Entity {
    key: String,
    plural: String,
    label: String,
    doc: String,
    group: Option<GroupEntity>,
    tax_benefit_system: RwLock<Option<Weak<dyn VariableLookup>>>,
}

impl Entity {
    pub fn person(
        key: impl Into<String>,
        plural: impl Into<String>,
        label: impl Into<String>,
        doc: &str,
    ) -> Self {
        Self {
            key: key.into(),
            plural: plural.into(),
            label: label.into(),
            doc: super::dedent(doc),
            group: None,
            tax_benefit_system: RwLock::new(None),
        }
    }

    pub fn group(
        key: impl Into<String>,
        plural: impl Into<String>,
        label: impl Into<String>,
        doc: &str,
        roles: Vec<RoleDescription>,
    ) -> Result<Self, EntityError> {
        let key = key.into();
        let group = GroupEntity::new(&key, roles)?;
        Ok(Self {
            group: Some(group),
            ..Self::person(key, plural, label, doc)
        })
    }

    pub fn as_group(&self) -> Option<&GroupEntity> {
        self.group.as_ref()
    }

    /// Role lookup by uppercased key (`PARENT`). Persons have no roles.
    pub fn role(&self, constant: &str) -> Option<&Arc<Role>> {
        self.group.as_ref().and_then(|group| group.role(constant))
    }

    /// Points [`Entity::variable`] at `system`.
    ///
    /// An entity holds a single link: attaching it to another system, as
    /// building a reform from the same entities does, redirects lookups made
    /// through the entity. Code holding a system should resolve variables
    /// through that system instead.
    pub fn set_tax_benefit_system(&self, system: Weak<dyn VariableLookup>) {
        let mut slot = self
            .tax_benefit_system
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(system);
    }

    fn tax_benefit_system(&self) -> Option<Arc<dyn VariableLookup>> {
        let slot = self
            .tax_benefit_system
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref().and_then(Weak::upgrade)
    }

    /// Fails when `name` exists but is defined for another entity.
    ///
    /// Entities are compared by key, not identity: two distinct entities
    /// sharing a key are treated as the same one.
    pub fn check_variable_defined_for_entity(&self, name: &str) -> Result<(), EntityError> {
        let Some(variable) = self.variable(name, true)? else {
            return Ok(());
        };
        self.check_variable_defined(&variable)
    }

    /// Fails unless `variable` is declared on this entity.
    pub fn check_variable_defined(&self, variable: &Variable) -> Result<(), EntityError> {
        let variable_entity = variable.entity();
        if variable_entity.key() != self.key() {
            return Err(EntityError::WrongEntity {
                variable: variable.name().to_string(),
                requested: self.plural.clone(),
                actual: variable_entity.plural.clone(),
            });
        }
        Ok(())
    }
}

impl Documentable for Entity {
    fn key(&self) -> &str {
        &self.key
    }

    fn plural(&self) -> Option<&str> {
        Some(&self.plural)
    }

    fn label(&self) -> Option<&str> {
        Some(&self.label)
    }

    fn doc(&self) -> &str {
        &self.doc
    }
}

impl Personifiable for Entity {
    fn is_person(&self) -> bool {
        self.group.is_none()
    }

    /// Returns `None` while no system is attached, or when the variable is
    /// missing and `check_existence` is false.
    fn variable(&self, name: &str, check_existence: bool) -> Result<Option<Arc<Variable>>, EntityError> {
        match self.tax_benefit_system() {
            Some(system) => system.get_variable(name, check_existence),
            None => Ok(None),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plural)
    }
}
