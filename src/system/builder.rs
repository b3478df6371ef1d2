use super::TaxBenefitSystem;
use crate::entities::{Documentable, Entity, Personifiable, VariableLookup};
use crate::parameters::ParameterTree;
use crate::variables::{DefinitionError, Variable};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Collects the definitions of a [`TaxBenefitSystem`].
#[must_use]
pub struct TaxBenefitSystemBuilder {
    person_entity: Arc<Entity>,
    group_entities: Vec<Arc<Entity>>,
    variables: BTreeMap<String, Arc<Variable>>,
    parameters: Option<Arc<dyn ParameterTree>>,
}

impl TaxBenefitSystemBuilder {
    pub(super) fn new(person_entity: Arc<Entity>, group_entities: Vec<Arc<Entity>>) -> Result<Self, DefinitionError> {
        if !person_entity.is_person() {
            return Err(DefinitionError::EntityKind { entity: person_entity.key().to_string(), expected: "a person entity" });
        }
        if let Some(entity) = group_entities.iter().find(|entity| entity.is_person()) {
            return Err(DefinitionError::EntityKind { entity: entity.key().to_string(), expected: "a group entity" });
        }
        Ok(Self { person_entity, group_entities, variables: BTreeMap::new(), parameters: None })
    }

    /// Registers a new variable. Names are unique.
    pub fn add_variable(mut self, variable: Arc<Variable>) -> Result<Self, DefinitionError> {
        if self.variables.contains_key(variable.name()) {
            return Err(DefinitionError::DuplicateVariable { name: variable.name().to_string() });
        }
        self.check_entity(&variable)?;
        self.variables.insert(variable.name().to_string(), variable);
        Ok(self)
    }

    /// Registers a variable, replacing any previous definition of the same name.
    pub fn replace_variable(mut self, variable: Arc<Variable>) -> Result<Self, DefinitionError> {
        self.check_entity(&variable)?;
        self.variables.insert(variable.name().to_string(), variable);
        Ok(self)
    }

    pub fn parameters(mut self, parameters: Arc<dyn ParameterTree>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Freezes the system and attaches it to its entities.
    ///
    /// Every conversion must read a registered variable.
    pub fn build(self) -> Result<Arc<TaxBenefitSystem>, DefinitionError> {
        for variable in self.variables.values() {
            if let Some(conversion) = variable.conversion() {
                if !self.variables.contains_key(conversion.source()) {
                    return Err(DefinitionError::MissingSource {
                        variable: variable.name().to_string(),
                        input: conversion.source().to_string(),
                    });
                }
            }
        }
        let system = Arc::new(TaxBenefitSystem {
            person_entity: self.person_entity,
            group_entities: self.group_entities,
            variables: self.variables,
            parameters: self.parameters,
        });
        let lookup: Weak<dyn VariableLookup> = Arc::downgrade(&system) as Weak<dyn VariableLookup>;
        for entity in system.entities() {
            entity.set_tax_benefit_system(lookup.clone());
        }
        tracing::debug!(variables = system.variables.len(), "tax and benefit system built");
        Ok(system)
    }

    fn check_entity(&self, variable: &Variable) -> Result<(), DefinitionError> {
        let key = variable.entity().key();
        let known = std::iter::once(&self.person_entity)
            .chain(self.group_entities.iter())
            .any(|entity| entity.key() == key);
        if known {
            Ok(())
        } else {
            Err(DefinitionError::UnknownEntity { entity: key.to_string() })
        }
    }
}

impl fmt::Debug for TaxBenefitSystemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaxBenefitSystemBuilder")
            .field("person_entity", &self.person_entity.key())
            .field("group_entities", &self.group_entities.iter().map(|e| e.key()).collect::<Vec<_>>())
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("parameters", &self.parameters.is_some())
            .finish()
    }
}
