use super::TaxBenefitSystemBuilder;
use crate::entities::{Documentable, Entity, EntityError, VariableLookup};
use crate::parameters::{ParameterAtInstant, ParameterError, ParameterTree};
use crate::periods::Instant;
use crate::variables::Variable;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Entities, variables and parameters of one legislation.
///
/// Immutable once built: simulations share it behind an `Arc`, and every
/// entity holds a weak reference back to it for variable lookups.
pub struct TaxBenefitSystem {
    pub(super) person_entity: Arc<Entity>,
    pub(super) group_entities: Vec<Arc<Entity>>,
    pub(super) variables: BTreeMap<String, Arc<Variable>>,
    pub(super) parameters: Option<Arc<dyn ParameterTree>>,
}

impl TaxBenefitSystem {
    pub fn builder(
        person_entity: Arc<Entity>,
        group_entities: Vec<Arc<Entity>>,
    ) -> Result<TaxBenefitSystemBuilder, crate::variables::DefinitionError> {
        TaxBenefitSystemBuilder::new(person_entity, group_entities)
    }

    pub fn person_entity(&self) -> &Arc<Entity> {
        &self.person_entity
    }

    pub fn group_entities(&self) -> &[Arc<Entity>] {
        &self.group_entities
    }

    /// The person entity first, then group entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        std::iter::once(&self.person_entity).chain(self.group_entities.iter())
    }

    pub fn entity(&self, key: &str) -> Option<&Arc<Entity>> {
        self.entities().find(|entity| entity.key() == key)
    }

    /// Variables sorted by name.
    pub fn variables(&self) -> impl Iterator<Item = &Arc<Variable>> {
        self.variables.values()
    }

    /// Looks a variable up. Missing variables are `None`, or an error when
    /// `check_existence` is set.
    pub fn get_variable(&self, name: &str, check_existence: bool) -> Result<Option<Arc<Variable>>, EntityError> {
        match self.variables.get(name) {
            Some(variable) => Ok(Some(variable.clone())),
            None if check_existence => Err(EntityError::VariableNotFound { variable: name.to_string() }),
            None => Ok(None),
        }
    }

    pub fn parameters_at(&self, instant: Instant) -> Result<ParameterAtInstant, ParameterError> {
        self.parameters
            .as_ref()
            .ok_or(ParameterError::NoParameters)?
            .get_at_instant(instant)
    }
}

impl VariableLookup for TaxBenefitSystem {
    fn get_variable(&self, name: &str, check_existence: bool) -> Result<Option<Arc<Variable>>, EntityError> {
        TaxBenefitSystem::get_variable(self, name, check_existence)
    }
}

impl fmt::Debug for TaxBenefitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaxBenefitSystem")
            .field("entities", &self.entities().map(|e| e.key()).collect::<Vec<_>>())
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::DType;
    use crate::entities::Personifiable;
    use crate::test_support::{household, person};
    use crate::variables::DefinitionError;

    #[test]
    fn test_entities_resolve_variables_through_the_system() {
        let persons = person();
        let households = household();
        let salary = Variable::builder("salary", &persons, DType::Float).build().unwrap();
        let rent = Variable::builder("rent", &households, DType::Float).build().unwrap();
        let system = TaxBenefitSystem::builder(persons.clone(), vec![households.clone()])
            .unwrap()
            .add_variable(salary)
            .unwrap()
            .add_variable(rent)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(persons.variable("salary", true).unwrap().unwrap().name(), "salary");
        assert!(persons.variable("pension", false).unwrap().is_none());
        assert_eq!(
            persons.variable("pension", true).unwrap_err(),
            EntityError::VariableNotFound { variable: "pension".into() }
        );
        assert!(persons.check_variable_defined_for_entity("salary").is_ok());
        let err = persons.check_variable_defined_for_entity("rent").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("persons") && message.contains("households"));
        assert_eq!(system.entity("household").unwrap().key(), "household");
        assert_eq!(system.variables().count(), 2);
    }

    #[test]
    fn test_entity_lookups_fail_once_the_system_is_dropped() {
        let persons = person();
        let system = TaxBenefitSystem::builder(persons.clone(), vec![household()])
            .unwrap()
            .add_variable(Variable::builder("salary", &persons, DType::Float).build().unwrap())
            .unwrap()
            .build()
            .unwrap();
        assert!(persons.variable("salary", false).unwrap().is_some());
        drop(system);
        assert!(persons.variable("salary", false).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_variables_are_rejected() {
        let persons = person();
        let builder = TaxBenefitSystem::builder(persons.clone(), vec![household()])
            .unwrap()
            .add_variable(Variable::builder("salary", &persons, DType::Float).build().unwrap())
            .unwrap();
        let err = builder
            .add_variable(Variable::builder("salary", &persons, DType::Int).build().unwrap())
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateVariable { name: "salary".into() });
    }

    #[test]
    fn test_builder_debug_lists_definitions() {
        let persons = person();
        let builder = TaxBenefitSystem::builder(persons.clone(), vec![household()])
            .unwrap()
            .add_variable(Variable::builder("salary", &persons, DType::Float).build().unwrap())
            .unwrap();
        assert_eq!(
            format!("{builder:?}"),
            r#"TaxBenefitSystemBuilder { person_entity: "person", group_entities: ["household"], variables: ["salary"], parameters: false }"#
        );
    }

    #[test]
    fn test_parameters_are_optional() {
        let system = TaxBenefitSystem::builder(person(), vec![household()]).unwrap().build().unwrap();
        let instant = "2015-01-01".parse().unwrap();
        assert_eq!(system.parameters_at(instant).unwrap_err(), ParameterError::NoParameters);
    }
}
