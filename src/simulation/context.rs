use super::engine::{RunContext, Simulation};
use super::{projectors, Population, PopulationError, SimulationError};
use crate::arrays::{Array, Value};
use crate::entities::{Documentable, Entity, GroupEntity};
use crate::parameters::ParameterAtInstant;
use crate::periods::{Instant, Period};
use crate::variables::{Aggregation, Variable};
use std::sync::Arc;

/// What a formula body sees of the simulation running it.
///
/// Cross-entity helpers take the key of a group entity, defaulting to the
/// entity of the variable being computed, and role keys, defaulting to
/// every role.
pub struct FormulaContext<'a> {
    simulation: &'a mut Simulation,
    run: &'a mut RunContext,
    variable: Arc<Variable>,
    count: usize,
}

impl<'a> FormulaContext<'a> {
    pub(crate) fn new(
        simulation: &'a mut Simulation,
        run: &'a mut RunContext,
        variable: Arc<Variable>,
        count: usize,
    ) -> Self {
        Self { simulation, run, variable, count }
    }

    /// Requests another variable through the same cache and cycle guard.
    pub fn calculate(&mut self, name: &str, period: Period) -> Result<Arc<Array>, SimulationError> {
        self.simulation.calculate_in(name, period, self.run)
    }

    pub fn calculate_f64(&mut self, name: &str, period: Period) -> Result<Vec<f64>, SimulationError> {
        Ok(self.calculate(name, period)?.to_f64())
    }

    pub fn parameters(&mut self, instant: Instant) -> Result<Arc<ParameterAtInstant>, SimulationError> {
        let parameters = self.simulation.parameters_at(instant)?;
        self.run.record_parameters(instant);
        Ok(parameters)
    }

    /// Number of members of the computed variable's entity.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn entity(&self) -> &Arc<Entity> {
        self.variable.entity()
    }

    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    pub fn population(&self, entity: &str) -> Result<&Population, SimulationError> {
        self.simulation.population(entity)
    }

    /// An array of the computed variable's type with `value` in every cell.
    pub fn filled(&self, value: Value) -> Result<Array, SimulationError> {
        Ok(Array::filled(self.variable.value_type(), value, self.count)?)
    }

    fn group(&self, entity: &str) -> Result<&GroupEntity, SimulationError> {
        self.simulation
            .population(entity)?
            .entity()
            .as_group()
            .ok_or_else(|| SimulationError::EntityKind { entity: entity.to_string(), expected: "a group entity" })
    }

    fn group_key<'k>(&'k self, entity: Option<&'k str>) -> &'k str {
        entity.unwrap_or_else(|| self.variable.entity().key())
    }

    /// Sums a person array over the members of each group.
    pub fn sum_by_entity(
        &self,
        array: &Array,
        entity: Option<&str>,
        roles: Option<&[&str]>,
    ) -> Result<Array, SimulationError> {
        let entity = self.group_key(entity);
        self.simulation.project("summing", self.variable.name(), entity, roles, |membership, codes| {
            projectors::reduce(array, Aggregation::Add, membership, codes)
        })
    }

    /// Per group, whether any member holding one of `roles` has a non-zero value.
    pub fn any_by_roles(
        &self,
        array: &Array,
        entity: Option<&str>,
        roles: Option<&[&str]>,
    ) -> Result<Array, SimulationError> {
        let entity = self.group_key(entity);
        self.simulation.project("testing", self.variable.name(), entity, roles, |membership, codes| {
            projectors::reduce(array, Aggregation::Or, membership, codes)
        })
    }

    /// Copies a group array to the members holding `role`; others get `default`.
    pub fn cast_from_entity_to_role(
        &self,
        array: &Array,
        default: Value,
        entity: &str,
        role: &str,
    ) -> Result<Array, SimulationError> {
        self.cast_from_entity_to_roles(array, default, entity, Some(std::slice::from_ref(&role)))
    }

    /// Copies a group array to the members holding one of `roles`, every
    /// member when `None`.
    pub fn cast_from_entity_to_roles(
        &self,
        array: &Array,
        default: Value,
        entity: &str,
        roles: Option<&[&str]>,
    ) -> Result<Array, SimulationError> {
        self.simulation.project("casting", self.variable.name(), entity, roles, |membership, codes| {
            projectors::broadcast(array, default, membership, codes)
        })
    }

    /// The value of the member holding `role` in each group, or `default`.
    ///
    /// `role` must be held by at most one member of a group.
    pub fn filter_role(
        &self,
        array: &Array,
        default: Value,
        entity: Option<&str>,
        role: &str,
    ) -> Result<Array, SimulationError> {
        let entity = self.group_key(entity);
        let group = self.group(entity)?;
        let held = group.role(role).ok_or_else(|| PopulationError::UnknownRole {
            entity: entity.to_string(),
            role: role.to_string(),
        })?;
        if !held.is_single_holder() {
            return Err(SimulationError::SharedRole {
                entity: entity.to_string(),
                role: role.to_string(),
                function: self.variable.name().to_string(),
            });
        }
        self.simulation.project("filtering", self.variable.name(), entity, Some(std::slice::from_ref(&role)), |membership, codes| {
            projectors::pick(array, default, membership, codes)
        })
    }

    /// One group array per role, as [`FormulaContext::filter_role`] builds
    /// it. `None` splits over every flattened role a single member holds.
    pub fn split_by_roles(
        &self,
        array: &Array,
        default: Value,
        entity: Option<&str>,
        roles: Option<&[&str]>,
    ) -> Result<Vec<(String, Array)>, SimulationError> {
        let entity = self.group_key(entity);
        let keys: Vec<String> = match roles {
            Some(keys) => keys.iter().map(|key| key.to_string()).collect(),
            None => self
                .group(entity)?
                .flattened_roles()
                .iter()
                .filter(|role| role.is_single_holder())
                .map(|role| role.key().to_string())
                .collect(),
        };
        keys.into_iter()
            .map(|key| {
                let split = self.filter_role(array, default, Some(entity), &key)?;
                Ok((key, split))
            })
            .collect()
    }
}
