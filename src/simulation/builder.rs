use super::{Membership, Population, PopulationError, Simulation, SimulationError, SimulationOptions};
use crate::arrays::Array;
use crate::entities::{Documentable, Entity, RoleCode};
use crate::periods::Period;
use crate::system::TaxBenefitSystem;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct GroupSpec {
    entity: String,
    count: usize,
    group_index: Vec<usize>,
    roles: Vec<String>,
}

/// Declares the population and known inputs of a simulation.
///
/// Group entities left undeclared put every person alone in their own
/// group, holding the first role.
#[derive(Debug, Clone, Default)]
pub struct SimulationBuilder {
    persons: usize,
    groups: Vec<GroupSpec>,
    inputs: Vec<(String, Period, Array)>,
    options: SimulationOptions,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persons(mut self, count: usize) -> Self {
        self.persons = count;
        self
    }

    /// Declares `count` groups of `entity`. Person `i` belongs to group
    /// `group_index[i]` with role `roles[i]`; a role with subroles takes
    /// the next subrole free in that group.
    pub fn group<I, S>(mut self, entity: impl Into<String>, count: usize, group_index: Vec<usize>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.push(GroupSpec {
            entity: entity.into(),
            count,
            group_index,
            roles: roles.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn input(mut self, variable: impl Into<String>, period: Period, array: impl Into<Array>) -> Self {
        self.inputs.push((variable.into(), period, array.into()));
        self
    }

    pub fn options(mut self, options: SimulationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self, system: &Arc<TaxBenefitSystem>) -> Result<Simulation, SimulationError> {
        if let Some(unknown) = self
            .groups
            .iter()
            .find(|spec| system.group_entities().iter().all(|entity| entity.key() != spec.entity))
        {
            return Err(SimulationError::UnknownPopulation { entity: unknown.entity.clone() });
        }

        let mut populations = vec![Population::persons(system.person_entity().clone(), self.persons)];
        for entity in system.group_entities() {
            let membership = match self.groups.iter().find(|spec| spec.entity == entity.key()) {
                Some(spec) => membership_of(entity, self.persons, spec)?,
                None => Membership::new(
                    entity,
                    self.persons,
                    self.persons,
                    (0..self.persons).collect(),
                    vec![0; self.persons],
                )?,
            };
            populations.push(Population::groups(entity.clone(), membership));
        }
        tracing::debug!(persons = self.persons, groups = self.groups.len(), inputs = self.inputs.len(), "building simulation");

        let mut simulation = Simulation::new(system.clone(), populations, self.options);
        for (variable, period, array) in self.inputs {
            simulation.set_input(&variable, period, array)?;
        }
        Ok(simulation)
    }
}

fn membership_of(entity: &Entity, persons: usize, spec: &GroupSpec) -> Result<Membership, PopulationError> {
    let group = entity
        .as_group()
        .ok_or_else(|| PopulationError::NotAGroup { entity: spec.entity.clone() })?;
    if spec.roles.len() != persons {
        return Err(PopulationError::MembershipLength {
            entity: spec.entity.clone(),
            expected: persons,
            actual: spec.roles.len(),
        });
    }

    let mut taken: HashMap<(usize, &str), usize> = HashMap::new();
    let mut codes: Vec<RoleCode> = Vec::with_capacity(persons);
    for (person, key) in spec.roles.iter().enumerate() {
        let role = group.role(key).ok_or_else(|| PopulationError::UnknownRole {
            entity: spec.entity.clone(),
            role: key.clone(),
        })?;
        let candidates = group.role_codes(role);
        let slot = spec.group_index.get(person).copied().unwrap_or_default();
        let code = if role.has_subroles() {
            let used = taken.entry((slot, role.key())).or_default();
            let code = candidates.get(*used).copied().ok_or_else(|| PopulationError::MaxExceeded {
                entity: spec.entity.clone(),
                group: slot,
                role: role.key().to_string(),
                count: *used + 1,
                max: candidates.len(),
            })?;
            *used += 1;
            code
        } else {
            candidates
                .first()
                .copied()
                .ok_or_else(|| PopulationError::UnknownRole { entity: spec.entity.clone(), role: key.clone() })?
        };
        codes.push(code);
    }
    Membership::new(entity, persons, spec.count, spec.group_index.clone(), codes)
}
