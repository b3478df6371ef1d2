use crate::entities::{Documentable, Entity, GroupEntity, RoleCode, Rolifiable};
use std::collections::HashMap;
use std::sync::Arc;

pub use self::error::PopulationError;
mod error {
    use crate::entities::RoleCode;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum PopulationError {
        #[error("Membership of '{entity}' describes {actual} persons, expected {expected}")]
        MembershipLength { entity: String, expected: usize, actual: usize },
        #[error("Person {person} belongs to group {group} of '{entity}', which only has {count} groups")]
        GroupIndex { entity: String, person: usize, group: usize, count: usize },
        #[error("Entity '{entity}' has no role '{role}'")]
        UnknownRole { entity: String, role: String },
        #[error("Role code {code} is out of range for '{entity}'")]
        RoleCode { entity: String, code: RoleCode },
        #[error("Group {group} of '{entity}' has {count} members with role '{role}', at most {max} allowed")]
        MaxExceeded { entity: String, group: usize, role: String, count: usize, max: usize },
        #[error("Input for '{variable}' has {actual} values, but there are {expected} {entity}")]
        InputLength { variable: String, entity: String, expected: usize, actual: usize },
        #[error("Entity '{entity}' has no roles")]
        NotAGroup { entity: String },
    }
}

/// How persons are spread over the groups of one group entity: person `i`
/// belongs to group `group_index[i]` with flattened role `roles[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    group_index: Vec<usize>,
    roles: Vec<RoleCode>,
    group_count: usize,
}

impl Membership {
    /// Validates group indices, role codes, and the `max` bound of every role.
    pub fn new(
        entity: &Entity,
        person_count: usize,
        group_count: usize,
        group_index: Vec<usize>,
        roles: Vec<RoleCode>,
    ) -> Result<Self, PopulationError> {
        let group = entity
            .as_group()
            .ok_or_else(|| PopulationError::NotAGroup { entity: entity.key().to_string() })?;
        for actual in [group_index.len(), roles.len()] {
            if actual != person_count {
                return Err(PopulationError::MembershipLength {
                    entity: entity.key().to_string(),
                    expected: person_count,
                    actual,
                });
            }
        }
        if let Some((person, group)) = group_index.iter().enumerate().find(|(_, g)| **g >= group_count) {
            return Err(PopulationError::GroupIndex {
                entity: entity.key().to_string(),
                person,
                group: *group,
                count: group_count,
            });
        }
        if let Some(code) = roles.iter().find(|code| usize::from(**code) >= group.roles_count()) {
            return Err(PopulationError::RoleCode { entity: entity.key().to_string(), code: *code });
        }
        let membership = Self { group_index, roles, group_count };
        membership.check_max(entity.key(), group)?;
        Ok(membership)
    }

    fn check_max(&self, entity: &str, group: &GroupEntity) -> Result<(), PopulationError> {
        for role in group.roles().iter().chain(group.flattened_roles()) {
            let Some(max) = role.max() else { continue };
            let codes = group.role_codes(role);
            let mut counts: HashMap<usize, usize> = HashMap::new();
            for (group_slot, code) in self.group_index.iter().zip(&self.roles) {
                if codes.contains(code) {
                    *counts.entry(*group_slot).or_default() += 1;
                }
            }
            if let Some((group_slot, count)) = counts.into_iter().filter(|(_, count)| *count > max).min() {
                return Err(PopulationError::MaxExceeded {
                    entity: entity.to_string(),
                    group: group_slot,
                    role: role.key().to_string(),
                    count,
                    max,
                });
            }
        }
        Ok(())
    }

    pub fn group_index(&self) -> &[usize] {
        &self.group_index
    }

    pub fn roles(&self) -> &[RoleCode] {
        &self.roles
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn person_count(&self) -> usize {
        self.group_index.len()
    }

    /// `(person, group)` pairs of the persons holding one of `codes`.
    pub fn members_with<'a>(&'a self, codes: &'a [RoleCode]) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.group_index
            .iter()
            .zip(&self.roles)
            .enumerate()
            .filter(move |(_, (_, code))| codes.contains(code))
            .map(|(person, (group, _))| (person, *group))
    }
}

/// The members of one entity in a simulation.
#[derive(Debug, Clone)]
pub struct Population {
    entity: Arc<Entity>,
    count: usize,
    membership: Option<Membership>,
}

impl Population {
    pub fn persons(entity: Arc<Entity>, count: usize) -> Self {
        Self { entity, count, membership: None }
    }

    pub fn groups(entity: Arc<Entity>, membership: Membership) -> Self {
        Self { entity, count: membership.group_count(), membership: Some(membership) }
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn membership(&self) -> Option<&Membership> {
        self.membership.as_ref()
    }
}
