use super::{Documentable, EntityError, Role, RoleDescription, Rolifiable};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Position of a role in an entity's flattened roles. Persons store this code.
pub type RoleCode = u16;

/// The codes a role covers: its subroles' codes, or its own.
pub type RoleCodes = SmallVec<[RoleCode; 4]>;

/// The role structure of a group entity.
#[derive(Debug, Clone)]
pub struct GroupEntity {
    roles_description: Vec<RoleDescription>,
    roles: Vec<Arc<Role>>,
    flattened_roles: Vec<Arc<Role>>,
    role_by_constant: HashMap<String, Arc<Role>>,
}

impl GroupEntity {
    pub(crate) fn new(entity: &str, descriptions: Vec<RoleDescription>) -> Result<Self, EntityError> {
        let mut seen = HashSet::new();
        let mut claim = |key: &str| {
            if seen.insert(key.to_string()) {
                Ok(())
            } else {
                Err(EntityError::DuplicateRole { entity: entity.to_string(), role: key.to_string() })
            }
        };

        let mut roles = Vec::with_capacity(descriptions.len());
        for description in &descriptions {
            claim(&description.key)?;
            let mut role = Role::new(description, entity);
            if !description.subroles.is_empty() {
                let mut subroles = Vec::with_capacity(description.subroles.len());
                for key in &description.subroles {
                    claim(key)?;
                    let subrole = RoleDescription::new(key.clone()).max(1);
                    subroles.push(Arc::new(Role::new(&subrole, entity)));
                }
                role = role.with_subroles(subroles);
            }
            roles.push(Arc::new(role));
        }

        let flattened_roles: Vec<Arc<Role>> = roles
            .iter()
            .flat_map(|role| {
                if role.has_subroles() {
                    role.subroles().to_vec()
                } else {
                    vec![role.clone()]
                }
            })
            .collect();

        // Top-level roles win over flattened ones on lookup.
        let mut role_by_constant = HashMap::new();
        for role in roles.iter().chain(flattened_roles.iter()) {
            role_by_constant
                .entry(role.key().to_uppercase())
                .or_insert_with(|| role.clone());
        }

        Ok(Self { roles_description: descriptions, roles, flattened_roles, role_by_constant })
    }

    pub fn roles_description(&self) -> &[RoleDescription] {
        &self.roles_description
    }

    /// Top-level roles in declaration order.
    pub fn roles(&self) -> &[Arc<Role>] {
        &self.roles
    }

    /// Roles with every role that has subroles replaced by them.
    pub fn flattened_roles(&self) -> &[Arc<Role>] {
        &self.flattened_roles
    }

    pub fn roles_count(&self) -> usize {
        self.flattened_roles.len()
    }

    /// Looks a role up by its key, uppercased: `PARENT` finds role `parent`.
    pub fn role(&self, constant: &str) -> Option<&Arc<Role>> {
        self.role_by_constant.get(&constant.to_uppercase())
    }

    pub fn role_code(&self, role: &Role) -> Option<RoleCode> {
        self.flattened_roles
            .iter()
            .position(|candidate| candidate.as_ref() == role)
            .and_then(|index| RoleCode::try_from(index).ok())
    }

    pub fn role_codes(&self, role: &Role) -> RoleCodes {
        if role.has_subroles() {
            role.subroles().iter().filter_map(|subrole| self.role_code(subrole)).collect()
        } else {
            self.role_code(role).into_iter().collect()
        }
    }

    pub fn all_role_codes(&self) -> RoleCodes {
        (0..self.flattened_roles.len())
            .filter_map(|index| RoleCode::try_from(index).ok())
            .collect()
    }

    /// The role a code designates.
    pub fn role_at(&self, code: RoleCode) -> Option<&Arc<Role>> {
        self.flattened_roles.get(usize::from(code))
    }

    /// The top-level role holding `code` (the parent of a subrole).
    pub fn top_level_role_of(&self, code: RoleCode) -> Option<&Arc<Role>> {
        let flattened = self.role_at(code)?;
        self.roles
            .iter()
            .find(|role| Arc::ptr_eq(role, flattened) || role.subroles().iter().any(|s| Arc::ptr_eq(s, flattened)))
    }
}
