use crate::{
    error::{PermissionError, Result},
    models::{ActionName, PermissionSet, Principal, ResourceType, Role, RoleName},
    policy::DefaultPolicy,
    registry::ActionRegistry,
};
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Role and permission-set store consulted by the authorization engine.
///
/// Administrative mutations (`create_role`, `grant`, `revoke`,
/// `seed_default_role`) trust the caller's admin gate.
pub trait RoleCatalog: Send + Sync {
    /// Create a role; repeating the call with the same description is a no-op
    fn create_role(&self, name: &RoleName, description: &str) -> Result<Role>;

    fn role(&self, name: &RoleName) -> Option<Role>;

    /// OR the bits of `actions` into the role's mask for `resource_type`.
    /// Returns the updated mask.
    fn grant(
        &self,
        role: &RoleName,
        resource_type: &ResourceType,
        actions: &[ActionName],
    ) -> Result<u32>;

    /// OR a raw mask into the role's mask for `resource_type`.
    ///
    /// `MaskOutOfRange` when `mask` sets bits the registry never assigned.
    fn grant_mask(&self, role: &RoleName, resource_type: &ResourceType, mask: u32) -> Result<u32>;

    /// Clear the bits of `actions` from the role's mask. Returns the updated mask.
    fn revoke(
        &self,
        role: &RoleName,
        resource_type: &ResourceType,
        actions: &[ActionName],
    ) -> Result<u32>;

    /// Mask of a single role for one resource type (0 when absent)
    fn mask_of(&self, role: &RoleName, resource_type: &ResourceType) -> u32;

    /// Union of the masks of every role the principal holds; 0 when inactive
    fn effective_mask(&self, principal: &Principal, resource_type: &ResourceType) -> u32;

    /// Permission sets of a role ordered by resource type
    fn permission_sets(&self, role: &RoleName) -> Result<Vec<PermissionSet>>;

    /// Create the default role and apply the default policy exactly once
    fn seed_default_role(&self) -> Result<Role>;

    fn default_role_name(&self) -> &RoleName;

    /// Mark a principal active and attach the default role to non-administrators
    fn activate_principal(&self, principal: &mut Principal) -> Result<()> {
        let role = self.seed_default_role()?;
        principal.is_active = true;
        if !principal.is_admin {
            principal.roles.insert(role.name);
        }
        info!(principal = %principal.id, admin = principal.is_admin, "Principal activated");
        Ok(())
    }
}

/// In-memory role catalog.
///
/// Masks live in a `DashMap` keyed by (role, resource type): a grant or
/// revoke holds the entry's shard write lock for the whole read-modify-write,
/// and readers take the shard read lock, so a reader sees either the old or
/// the new mask.
pub struct InMemoryRoleCatalog {
    registry: Arc<ActionRegistry>,
    policy: DefaultPolicy,
    roles: DashMap<RoleName, String>,
    masks: DashMap<(RoleName, ResourceType), u32>,
    seeded: Mutex<bool>,
}

impl InMemoryRoleCatalog {
    pub fn new(registry: Arc<ActionRegistry>, policy: DefaultPolicy) -> Self {
        Self {
            registry,
            policy,
            roles: DashMap::new(),
            masks: DashMap::new(),
            seeded: Mutex::new(false),
        }
    }

    /// Catalog using the built-in default policy
    pub fn with_builtin_policy(registry: Arc<ActionRegistry>) -> Result<Self> {
        Ok(Self::new(registry, DefaultPolicy::builtin()?))
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &DefaultPolicy {
        &self.policy
    }

    fn ensure_role(&self, role: &RoleName) -> Result<()> {
        if self.roles.contains_key(role) {
            Ok(())
        } else {
            Err(PermissionError::UnknownRole(role.clone()))
        }
    }

    fn merge_bits(&self, role: &RoleName, resource_type: &ResourceType, bits: u32) -> u32 {
        if bits == 0 {
            return self.mask_of(role, resource_type);
        }
        let mut mask = self
            .masks
            .entry((role.clone(), resource_type.clone()))
            .or_insert(0);
        *mask |= bits;
        *mask
    }

    fn snapshot(&self, name: &RoleName) -> Option<Role> {
        let description = self.roles.get(name)?.value().clone();
        let mut permissions: Vec<PermissionSet> = self
            .masks
            .iter()
            .filter(|entry| entry.key().0 == *name && *entry.value() != 0)
            .map(|entry| {
                let (role, resource_type) = entry.key();
                PermissionSet::new(role.clone(), resource_type.clone(), *entry.value())
            })
            .collect();
        permissions.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));

        Some(Role {
            name: name.clone(),
            description,
            permissions,
        })
    }
}

impl RoleCatalog for InMemoryRoleCatalog {
    fn create_role(&self, name: &RoleName, description: &str) -> Result<Role> {
        match self.roles.entry(name.clone()) {
            Entry::Occupied(existing) => {
                if existing.get() != description {
                    return Err(PermissionError::RoleConflict(name.clone()));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(description.to_string());
                info!(role = %name, "Role created");
            }
        }

        self.snapshot(name)
            .ok_or_else(|| PermissionError::UnknownRole(name.clone()))
    }

    fn role(&self, name: &RoleName) -> Option<Role> {
        self.snapshot(name)
    }

    fn grant(
        &self,
        role: &RoleName,
        resource_type: &ResourceType,
        actions: &[ActionName],
    ) -> Result<u32> {
        self.ensure_role(role)?;
        let bits = self.registry.mask_for_all(resource_type, actions)?;
        let updated = self.merge_bits(role, resource_type, bits);

        info!(%role, %resource_type, bits, mask = updated, "Permission granted");
        Ok(updated)
    }

    fn grant_mask(&self, role: &RoleName, resource_type: &ResourceType, mask: u32) -> Result<u32> {
        self.ensure_role(role)?;
        self.registry.validate_mask(resource_type, mask)?;
        let updated = self.merge_bits(role, resource_type, mask);

        info!(%role, %resource_type, bits = mask, mask = updated, "Permission mask granted");
        Ok(updated)
    }

    fn revoke(
        &self,
        role: &RoleName,
        resource_type: &ResourceType,
        actions: &[ActionName],
    ) -> Result<u32> {
        self.ensure_role(role)?;
        let bits = self.registry.mask_for_all(resource_type, actions)?;
        let key = (role.clone(), resource_type.clone());

        let updated = match self.masks.get_mut(&key) {
            Some(mut mask) => {
                *mask &= !bits;
                *mask
            }
            None => 0,
        };
        // An emptied set is dropped; the predicate runs under the shard lock
        self.masks.remove_if(&key, |_, mask| *mask == 0);

        info!(%role, %resource_type, bits, mask = updated, "Permission revoked");
        Ok(updated)
    }

    fn mask_of(&self, role: &RoleName, resource_type: &ResourceType) -> u32 {
        self.masks
            .get(&(role.clone(), resource_type.clone()))
            .map_or(0, |mask| *mask)
    }

    fn effective_mask(&self, principal: &Principal, resource_type: &ResourceType) -> u32 {
        if !principal.is_active {
            return 0;
        }

        let mask = principal
            .roles
            .iter()
            .fold(0u32, |acc, role| acc | self.mask_of(role, resource_type));

        debug!(principal = %principal.id, %resource_type, mask, "Effective mask computed");
        mask
    }

    fn permission_sets(&self, role: &RoleName) -> Result<Vec<PermissionSet>> {
        self.snapshot(role)
            .map(|role| role.permissions)
            .ok_or_else(|| PermissionError::UnknownRole(role.clone()))
    }

    fn seed_default_role(&self) -> Result<Role> {
        let name = &self.policy.role.name;
        let mut seeded = self.seeded.lock();

        if !*seeded {
            // Resolve the whole table before touching the catalog
            let masks = self.policy.masks(&self.registry)?;
            for (resource_type, mask) in &masks {
                self.registry.validate_mask(resource_type, *mask)?;
            }
            self.create_role(name, &self.policy.role.description)?;
            for (resource_type, mask) in masks {
                if mask != 0 {
                    self.merge_bits(name, &resource_type, mask);
                }
            }
            *seeded = true;
            info!(role = %name, "Default role seeded");
        }

        self.snapshot(name)
            .ok_or_else(|| PermissionError::UnknownRole(name.clone()))
    }

    fn default_role_name(&self) -> &RoleName {
        &self.policy.role.name
    }
}
