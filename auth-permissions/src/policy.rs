use crate::{
    error::{PermissionError, Result},
    models::{ActionName, ResourceType, RoleName},
    registry::ActionRegistry,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Built-in policy table, embedded so seeding is identical across restarts
pub const BUILTIN_POLICY_YAML: &str = include_str!("../policy/default_policy.yaml");

pub const DEFAULT_ROLE_NAME: &str = "RegisteredUser";

/// Role description and permissions seeded for registered users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPolicy {
    pub role: DefaultRoleDefinition,
    pub permissions: Vec<PolicyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRoleDefinition {
    pub name: RoleName,
    pub description: String,
}

/// Actions granted on one resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub resource: ResourceType,
    pub actions: Vec<ActionName>,
}

impl DefaultPolicy {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_POLICY_YAML)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let policy: DefaultPolicy = serde_yaml::from_str(yaml)?;
        policy.check_shape()?;
        Ok(policy)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Resolve every entry to `(resource type, mask)` against the registry.
    ///
    /// # Errors
    ///
    /// `UnknownAction` if the table names an action the registry lacks.
    pub fn masks(&self, registry: &ActionRegistry) -> Result<Vec<(ResourceType, u32)>> {
        self.permissions
            .iter()
            .map(|entry| {
                let mask = registry.mask_for_all(&entry.resource, &entry.actions)?;
                Ok((entry.resource.clone(), mask))
            })
            .collect()
    }

    fn check_shape(&self) -> Result<()> {
        if self.role.name.as_str().trim().is_empty() {
            return Err(PermissionError::InvalidPolicy(
                "default role name is empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.permissions {
            if !seen.insert(&entry.resource) {
                return Err(PermissionError::InvalidPolicy(format!(
                    "resource '{}' listed more than once",
                    entry.resource
                )));
            }
        }
        Ok(())
    }
}
