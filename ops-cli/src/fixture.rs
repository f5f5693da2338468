//! YAML fixtures describing principals, extra roles and an entity graph

use anyhow::{Context, Result};
use auth_permissions::{
    ActionName, Device, EntityId, Field, InMemoryEntityStore, Packet, Principal, PrincipalId,
    Project, ResourceType, RoleCatalog, RoleName,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub principals: Vec<PrincipalFixture>,
    pub roles: Vec<RoleFixture>,
    pub projects: Vec<ProjectFixture>,
    pub devices: Vec<ChildFixture>,
    pub packets: Vec<ChildFixture>,
    pub fields: Vec<FieldFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalFixture {
    pub id: u64,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub roles: Vec<RoleName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleFixture {
    pub name: RoleName,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub grants: Vec<GrantFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantFixture {
    pub resource: ResourceType,
    pub actions: Vec<ActionName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFixture {
    pub id: EntityId,
    pub name: String,
    pub owner: Option<u64>,
}

/// Device or packet; `parent` is the project or device id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildFixture {
    pub id: EntityId,
    pub name: String,
    pub parent: Option<EntityId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFixture {
    pub id: EntityId,
    pub name: String,
    pub packet: Option<EntityId>,
    #[serde(default)]
    pub parent_field: Option<EntityId>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse fixture")
    }

    /// The principal with `id`, as the authentication layer would hand it over
    pub fn principal(&self, id: u64) -> Result<Principal> {
        let entry = self
            .principals
            .iter()
            .find(|p| p.id == id)
            .with_context(|| format!("Principal {id} is not part of the fixture"))?;

        Ok(Principal {
            id: PrincipalId(entry.id),
            is_admin: entry.admin,
            is_active: entry.active,
            roles: entry.roles.iter().cloned().collect(),
        })
    }

    /// Create the extra roles and apply their grants
    pub fn apply_roles(&self, catalog: &dyn RoleCatalog) -> Result<()> {
        for role in &self.roles {
            catalog.create_role(&role.name, &role.description)?;
            for grant in &role.grants {
                let mask = catalog.grant(&role.name, &grant.resource, &grant.actions)?;
                debug!(role = %role.name, resource = %grant.resource, mask, "Fixture grant applied");
            }
        }
        Ok(())
    }

    /// Save the entity graph; missing parents leave the child detached
    pub fn populate(&self, store: &InMemoryEntityStore) -> Result<()> {
        let mut projects = HashMap::new();
        for entry in &self.projects {
            let project = Arc::new(Project {
                id: entry.id,
                name: entry.name.clone(),
                user: entry.owner.map(PrincipalId),
            });
            store.save_project(&project);
            projects.insert(entry.id, project);
        }

        let mut devices = HashMap::new();
        for entry in &self.devices {
            let device = Arc::new(Device {
                id: entry.id,
                name: entry.name.clone(),
                project: entry.parent.and_then(|id| projects.get(&id).cloned()),
            });
            store.save_device(&device)?;
            devices.insert(entry.id, device);
        }

        let mut packets = HashMap::new();
        for entry in &self.packets {
            let packet = Arc::new(Packet {
                id: entry.id,
                name: entry.name.clone(),
                device: entry.parent.and_then(|id| devices.get(&id).cloned()),
            });
            store.save_packet(&packet)?;
            packets.insert(entry.id, packet);
        }

        for entry in &self.fields {
            store.save_field(&Field {
                id: entry.id,
                name: entry.name.clone(),
                packet: entry.packet.and_then(|id| packets.get(&id).cloned()),
                parent_field: entry.parent_field,
            })?;
        }

        info!(entities = store.len(), "Fixture loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_permissions::{EntityStore, OwnershipResolver};

    const FIXTURE: &str = r#"
principals:
  - id: 1
    active: true
    roles: [RegisteredUser]
  - id: 99
    admin: true
    active: true
projects:
  - { id: 1, name: greenhouse, owner: 1 }
devices:
  - { id: 10, name: hub, parent: 1 }
  - { id: 11, name: orphan, parent: 404 }
packets:
  - { id: 100, name: climate, parent: 10 }
fields:
  - { id: 1000, name: temperature, packet: 100 }
  - { id: 1001, name: celsius, packet: 100, parent_field: 1000 }
"#;

    #[tokio::test]
    async fn test_fixture_populates_store() {
        let fixture = Fixture::from_yaml_str(FIXTURE).unwrap();
        let store = InMemoryEntityStore::new();
        fixture.populate(&store).unwrap();
        assert_eq!(store.len(), 6);

        let inner = store.load_entity(&ResourceType::field(), 1001).await.unwrap();
        assert_eq!(OwnershipResolver::new().resolve_owner(&inner).unwrap(), PrincipalId(1));

        let orphan = store.load_entity(&ResourceType::device(), 11).await.unwrap();
        assert!(OwnershipResolver::new().resolve_owner(&orphan).is_err());
    }

    #[test]
    fn test_principal_lookup() {
        let fixture = Fixture::from_yaml_str(FIXTURE).unwrap();
        let admin = fixture.principal(99).unwrap();
        assert!(admin.is_admin && admin.is_active);
        assert!(fixture.principal(2).is_err());
    }
}
