//! Ownable entity graph and ownership resolution.
//!
//! Entities hold read-only `Arc` references to their parent, so an
//! already-loaded graph can be shared across concurrent checks. No entity
//! caches its owner; every check walks the chain again.

use crate::{
    error::{PermissionError, Result},
    models::{EntityId, EntityRef, PrincipalId, ResourceType},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    pub user: Option<PrincipalId>,
}

impl Project {
    pub fn new(id: EntityId, name: &str, user: PrincipalId) -> Self {
        Self {
            id,
            name: name.to_string(),
            user: Some(user),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: EntityId,
    pub name: String,
    pub project: Option<Arc<Project>>,
}

impl Device {
    pub fn new(id: EntityId, name: &str, project: &Arc<Project>) -> Self {
        Self {
            id,
            name: name.to_string(),
            project: Some(Arc::clone(project)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: EntityId,
    pub name: String,
    pub device: Option<Arc<Device>>,
}

impl Packet {
    pub fn new(id: EntityId, name: &str, device: &Arc<Device>) -> Self {
        Self {
            id,
            name: name.to_string(),
            device: Some(Arc::clone(device)),
        }
    }
}

/// A packet field. Inner fields name their enclosing field in
/// `parent_field` but still resolve ownership through `packet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub id: EntityId,
    pub name: String,
    pub packet: Option<Arc<Packet>>,
    pub parent_field: Option<EntityId>,
}

impl Field {
    pub fn new(id: EntityId, name: &str, packet: &Arc<Packet>) -> Self {
        Self {
            id,
            name: name.to_string(),
            packet: Some(Arc::clone(packet)),
            parent_field: None,
        }
    }

    pub fn inner(mut self, parent_field: EntityId) -> Self {
        self.parent_field = Some(parent_field);
        self
    }
}

/// Closed set of ownable entity kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Project(Arc<Project>),
    Device(Arc<Device>),
    Packet(Arc<Packet>),
    Field(Arc<Field>),
}

/// The single upward reference of an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// Terminal hop: the owning principal of a project
    Owner(Option<PrincipalId>),
    /// Next entity in the chain
    Entity(Option<Entity>),
}

impl Entity {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Entity::Project(_) => ResourceType::project(),
            Entity::Device(_) => ResourceType::device(),
            Entity::Packet(_) => ResourceType::packet(),
            Entity::Field(_) => ResourceType::field(),
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Entity::Project(project) => project.id,
            Entity::Device(device) => device.id,
            Entity::Packet(packet) => packet.id,
            Entity::Field(field) => field.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Project(project) => &project.name,
            Entity::Device(device) => &device.name,
            Entity::Packet(packet) => &packet.name,
            Entity::Field(field) => &field.name,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.resource_type(), self.id())
    }

    pub fn parent(&self) -> ParentRef {
        match self {
            Entity::Project(project) => ParentRef::Owner(project.user),
            Entity::Device(device) => {
                ParentRef::Entity(device.project.clone().map(Entity::Project))
            }
            Entity::Packet(packet) => ParentRef::Entity(packet.device.clone().map(Entity::Device)),
            Entity::Field(field) => ParentRef::Entity(field.packet.clone().map(Entity::Packet)),
        }
    }

    /// Name of the reference `parent()` reads, used in integrity errors
    fn parent_label(&self) -> &'static str {
        match self {
            Entity::Project(_) => "user",
            Entity::Device(_) => "project",
            Entity::Packet(_) => "device",
            Entity::Field(_) => "packet",
        }
    }
}

impl From<Project> for Entity {
    fn from(project: Project) -> Self {
        Entity::Project(Arc::new(project))
    }
}

impl From<Device> for Entity {
    fn from(device: Device) -> Self {
        Entity::Device(Arc::new(device))
    }
}

impl From<Packet> for Entity {
    fn from(packet: Packet) -> Self {
        Entity::Packet(Arc::new(packet))
    }
}

impl From<Field> for Entity {
    fn from(field: Field) -> Self {
        Entity::Field(Arc::new(field))
    }
}

/// Walks parent references up to the owning principal.
///
/// Stateless; safe to share and call concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipResolver;

impl OwnershipResolver {
    pub fn new() -> Self {
        Self
    }

    /// Owner of `entity`, one parent hop at a time.
    ///
    /// # Errors
    ///
    /// `DetachedEntity` naming the entity whose parent reference is missing.
    pub fn resolve_owner(&self, entity: &Entity) -> Result<PrincipalId> {
        let mut current = entity.clone();
        loop {
            match current.parent() {
                ParentRef::Owner(Some(owner)) => {
                    trace!(entity = %entity.entity_ref(), %owner, "Ownership resolved");
                    return Ok(owner);
                }
                ParentRef::Entity(Some(parent)) => current = parent,
                ParentRef::Owner(None) | ParentRef::Entity(None) => {
                    return Err(PermissionError::DetachedEntity {
                        entity: current.entity_ref(),
                        missing: current.parent_label(),
                    });
                }
            }
        }
    }

    /// Every entity from `entity` up to its project, in walk order
    pub fn ownership_chain(&self, entity: &Entity) -> Result<Vec<EntityRef>> {
        let mut chain = vec![entity.entity_ref()];
        let mut current = entity.clone();
        loop {
            match current.parent() {
                ParentRef::Owner(Some(_)) => return Ok(chain),
                ParentRef::Entity(Some(parent)) => {
                    chain.push(parent.entity_ref());
                    current = parent;
                }
                ParentRef::Owner(None) | ParentRef::Entity(None) => {
                    return Err(PermissionError::DetachedEntity {
                        entity: current.entity_ref(),
                        missing: current.parent_label(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(owner: u64) -> (Arc<Project>, Arc<Device>, Arc<Packet>, Arc<Field>) {
        let project = Arc::new(Project::new(1, "greenhouse", PrincipalId(owner)));
        let device = Arc::new(Device::new(10, "sensor-hub", &project));
        let packet = Arc::new(Packet::new(100, "climate", &device));
        let field = Arc::new(Field::new(1000, "temperature", &packet));
        (project, device, packet, field)
    }

    #[test]
    fn test_every_level_resolves_to_project_user() {
        let (project, device, packet, field) = graph(42);
        let resolver = OwnershipResolver::new();

        for entity in [
            Entity::Project(project),
            Entity::Device(device),
            Entity::Packet(packet),
            Entity::Field(field),
        ] {
            assert_eq!(resolver.resolve_owner(&entity).unwrap(), PrincipalId(42));
        }
    }

    #[test]
    fn test_inner_field_resolves_through_packet() {
        let (_, _, packet, field) = graph(5);
        let inner = Field::new(1001, "celsius", &packet).inner(field.id);

        let owner = OwnershipResolver::new()
            .resolve_owner(&Entity::from(inner))
            .unwrap();
        assert_eq!(owner, PrincipalId(5));
    }

    #[test]
    fn test_detached_device_reports_missing_hop() {
        let device = Device {
            id: 11,
            name: "orphan".to_string(),
            project: None,
        };
        let packet = Arc::new(Packet::new(101, "lost", &Arc::new(device)));

        let err = OwnershipResolver::new()
            .resolve_owner(&Entity::Packet(packet))
            .unwrap_err();
        assert!(matches!(
            err,
            PermissionError::DetachedEntity { ref entity, missing: "project" }
                if *entity == EntityRef::new(ResourceType::device(), 11)
        ));
    }

    #[test]
    fn test_project_without_user_is_detached() {
        let project = Project {
            id: 2,
            name: "unowned".to_string(),
            user: None,
        };
        let err = OwnershipResolver::new()
            .resolve_owner(&Entity::from(project))
            .unwrap_err();
        assert!(matches!(err, PermissionError::DetachedEntity { missing: "user", .. }));
    }

    #[test]
    fn test_ownership_chain_order() {
        let (_, _, _, field) = graph(1);
        let chain = OwnershipResolver::new()
            .ownership_chain(&Entity::Field(field))
            .unwrap();

        let rendered: Vec<String> = chain.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["Field#1000", "Packet#100", "Device#10", "Project#1"]
        );
    }
}
