use crate::{
    cascade::CascadePlan,
    error::{PermissionError, Result},
    models::{resources, EntityId, EntityRef, ResourceType},
    ownership::{Device, Entity, Field, Packet, Project},
};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Persistence collaborator supplying already-loaded entity graphs
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load one entity with its full parent chain
    async fn load_entity(&self, resource_type: &ResourceType, id: EntityId) -> Result<Entity>;

    /// Direct children of an entity in ascending id order
    async fn load_children(&self, entity: &Entity) -> Result<Vec<Entity>>;
}

/// Stored row of a device, packet or field; parents are kept by id
#[derive(Debug, Clone)]
struct Row {
    name: String,
    parent: Option<EntityId>,
    parent_field: Option<EntityId>,
}

/// In-memory entity store for testing and development.
///
/// Rows keep parent ids, and every load rebuilds the parent chain from the
/// current rows, so a loaded entity never carries a stale owner.
pub struct InMemoryEntityStore {
    projects: DashMap<EntityId, Project>,
    devices: DashMap<EntityId, Row>,
    packets: DashMap<EntityId, Row>,
    fields: DashMap<EntityId, Row>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            projects: DashMap::new(),
            devices: DashMap::new(),
            packets: DashMap::new(),
            fields: DashMap::new(),
        }
    }

    /// Insert or update a project; the owner may change, the id may not
    pub fn save_project(&self, project: &Project) {
        self.projects.insert(project.id, project.clone());
        debug!(project = project.id, "Project saved");
    }

    /// Insert or update a device.
    ///
    /// # Errors
    ///
    /// `Reparenting` when a stored device would change project, including
    /// being detached from or attached to one after creation.
    pub fn save_device(&self, device: &Device) -> Result<()> {
        let row = Row {
            name: device.name.clone(),
            parent: device.project.as_ref().map(|project| project.id),
            parent_field: None,
        };
        Self::upsert(&self.devices, EntityRef::new(ResourceType::device(), device.id), row)
    }

    pub fn save_packet(&self, packet: &Packet) -> Result<()> {
        let row = Row {
            name: packet.name.clone(),
            parent: packet.device.as_ref().map(|device| device.id),
            parent_field: None,
        };
        Self::upsert(&self.packets, EntityRef::new(ResourceType::packet(), packet.id), row)
    }

    pub fn save_field(&self, field: &Field) -> Result<()> {
        let row = Row {
            name: field.name.clone(),
            parent: field.packet.as_ref().map(|packet| packet.id),
            parent_field: field.parent_field,
        };
        Self::upsert(&self.fields, EntityRef::new(ResourceType::field(), field.id), row)
    }

    /// Save an entity of any kind
    pub fn save(&self, entity: &Entity) -> Result<()> {
        match entity {
            Entity::Project(project) => {
                self.save_project(project);
                Ok(())
            }
            Entity::Device(device) => self.save_device(device),
            Entity::Packet(packet) => self.save_packet(packet),
            Entity::Field(field) => self.save_field(field),
        }
    }

    fn upsert(rows: &DashMap<EntityId, Row>, entity: EntityRef, row: Row) -> Result<()> {
        match rows.entry(entity.id) {
            Entry::Occupied(mut existing) => {
                let previous = existing.get();
                // Parent references are fixed once the row exists
                for (from, to) in [
                    (previous.parent, row.parent),
                    (previous.parent_field, row.parent_field),
                ] {
                    if from != to {
                        return Err(PermissionError::Reparenting { entity, from, to });
                    }
                }
                existing.insert(row);
            }
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
        }
        debug!(%entity, "Entity saved");
        Ok(())
    }

    /// Mutation pass of an authorized cascade: delete every planned node,
    /// children before parents. Returns the number of rows removed.
    pub fn apply_removal(&self, plan: &CascadePlan) -> usize {
        let mut removed = 0;
        for node in plan.nodes.iter().rev() {
            if self.remove(node) {
                removed += 1;
            }
        }

        info!(root = ?plan.root(), removed, "Cascade removal applied");
        removed
    }

    fn remove(&self, node: &EntityRef) -> bool {
        match node.resource_type.as_str() {
            resources::PROJECT => self.projects.remove(&node.id).is_some(),
            resources::DEVICE => self.devices.remove(&node.id).is_some(),
            resources::PACKET => self.packets.remove(&node.id).is_some(),
            resources::FIELD => self.fields.remove(&node.id).is_some(),
            _ => false,
        }
    }

    pub fn contains(&self, node: &EntityRef) -> bool {
        match node.resource_type.as_str() {
            resources::PROJECT => self.projects.contains_key(&node.id),
            resources::DEVICE => self.devices.contains_key(&node.id),
            resources::PACKET => self.packets.contains_key(&node.id),
            resources::FIELD => self.fields.contains_key(&node.id),
            _ => false,
        }
    }

    /// Total number of stored entities
    pub fn len(&self) -> usize {
        self.projects.len() + self.devices.len() + self.packets.len() + self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =============================================================================
    // Graph assembly
    // =============================================================================

    fn project(&self, id: EntityId) -> Option<Arc<Project>> {
        self.projects.get(&id).map(|project| Arc::new(project.clone()))
    }

    fn device(&self, id: EntityId) -> Option<Arc<Device>> {
        let row = self.devices.get(&id)?.clone();
        Some(Arc::new(Device {
            id,
            name: row.name,
            project: row.parent.and_then(|parent| self.project(parent)),
        }))
    }

    fn packet(&self, id: EntityId) -> Option<Arc<Packet>> {
        let row = self.packets.get(&id)?.clone();
        Some(Arc::new(Packet {
            id,
            name: row.name,
            device: row.parent.and_then(|parent| self.device(parent)),
        }))
    }

    fn field(&self, id: EntityId) -> Option<Arc<Field>> {
        let row = self.fields.get(&id)?.clone();
        Some(Arc::new(Field {
            id,
            name: row.name,
            packet: row.parent.and_then(|parent| self.packet(parent)),
            parent_field: row.parent_field,
        }))
    }

    /// Ids of rows matching `predicate`, sorted; iteration guards are released
    /// before the caller rebuilds entities
    fn child_ids(rows: &DashMap<EntityId, Row>, predicate: impl Fn(&Row) -> bool) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = rows
            .iter()
            .filter(|row| predicate(row.value()))
            .map(|row| *row.key())
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn load_entity(&self, resource_type: &ResourceType, id: EntityId) -> Result<Entity> {
        let entity = match resource_type.as_str() {
            resources::PROJECT => self.project(id).map(Entity::Project),
            resources::DEVICE => self.device(id).map(Entity::Device),
            resources::PACKET => self.packet(id).map(Entity::Packet),
            resources::FIELD => self.field(id).map(Entity::Field),
            _ => None,
        };

        entity.ok_or_else(|| PermissionError::NotFound {
            resource_type: resource_type.clone(),
            id,
        })
    }

    async fn load_children(&self, entity: &Entity) -> Result<Vec<Entity>> {
        let id = entity.id();
        let children = match entity {
            Entity::Project(_) => Self::child_ids(&self.devices, |row| row.parent == Some(id))
                .into_iter()
                .filter_map(|child| self.device(child).map(Entity::Device))
                .collect(),
            Entity::Device(_) => Self::child_ids(&self.packets, |row| row.parent == Some(id))
                .into_iter()
                .filter_map(|child| self.packet(child).map(Entity::Packet))
                .collect(),
            Entity::Packet(_) => Self::child_ids(&self.fields, |row| {
                row.parent == Some(id) && row.parent_field.is_none()
            })
            .into_iter()
            .filter_map(|child| self.field(child).map(Entity::Field))
            .collect(),
            Entity::Field(_) => Self::child_ids(&self.fields, |row| row.parent_field == Some(id))
                .into_iter()
                .filter_map(|child| self.field(child).map(Entity::Field))
                .collect(),
        };

        Ok(children)
    }
}
