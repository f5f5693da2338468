use crate::ownership::Entity;
use error_common::{codes, CodedError, ErrorCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Well-known resource type names of the platform
pub mod resources {
    pub const PROJECT: &str = "Project";
    pub const DEVICE: &str = "Device";
    pub const PACKET: &str = "Packet";
    pub const FIELD: &str = "Field";
    pub const PERMISSION: &str = "Permission";
}

/// Identifier of persisted entities (projects, devices, packets, fields)
pub type EntityId = u64;

/// A named category of protected entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn project() -> Self {
        Self::new(resources::PROJECT)
    }

    pub fn device() -> Self {
        Self::new(resources::DEVICE)
    }

    pub fn packet() -> Self {
        Self::new(resources::PACKET)
    }

    pub fn field() -> Self {
        Self::new(resources::FIELD)
    }

    pub fn permission() -> Self {
        Self::new(resources::PERMISSION)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named operation on a resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionName(String);

impl ActionName {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Name of a role in the role catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub u64);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Resource type and id of a single entity, used in errors and cascade reports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub resource_type: ResourceType,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(resource_type: ResourceType, id: EntityId) -> Self {
        Self { resource_type, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource_type, self.id)
    }
}

/// The already-authenticated caller.
///
/// An inactive principal holds no effective permissions regardless of the
/// roles attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub is_admin: bool,
    pub is_active: bool,
    pub roles: BTreeSet<RoleName>,
}

impl Principal {
    /// A freshly registered, not yet activated user
    pub fn new(id: u64) -> Self {
        Self {
            id: PrincipalId(id),
            is_admin: false,
            is_active: false,
            roles: BTreeSet::new(),
        }
    }

    /// An active administrator
    pub fn admin(id: u64) -> Self {
        Self {
            id: PrincipalId(id),
            is_admin: true,
            is_active: true,
            roles: BTreeSet::new(),
        }
    }

    pub fn active(mut self) -> Self {
        self.is_active = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn with_role(mut self, role: &RoleName) -> Self {
        self.roles.insert(role.clone());
        self
    }

    pub fn has_role(&self, role: &RoleName) -> bool {
        self.roles.contains(role)
    }
}

/// Bitmask of actions granted to a role for one resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub name: String,
    pub role: RoleName,
    pub resource_type: ResourceType,
    pub action_mask: u32,
}

impl PermissionSet {
    pub fn new(role: RoleName, resource_type: ResourceType, action_mask: u32) -> Self {
        Self {
            name: format!("{} {} Permissions", resource_type, role),
            role,
            resource_type,
            action_mask,
        }
    }
}

/// Snapshot of a role and its permission sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: RoleName,
    pub description: String,
    pub permissions: Vec<PermissionSet>,
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Principal has not been activated
    Inactive,
    /// Role masks lack the action bit
    MissingPermission,
    /// Ownership walk resolved to a different principal
    NotOwner,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Inactive => f.write_str("principal is not active"),
            DenyReason::MissingPermission => f.write_str("missing permission"),
            DenyReason::NotOwner => f.write_str("principal is not the owner"),
        }
    }
}

impl CodedError for DenyReason {
    fn code(&self) -> &'static str {
        match self {
            DenyReason::Inactive => codes::authorization::ACCOUNT_INACTIVE,
            DenyReason::MissingPermission => codes::authorization::INSUFFICIENT_PERMISSIONS,
            DenyReason::NotOwner => codes::authorization::NOT_OWNER,
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Denial
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Deny(reason) => write!(f, "deny ({})", reason),
        }
    }
}

/// Decision plus the steps the engine took to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedDecision {
    pub decision: Decision,
    pub trace: Vec<String>,
}

/// One entry of a batch authorization call
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub resource_type: ResourceType,
    pub action: ActionName,
    pub entity: Option<Entity>,
}

impl AuthorizationRequest {
    pub fn new(resource_type: ResourceType, action: ActionName) -> Self {
        Self {
            resource_type,
            action,
            entity: None,
        }
    }

    pub fn on(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }
}
