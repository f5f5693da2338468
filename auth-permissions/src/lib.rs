//! Role and ownership based authorization engine for the HyperIoT platform
//!
//! Every entity of the platform (Project → Device → Packet → Field) is
//! protected by two orthogonal mechanisms:
//! - Role permissions: per resource type bitmasks of registered actions
//! - Ownership: an entity is reachable only by the user owning its project,
//!   or by an administrator
//!
//! # Core Concepts
//!
//! - **ActionRegistry**: frozen table mapping (resource type, action) to a bit
//! - **RoleCatalog**: roles holding one permission mask per resource type
//! - **OwnershipResolver**: walks parent references up to the project owner
//! - **AuthorizationEngine**: activation, mask and ownership checks in order
//! - **CascadeAuthorizer**: one decision for a whole subtree, before mutation
//!
//! # Example
//!
//! ```rust
//! use auth_permissions::{
//!     ActionRegistry, AuthorizationEngine, CrudAction, Decision, Device, Entity,
//!     InMemoryRoleCatalog, Packet, Principal, PrincipalId, Project, ResourceType,
//!     RoleCatalog,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ActionRegistry::standard()?);
//! let catalog = Arc::new(InMemoryRoleCatalog::with_builtin_policy(registry.clone())?);
//!
//! let mut user = Principal::new(1);
//! catalog.activate_principal(&mut user)?;
//!
//! let engine = AuthorizationEngine::new(registry, catalog);
//!
//! let project = Arc::new(Project::new(10, "greenhouse", PrincipalId(1)));
//! let device = Arc::new(Device::new(20, "sensor-hub", &project));
//! let packet = Entity::from(Packet::new(30, "climate", &device));
//!
//! let decision = engine.authorize(
//!     &user,
//!     &ResourceType::packet(),
//!     &CrudAction::Remove.name(),
//!     Some(&packet),
//! )?;
//! assert_eq!(decision, Decision::Allow);
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cascade;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod ownership;
pub mod policy;
pub mod registry;
pub mod roles;
pub mod store;

pub use bootstrap::PermissionContext;
pub use cascade::*;
pub use crate::config::PermissionsConfig;
pub use engine::AuthorizationEngine;
pub use error::*;
pub use models::*;
pub use ownership::*;
pub use policy::{DefaultPolicy, DEFAULT_ROLE_NAME};
pub use registry::*;
pub use roles::*;
pub use store::*;
