use crate::models::{ActionName, EntityId, EntityRef, ResourceType, RoleName};
use error_common::{codes, CodedError, ErrorCategory};
use thiserror::Error;

/// Failures of the permission core.
///
/// Authorization denials are not errors; they are returned as
/// [`crate::Decision::Deny`]. Everything here either aborts startup
/// (registry and configuration misuse) or aborts the enclosing request
/// (integrity violations, missing records).
#[derive(Error, Debug)]
pub enum PermissionError {
    #[error("Action '{action}' is already registered for resource type '{resource_type}'")]
    DuplicateAction {
        resource_type: ResourceType,
        action: ActionName,
    },

    #[error("Resource type '{resource_type}' has no free action bits left")]
    RegistryExhausted { resource_type: ResourceType },

    #[error("Action '{action}' is not registered for resource type '{resource_type}'")]
    UnknownAction {
        resource_type: ResourceType,
        action: ActionName,
    },

    #[error("Mask {mask:#x} sets bits not registered for resource type '{resource_type}'")]
    MaskOutOfRange {
        resource_type: ResourceType,
        mask: u32,
    },

    #[error("Role not found: {0}")]
    UnknownRole(RoleName),

    #[error("Role {0} already exists with a different description")]
    RoleConflict(RoleName),

    #[error("Detached entity {entity}: missing {missing} reference in ownership chain")]
    DetachedEntity {
        entity: EntityRef,
        missing: &'static str,
    },

    #[error("{resource_type} {id} not found")]
    NotFound {
        resource_type: ResourceType,
        id: EntityId,
    },

    #[error("Entity {entity} cannot change parent from {from:?} to {to:?}")]
    Reparenting {
        entity: EntityRef,
        from: Option<EntityId>,
        to: Option<EntityId>,
    },

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Policy parse error: {0}")]
    PolicyParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodedError for PermissionError {
    fn code(&self) -> &'static str {
        match self {
            PermissionError::DuplicateAction { .. } => codes::registry::DUPLICATE_ACTION,
            PermissionError::RegistryExhausted { .. } => codes::registry::REGISTRY_EXHAUSTED,
            PermissionError::UnknownAction { .. } => codes::registry::UNKNOWN_ACTION,
            PermissionError::MaskOutOfRange { .. } => codes::registry::MASK_OUT_OF_RANGE,
            PermissionError::UnknownRole(_) => codes::authorization::UNKNOWN_ROLE,
            PermissionError::RoleConflict(_) => codes::authorization::ROLE_CONFLICT,
            PermissionError::DetachedEntity { .. } => codes::integrity::DETACHED_ENTITY,
            PermissionError::NotFound { .. } => codes::database::NOT_FOUND,
            PermissionError::Reparenting { .. } => codes::integrity::REPARENTING,
            PermissionError::InvalidPolicy(_) | PermissionError::PolicyParse(_) => {
                codes::configuration::INVALID_POLICY
            }
            PermissionError::Config(_) | PermissionError::Io(_) => {
                codes::configuration::LOAD_FAILED
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            PermissionError::DuplicateAction { .. }
            | PermissionError::RegistryExhausted { .. }
            | PermissionError::UnknownAction { .. }
            | PermissionError::MaskOutOfRange { .. } => ErrorCategory::Registry,
            PermissionError::DetachedEntity { .. } | PermissionError::Reparenting { .. } => {
                ErrorCategory::Integrity
            }
            PermissionError::NotFound { .. } => ErrorCategory::NotFound,
            PermissionError::UnknownRole(_)
            | PermissionError::RoleConflict(_)
            | PermissionError::InvalidPolicy(_)
            | PermissionError::Config(_)
            | PermissionError::PolicyParse(_)
            | PermissionError::Io(_) => ErrorCategory::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, PermissionError>;
