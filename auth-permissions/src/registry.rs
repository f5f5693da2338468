use crate::{
    error::{PermissionError, Result},
    models::{ActionName, ResourceType},
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Each resource type owns one 32-bit action mask
pub const MAX_ACTIONS_PER_RESOURCE: usize = 32;

/// Base CRUD actions every resource type receives first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrudAction {
    Save,
    Update,
    Remove,
    Find,
    FindAll,
}

impl CrudAction {
    pub const ALL: [CrudAction; 5] = [
        CrudAction::Save,
        CrudAction::Update,
        CrudAction::Remove,
        CrudAction::Find,
        CrudAction::FindAll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CrudAction::Save => "save",
            CrudAction::Update => "update",
            CrudAction::Remove => "remove",
            CrudAction::Find => "find",
            CrudAction::FindAll => "find_all",
        }
    }

    pub fn name(self) -> ActionName {
        ActionName::new(self.as_str())
    }
}

impl From<CrudAction> for ActionName {
    fn from(action: CrudAction) -> Self {
        action.name()
    }
}

/// Type-specific actions registered after the CRUD list
pub mod action_names {
    pub const ALGORITHMS_MANAGEMENT: &str = "algorithms_management";
    pub const AREAS_MANAGEMENT: &str = "areas_management";
    pub const DEVICE_LIST: &str = "device_list";
    pub const MANAGE_RULES: &str = "manage_rules";
    pub const PACKETS_MANAGEMENT: &str = "packets_management";
    pub const FIELDS_MANAGEMENT: &str = "fields_management";
    pub const MANAGE_PERMISSIONS: &str = "manage_permissions";
}

/// Startup-time registration of actions.
///
/// Registration is append-only: each action takes the next free bit of its
/// resource type, so existing bit positions never move. Calling
/// [`ActionRegistryBuilder::build`] freezes the table.
#[derive(Debug, Default)]
pub struct ActionRegistryBuilder {
    resources: BTreeMap<ResourceType, Vec<ActionName>>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` for `resource_type` and return its bit position.
    ///
    /// # Errors
    ///
    /// `DuplicateAction` if the pair exists, `RegistryExhausted` once all 32
    /// bits of the resource type are taken.
    pub fn register_action(
        &mut self,
        resource_type: &ResourceType,
        action: &ActionName,
    ) -> Result<u8> {
        let actions = self.resources.entry(resource_type.clone()).or_default();

        if actions.contains(action) {
            return Err(PermissionError::DuplicateAction {
                resource_type: resource_type.clone(),
                action: action.clone(),
            });
        }

        if actions.len() >= MAX_ACTIONS_PER_RESOURCE {
            return Err(PermissionError::RegistryExhausted {
                resource_type: resource_type.clone(),
            });
        }

        let position = u8::try_from(actions.len()).map_err(|_| PermissionError::RegistryExhausted {
            resource_type: resource_type.clone(),
        })?;
        actions.push(action.clone());

        debug!(%resource_type, %action, position, "Registered action");
        Ok(position)
    }

    /// Register the base CRUD list for a resource type
    pub fn register_crud(&mut self, resource_type: &ResourceType) -> Result<()> {
        for action in CrudAction::ALL {
            self.register_action(resource_type, &action.name())?;
        }
        Ok(())
    }

    pub fn build(self) -> ActionRegistry {
        info!(
            resource_types = self.resources.len(),
            "Action registry frozen"
        );
        ActionRegistry {
            resources: self.resources,
        }
    }
}

/// Read-only table mapping (resource type, action) to a bit position
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    resources: BTreeMap<ResourceType, Vec<ActionName>>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::new()
    }

    /// The platform's action table for projects, devices, packets and fields
    pub fn standard() -> Result<Self> {
        let mut builder = Self::builder();

        let project = ResourceType::project();
        builder.register_crud(&project)?;
        for name in [
            action_names::ALGORITHMS_MANAGEMENT,
            action_names::AREAS_MANAGEMENT,
            action_names::DEVICE_LIST,
            action_names::MANAGE_RULES,
        ] {
            builder.register_action(&project, &ActionName::new(name))?;
        }

        let device = ResourceType::device();
        builder.register_crud(&device)?;
        builder.register_action(&device, &ActionName::new(action_names::PACKETS_MANAGEMENT))?;

        let packet = ResourceType::packet();
        builder.register_crud(&packet)?;
        builder.register_action(&packet, &ActionName::new(action_names::FIELDS_MANAGEMENT))?;

        builder.register_crud(&ResourceType::field())?;

        let permission = ResourceType::permission();
        builder.register_crud(&permission)?;
        builder.register_action(
            &permission,
            &ActionName::new(action_names::MANAGE_PERMISSIONS),
        )?;

        Ok(builder.build())
    }

    /// Bit position of an action.
    ///
    /// # Errors
    ///
    /// `UnknownAction` when the pair was never registered.
    pub fn bit_for(&self, resource_type: &ResourceType, action: &ActionName) -> Result<u8> {
        self.resources
            .get(resource_type)
            .and_then(|actions| actions.iter().position(|a| a == action))
            .and_then(|position| u8::try_from(position).ok())
            .ok_or_else(|| PermissionError::UnknownAction {
                resource_type: resource_type.clone(),
                action: action.clone(),
            })
    }

    /// Single-bit mask of an action (`1 << bit_for`)
    pub fn mask_for(&self, resource_type: &ResourceType, action: &ActionName) -> Result<u32> {
        let bit = self.bit_for(resource_type, action)?;
        Ok(1u32 << bit)
    }

    /// OR of the masks of every listed action
    pub fn mask_for_all(&self, resource_type: &ResourceType, actions: &[ActionName]) -> Result<u32> {
        actions.iter().try_fold(0u32, |mask, action| {
            Ok(mask | self.mask_for(resource_type, action)?)
        })
    }

    /// Mask with every registered bit of the resource type set
    pub fn registered_mask(&self, resource_type: &ResourceType) -> u32 {
        let count = self.actions(resource_type).len();
        u32::try_from(count)
            .ok()
            .and_then(|count| 1u32.checked_shl(count))
            .map_or(u32::MAX, |bound| bound - 1)
    }

    /// Reject masks that set bits nobody registered
    pub fn validate_mask(&self, resource_type: &ResourceType, mask: u32) -> Result<()> {
        if mask & !self.registered_mask(resource_type) != 0 {
            return Err(PermissionError::MaskOutOfRange {
                resource_type: resource_type.clone(),
                mask,
            });
        }
        Ok(())
    }

    /// Names of the actions whose bits are set in `mask`, in bit order
    pub fn actions_in_mask(&self, resource_type: &ResourceType, mask: u32) -> Vec<ActionName> {
        self.actions(resource_type)
            .iter()
            .enumerate()
            .filter(|(position, _)| {
                u32::try_from(*position)
                    .ok()
                    .and_then(|p| 1u32.checked_shl(p))
                    .is_some_and(|bit| mask & bit != 0)
            })
            .map(|(_, action)| action.clone())
            .collect()
    }

    pub fn actions(&self, resource_type: &ResourceType) -> &[ActionName] {
        self.resources
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.resources.keys()
    }
}
