use crate::{
    error::{PermissionError, Result},
    models::{
        ActionName, AuthorizationRequest, Decision, DenyReason, Principal, PrincipalId,
        ResourceType, TracedDecision,
    },
    ownership::{Entity, Field, OwnershipResolver},
    registry::{action_names, ActionRegistry, CrudAction},
    roles::RoleCatalog,
};
use error_common::log_coded;
use std::sync::Arc;
use tracing::{debug, info};

/// Step recorder for traced decisions; a no-op when tracing is off
struct Steps<'a>(Option<&'a mut Vec<String>>);

impl Steps<'_> {
    fn note(&mut self, step: impl FnOnce() -> String) {
        if let Some(trace) = self.0.as_mut() {
            trace.push(step());
        }
    }
}

fn log_decision(
    principal: &Principal,
    resource_type: &ResourceType,
    action: &ActionName,
    decision: Decision,
) -> Decision {
    debug!(
        principal = %principal.id,
        %resource_type,
        %action,
        %decision,
        "Authorization decision"
    );
    decision
}

/// Role and ownership based authorization engine.
///
/// Combines the frozen [`ActionRegistry`], an injected [`RoleCatalog`] and
/// the [`OwnershipResolver`]. Every check is synchronous and reads only
/// already-loaded entities.
pub struct AuthorizationEngine {
    /// Frozen (resource type, action) to bit table
    registry: Arc<ActionRegistry>,

    /// Role masks consulted for coarse permission checks
    catalog: Arc<dyn RoleCatalog>,

    /// Ownership walker for instance-level checks
    resolver: OwnershipResolver,

    /// Log the step trace of every decision
    debug_mode: bool,
}

impl AuthorizationEngine {
    pub fn new(registry: Arc<ActionRegistry>, catalog: Arc<dyn RoleCatalog>) -> Self {
        Self {
            registry,
            catalog,
            resolver: OwnershipResolver::new(),
            debug_mode: false,
        }
    }

    /// Enable debug mode for detailed decision traces
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<dyn RoleCatalog> {
        &self.catalog
    }

    pub fn resolver(&self) -> &OwnershipResolver {
        &self.resolver
    }

    // =============================================================================
    // Core Authorization Operations
    // =============================================================================

    /// Decide whether `principal` may perform `action` on `resource_type`,
    /// optionally on a specific entity.
    ///
    /// Checks run in a fixed order: administrator bypass, activation, role
    /// mask, then ownership. Pass the entity for instance-level checks
    /// (update, remove, find); for a save the new entity carries the parent
    /// references ownership is resolved from.
    ///
    /// # Errors
    ///
    /// `UnknownAction` for unregistered actions and `DetachedEntity` when the
    /// ownership chain of `entity` is broken. Denials are `Ok(Decision::Deny)`.
    pub fn authorize(
        &self,
        principal: &Principal,
        resource_type: &ResourceType,
        action: &ActionName,
        entity: Option<&Entity>,
    ) -> Result<Decision> {
        if self.debug_mode {
            let traced = self.authorize_traced(principal, resource_type, action, entity)?;
            debug!(
                principal = %principal.id,
                %resource_type,
                %action,
                trace = ?traced.trace,
                "Decision trace"
            );
            return Ok(traced.decision);
        }
        self.evaluate(principal, resource_type, action, entity, Steps(None))
    }

    /// Same as [`Self::authorize`], also returning the steps taken
    pub fn authorize_traced(
        &self,
        principal: &Principal,
        resource_type: &ResourceType,
        action: &ActionName,
        entity: Option<&Entity>,
    ) -> Result<TracedDecision> {
        let mut trace = Vec::new();
        let decision = self.evaluate(
            principal,
            resource_type,
            action,
            entity,
            Steps(Some(&mut trace)),
        )?;
        Ok(TracedDecision { decision, trace })
    }

    /// Evaluate every request independently
    pub fn batch_authorize(
        &self,
        principal: &Principal,
        requests: &[AuthorizationRequest],
    ) -> Vec<Result<Decision>> {
        debug!(principal = %principal.id, count = requests.len(), "Batch authorization");

        requests
            .iter()
            .map(|request| {
                self.authorize(
                    principal,
                    &request.resource_type,
                    &request.action,
                    request.entity.as_ref(),
                )
            })
            .collect()
    }

    fn evaluate(
        &self,
        principal: &Principal,
        resource_type: &ResourceType,
        action: &ActionName,
        entity: Option<&Entity>,
        mut steps: Steps<'_>,
    ) -> Result<Decision> {
        if principal.is_admin && principal.is_active {
            self.registry.bit_for(resource_type, action)?;
            steps.note(|| format!("{} is an active administrator", principal.id));
            // Broken chains are integrity faults even for administrators
            if let Some(entity) = entity {
                self.owner_of(entity)?;
                steps.note(|| format!("ownership chain of {} is intact", entity.entity_ref()));
            }
            return Ok(log_decision(principal, resource_type, action, Decision::Allow));
        }

        if !principal.is_active {
            steps.note(|| format!("{} is not active", principal.id));
            return Ok(log_decision(
                principal,
                resource_type,
                action,
                Decision::Deny(DenyReason::Inactive),
            ));
        }

        let bit = self.registry.mask_for(resource_type, action)?;
        let mask = self.catalog.effective_mask(principal, resource_type);
        steps.note(|| format!("effective {resource_type} mask {mask}, {action} bit {bit}"));
        if mask & bit == 0 {
            return Ok(log_decision(
                principal,
                resource_type,
                action,
                Decision::Deny(DenyReason::MissingPermission),
            ));
        }

        if let Some(entity) = entity {
            let owner = self.owner_of(entity)?;
            steps.note(|| format!("{} is owned by {owner}", entity.entity_ref()));
            if owner != principal.id {
                return Ok(log_decision(
                    principal,
                    resource_type,
                    action,
                    Decision::Deny(DenyReason::NotOwner),
                ));
            }
        }

        Ok(log_decision(principal, resource_type, action, Decision::Allow))
    }

    fn owner_of(&self, entity: &Entity) -> Result<PrincipalId> {
        self.resolver.resolve_owner(entity).inspect_err(|err| {
            log_coded("ownership walk", err);
        })
    }

    // =============================================================================
    // Listing Operations
    // =============================================================================

    /// Actions the principal may perform on `resource_type`, ignoring ownership
    pub fn allowed_actions(
        &self,
        principal: &Principal,
        resource_type: &ResourceType,
    ) -> Vec<ActionName> {
        if !principal.is_active {
            return Vec::new();
        }
        if principal.is_admin {
            return self.registry.actions(resource_type).to_vec();
        }

        let mask = self.catalog.effective_mask(principal, resource_type);
        self.registry.actions_in_mask(resource_type, mask)
    }

    /// Filter a find-all result down to what the principal may see.
    ///
    /// Requires `find_all` on `resource_type`; a denied principal sees nothing.
    /// Non-administrators keep only entities they own.
    ///
    /// # Errors
    ///
    /// `DetachedEntity` for any entity with a broken ownership chain.
    pub fn filter_visible<I>(
        &self,
        principal: &Principal,
        resource_type: &ResourceType,
        entities: I,
    ) -> Result<Vec<Entity>>
    where
        I: IntoIterator<Item = Entity>,
    {
        let decision =
            self.authorize(principal, resource_type, &CrudAction::FindAll.name(), None)?;
        if !decision.is_allowed() {
            return Ok(Vec::new());
        }

        let mut visible = Vec::new();
        for entity in entities {
            let owner = self.owner_of(&entity)?;
            if principal.is_admin || owner == principal.id {
                visible.push(entity);
            }
        }

        debug!(principal = %principal.id, %resource_type, visible = visible.len(), "Filtered find-all result");
        Ok(visible)
    }

    // =============================================================================
    // Specialised Checks
    // =============================================================================

    /// Authorize a CRUD action on a packet field.
    ///
    /// Field operations are gated on the owning packet: the principal needs
    /// `fields_management` and `find` on that packet and must own it.
    pub fn authorize_field_management(
        &self,
        principal: &Principal,
        action: &ActionName,
        field: &Arc<Field>,
    ) -> Result<Decision> {
        let field_entity = Entity::Field(Arc::clone(field));
        self.registry.bit_for(&field_entity.resource_type(), action)?;

        let packet = field
            .packet
            .clone()
            .map(Entity::Packet)
            .ok_or_else(|| PermissionError::DetachedEntity {
                entity: field_entity.entity_ref(),
                missing: "packet",
            })?;

        let packet_type = ResourceType::packet();
        for gate in [
            ActionName::new(action_names::FIELDS_MANAGEMENT),
            CrudAction::Find.name(),
        ] {
            let decision = self.authorize(principal, &packet_type, &gate, Some(&packet))?;
            if !decision.is_allowed() {
                return Ok(decision);
            }
        }
        Ok(Decision::Allow)
    }

    /// Re-check the administrative gate through `manage_permissions`
    pub fn authorize_administration(&self, principal: &Principal) -> Result<Decision> {
        let decision = self.authorize(
            principal,
            &ResourceType::permission(),
            &ActionName::new(action_names::MANAGE_PERMISSIONS),
            None,
        )?;
        if !decision.is_allowed() {
            info!(principal = %principal.id, %decision, "Administrative access refused");
        }
        Ok(decision)
    }
}
