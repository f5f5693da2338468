//! Command implementations returning serializable reports

use crate::fixture::Fixture;
use anyhow::Result;
use auth_permissions::{
    ActionName, CascadeDecision, Decision, EntityId, EntityStore, InMemoryEntityStore,
    PermissionContext, ResourceType,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ActionRow {
    pub resource_type: ResourceType,
    pub action: ActionName,
    pub bit: u8,
    pub mask: u32,
}

#[derive(Debug, Serialize)]
pub struct PolicyRow {
    pub name: String,
    pub resource_type: ResourceType,
    pub mask: u32,
    pub actions: Vec<ActionName>,
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub principal: u64,
    pub resource_type: ResourceType,
    pub action: ActionName,
    pub entity: Option<String>,
    pub decision: Decision,
    pub trace: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CascadeReport {
    pub principal: u64,
    pub root: String,
    pub decision: CascadeDecision,
    pub removed: Option<usize>,
}

/// Request for a single decision against a fixture
pub struct CheckRequest<'a> {
    pub principal: u64,
    pub resource_type: &'a ResourceType,
    pub action: &'a ActionName,
    pub entity: Option<(ResourceType, EntityId)>,
}

/// Every registered action with its bit position and mask
pub fn actions(context: &PermissionContext) -> Result<Vec<ActionRow>> {
    let mut rows = Vec::new();
    for resource_type in context.registry.resource_types() {
        for action in context.registry.actions(resource_type) {
            rows.push(ActionRow {
                resource_type: resource_type.clone(),
                action: action.clone(),
                bit: context.registry.bit_for(resource_type, action)?,
                mask: context.registry.mask_for(resource_type, action)?,
            });
        }
    }
    Ok(rows)
}

/// Permission sets of the default role
pub fn policy(context: &PermissionContext) -> Result<Vec<PolicyRow>> {
    let sets = context
        .catalog
        .permission_sets(context.catalog.default_role_name())?;

    Ok(sets
        .into_iter()
        .map(|set| PolicyRow {
            actions: context
                .registry
                .actions_in_mask(&set.resource_type, set.action_mask),
            name: set.name,
            resource_type: set.resource_type,
            mask: set.action_mask,
        })
        .collect())
}

fn prepare(context: &PermissionContext, fixture: &Fixture) -> Result<InMemoryEntityStore> {
    fixture.apply_roles(context.catalog.as_ref())?;
    let store = InMemoryEntityStore::new();
    fixture.populate(&store)?;
    Ok(store)
}

pub async fn check(
    context: &PermissionContext,
    fixture: &Fixture,
    request: CheckRequest<'_>,
) -> Result<CheckReport> {
    let store = prepare(context, fixture)?;
    let principal = fixture.principal(request.principal)?;

    let entity = match &request.entity {
        Some((resource_type, id)) => Some(store.load_entity(resource_type, *id).await?),
        None => None,
    };

    let traced = context.engine.authorize_traced(
        &principal,
        request.resource_type,
        request.action,
        entity.as_ref(),
    )?;

    info!(principal = %principal.id, decision = %traced.decision, "Check completed");
    Ok(CheckReport {
        principal: request.principal,
        resource_type: request.resource_type.clone(),
        action: request.action.clone(),
        entity: entity.map(|e| e.entity_ref().to_string()),
        decision: traced.decision,
        trace: traced.trace,
    })
}

/// Authorize a cascade from a fixture root; with `apply` the plan is removed
pub async fn cascade(
    context: &PermissionContext,
    fixture: &Fixture,
    principal: u64,
    action: &ActionName,
    root: (ResourceType, EntityId),
    apply: bool,
) -> Result<CascadeReport> {
    let store = prepare(context, fixture)?;
    let caller = fixture.principal(principal)?;
    let root_entity = store.load_entity(&root.0, root.1).await?;

    let decision = context
        .cascade
        .authorize_subtree(&store, &caller, action, &root_entity)
        .await?;

    let removed = match (&decision, apply) {
        (CascadeDecision::Allow(plan), true) => Some(store.apply_removal(plan)),
        _ => None,
    };

    Ok(CascadeReport {
        principal,
        root: root_entity.entity_ref().to_string(),
        decision,
        removed,
    })
}
