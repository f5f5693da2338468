//! Subtree authorization for tree-mutating operations.
//!
//! The authorization pass runs to completion before any mutation: an allowed
//! cascade yields a [`CascadePlan`] that the mutation pass consumes, and a
//! denied cascade reports the first node that failed.

use crate::{
    engine::AuthorizationEngine,
    error::Result,
    models::{ActionName, Decision, DenyReason, EntityRef, Principal},
    ownership::Entity,
    store::EntityStore,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Every node an allowed cascade may touch, in visit order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadePlan {
    pub action: ActionName,
    pub nodes: Vec<EntityRef>,
}

impl CascadePlan {
    pub fn root(&self) -> Option<&EntityRef> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// First node of a cascade that failed authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeDenial {
    pub node: EntityRef,
    pub reason: DenyReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeDecision {
    Allow(CascadePlan),
    Deny(CascadeDenial),
}

impl CascadeDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CascadeDecision::Allow(_))
    }

    pub fn plan(&self) -> Option<&CascadePlan> {
        match self {
            CascadeDecision::Allow(plan) => Some(plan),
            CascadeDecision::Deny(_) => None,
        }
    }

    pub fn denial(&self) -> Option<&CascadeDenial> {
        match self {
            CascadeDecision::Allow(_) => None,
            CascadeDecision::Deny(denial) => Some(denial),
        }
    }
}

/// Authorizes one action across a root entity and all of its descendants
#[derive(Clone)]
pub struct CascadeAuthorizer {
    engine: Arc<AuthorizationEngine>,
}

impl CascadeAuthorizer {
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    /// Authorize `action` on `root`, then on each descendant in the order
    /// given. Descendants are only pulled from `children` while every node so
    /// far is allowed; the first denial ends the pass.
    ///
    /// Each node is checked against its own resource type with the same
    /// action name, so a cascade remove needs `remove` at every level.
    pub fn authorize_cascade<I>(
        &self,
        principal: &Principal,
        action: &ActionName,
        root: &Entity,
        children: I,
    ) -> Result<CascadeDecision>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut nodes = Vec::new();
        if let Some(denial) = self.visit(principal, action, root, &mut nodes)? {
            return Ok(Self::denied(principal, action, denial));
        }

        for child in children {
            if let Some(denial) = self.visit(principal, action, &child, &mut nodes)? {
                return Ok(Self::denied(principal, action, denial));
            }
        }

        Ok(Self::allowed(principal, action, nodes))
    }

    /// Breadth-first cascade over the persistence collaborator.
    ///
    /// Children of a node are loaded only after that node is allowed, so a
    /// denied root never touches the store beyond what the caller loaded.
    pub async fn authorize_subtree(
        &self,
        store: &dyn EntityStore,
        principal: &Principal,
        action: &ActionName,
        root: &Entity,
    ) -> Result<CascadeDecision> {
        let mut nodes = Vec::new();
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(node) = queue.pop_front() {
            if let Some(denial) = self.visit(principal, action, &node, &mut nodes)? {
                return Ok(Self::denied(principal, action, denial));
            }
            queue.extend(store.load_children(&node).await?);
        }

        Ok(Self::allowed(principal, action, nodes))
    }

    fn visit(
        &self,
        principal: &Principal,
        action: &ActionName,
        node: &Entity,
        nodes: &mut Vec<EntityRef>,
    ) -> Result<Option<CascadeDenial>> {
        let decision = self
            .engine
            .authorize(principal, &node.resource_type(), action, Some(node))?;
        debug!(node = %node.entity_ref(), %decision, "Cascade node checked");

        match decision {
            Decision::Allow => {
                nodes.push(node.entity_ref());
                Ok(None)
            }
            Decision::Deny(reason) => Ok(Some(CascadeDenial {
                node: node.entity_ref(),
                reason,
            })),
        }
    }

    fn allowed(principal: &Principal, action: &ActionName, nodes: Vec<EntityRef>) -> CascadeDecision {
        info!(principal = %principal.id, %action, nodes = nodes.len(), "Cascade authorized");
        CascadeDecision::Allow(CascadePlan {
            action: action.clone(),
            nodes,
        })
    }

    fn denied(principal: &Principal, action: &ActionName, denial: CascadeDenial) -> CascadeDecision {
        warn!(
            principal = %principal.id,
            %action,
            node = %denial.node,
            reason = %denial.reason,
            "Cascade denied"
        );
        CascadeDecision::Deny(denial)
    }
}
