use crate::{
    cascade::CascadeAuthorizer,
    config::PermissionsConfig,
    engine::AuthorizationEngine,
    error::Result,
    registry::ActionRegistry,
    roles::{InMemoryRoleCatalog, RoleCatalog},
};
use std::sync::Arc;
use tracing::info;

/// Process-wide permission state, built once at startup and shared by handle.
///
/// The registry is frozen and the default role seeded before the context is
/// handed out; afterwards only administrative grant/revoke mutate it.
pub struct PermissionContext {
    pub registry: Arc<ActionRegistry>,
    pub catalog: Arc<dyn RoleCatalog>,
    pub engine: Arc<AuthorizationEngine>,
    pub cascade: CascadeAuthorizer,
}

impl PermissionContext {
    /// Build the standard registry, load the default policy and seed it
    pub fn bootstrap(config: &PermissionsConfig) -> Result<Arc<Self>> {
        let registry = Arc::new(ActionRegistry::standard()?);
        Self::bootstrap_with_registry(config, registry)
    }

    pub fn bootstrap_with_registry(
        config: &PermissionsConfig,
        registry: Arc<ActionRegistry>,
    ) -> Result<Arc<Self>> {
        let policy = config.resolve_policy()?;
        let catalog: Arc<dyn RoleCatalog> =
            Arc::new(InMemoryRoleCatalog::new(Arc::clone(&registry), policy));
        let role = catalog.seed_default_role()?;

        let engine = Arc::new(
            AuthorizationEngine::new(Arc::clone(&registry), Arc::clone(&catalog))
                .with_debug(config.debug_decisions),
        );
        let cascade = CascadeAuthorizer::new(Arc::clone(&engine));

        info!(
            resource_types = registry.resource_types().count(),
            default_role = %role.name,
            permission_sets = role.permissions.len(),
            "Permission engine bootstrapped"
        );

        Ok(Arc::new(Self {
            registry,
            catalog,
            engine,
            cascade,
        }))
    }
}
