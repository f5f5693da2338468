use crate::{error::Result, policy::DefaultPolicy};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment prefix, e.g. `HYPERIOT_PERMISSIONS__DEBUG_DECISIONS=true`
pub const ENV_PREFIX: &str = "HYPERIOT_PERMISSIONS";

/// Runtime settings of the permission engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Default-policy YAML; the built-in table when absent
    pub policy_path: Option<PathBuf>,

    /// Log a step trace for every decision
    pub debug_decisions: bool,

    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            debug_decisions: false,
            log_filter: "info".to_string(),
        }
    }
}

impl PermissionsConfig {
    /// Layer defaults, the optional config file and the environment.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("debug_decisions", defaults.debug_decisions)?
            .set_default("log_filter", defaults.log_filter)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        info!(
            policy = ?config.policy_path,
            debug_decisions = config.debug_decisions,
            "Permission configuration loaded"
        );
        Ok(config)
    }

    /// The configured default policy, or the built-in one
    pub fn resolve_policy(&self) -> Result<DefaultPolicy> {
        match &self.policy_path {
            Some(path) => DefaultPolicy::from_path(path),
            None => DefaultPolicy::builtin(),
        }
    }
}
