//! Operations CLI for the HyperIoT permission engine
//!
//! Inspect and exercise the authorization engine from the command line:
//! - Print the frozen action registry with bit positions and masks
//! - Print the default role's permission sets
//! - Evaluate a single decision against a YAML fixture
//! - Evaluate (and optionally apply) a cascade from a fixture root
//!
//! # Example Usage
//!
//! ```bash
//! hyperiot-perms actions
//! hyperiot-perms policy --json
//! hyperiot-perms check --fixture fixtures/sample.yaml --principal 2 \
//!     --resource Packet --action remove --entity Packet:100
//! hyperiot-perms cascade --fixture fixtures/sample.yaml --principal 1 \
//!     --action remove --root Project:1 --apply
//! ```

pub mod commands;
pub mod fixture;

use anyhow::{bail, Context, Result};
use auth_permissions::{EntityId, ResourceType};

/// Parse `Type:id`, e.g. `Packet:100`
pub fn parse_entity_ref(value: &str) -> Result<(ResourceType, EntityId)> {
    let Some((resource_type, id)) = value.split_once(':') else {
        bail!("Expected <Type>:<id>, got '{value}'");
    };
    let id = id
        .parse()
        .with_context(|| format!("Invalid entity id in '{value}'"))?;
    Ok((ResourceType::new(resource_type), id))
}
