//! Lifecycle settings derived from [`PaycloakConfig`].

use std::time::Duration;

use anyhow::{Context, Result};
use paycloak_config::PaycloakConfig;

use crate::lifecycle::status::{DEFAULT_ERROR_CLEAR, DEFAULT_SUCCESS_CLEAR};
use crate::record::Address;

/// Orchestrator tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// How long a success status stays visible
    pub success_clear: Duration,
    /// How long an error status stays visible
    pub error_clear: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            success_clear: DEFAULT_SUCCESS_CLEAR,
            error_clear: DEFAULT_ERROR_CLEAR,
        }
    }
}

impl LifecycleConfig {
    pub fn from_config(config: &PaycloakConfig) -> Self {
        Self {
            success_clear: Duration::from_millis(config.status.success_clear_ms),
            error_clear: Duration::from_millis(config.status.error_clear_ms),
        }
    }
}

/// Address of the record contract
pub fn contract_address(config: &PaycloakConfig) -> Result<Address> {
    config
        .ledger
        .contract_address
        .parse()
        .with_context(|| {
            format!(
                "Invalid ledger.contract_address: {:?}",
                config.ledger.contract_address
            )
        })
}

/// Configured caller identity, if any
pub fn identity_address(config: &PaycloakConfig) -> Result<Option<Address>> {
    config
        .identity
        .address
        .as_deref()
        .map(|raw| {
            raw.parse()
                .with_context(|| format!("Invalid identity.address: {raw:?}"))
        })
        .transpose()
}
