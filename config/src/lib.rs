//! Paycloak Configuration
//!
//! Shared configuration crate for the orchestrator and the CLI.
//!
//! Handles loading configuration from:
//! 1. PAYCLOAK_CONFIG env var (explicit path)
//! 2. ./paycloak.toml (current directory)
//! 3. ~/.paycloak/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<PaycloakConfig> = OnceLock::new();

const LOCAL_CONFIG_FILE_NAME: &str = "paycloak.toml";
const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".paycloak";

// ============================================================================
// Default Constants
// ============================================================================

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x5a1a5a1a5a1a5a1a5a1a5a1a5a1a5a1a5a1a5a1a";
pub const DEFAULT_SUCCESS_CLEAR_MS: u64 = 2000;
pub const DEFAULT_ERROR_CLEAR_MS: u64 = 3000;

const SAMPLE_IDENTITY_ADDRESS: &str = "0xa11ce00000000000000000000000000000000001";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaycloakConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Address of the record contract, also the encryption target
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS.into(),
        }
    }
}

fn default_contract_address() -> String {
    DEFAULT_CONTRACT_ADDRESS.into()
}

/// Operation status display timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Delay before a success status returns to idle
    #[serde(default = "default_success_clear_ms")]
    pub success_clear_ms: u64,
    /// Delay before an error status returns to idle
    #[serde(default = "default_error_clear_ms")]
    pub error_clear_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            success_clear_ms: DEFAULT_SUCCESS_CLEAR_MS,
            error_clear_ms: DEFAULT_ERROR_CLEAR_MS,
        }
    }
}

fn default_success_clear_ms() -> u64 {
    DEFAULT_SUCCESS_CLEAR_MS
}

fn default_error_clear_ms() -> u64 {
    DEFAULT_ERROR_CLEAR_MS
}

/// Identity used when no wallet is attached (demo / scripting)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub address: Option<String>,
}

// ============================================================================
// Environment Helpers
// ============================================================================

/// Set field from lookup if present
fn override_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set Option<String> from lookup if present
fn override_option_string(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut Option<String>,
) {
    if let Some(v) = lookup(key) {
        *field = Some(v);
    }
}

/// Set field from lookup if present and parseable
fn override_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    if let Some(v) = lookup(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={:?}", key, v),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl PaycloakConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check PAYCLOAK_CONFIG env var
        if let Ok(path) = env::var("PAYCLOAK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("PAYCLOAK_CONFIG points to missing file: {}", path.display());
        }

        // 2. Check ./paycloak.toml (current directory)
        let local_path = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.paycloak/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Ledger
        override_string(
            &lookup,
            "PAYCLOAK_CONTRACT_ADDRESS",
            &mut self.ledger.contract_address,
        );

        // Status
        override_parse(
            &lookup,
            "PAYCLOAK_SUCCESS_CLEAR_MS",
            &mut self.status.success_clear_ms,
        );
        override_parse(
            &lookup,
            "PAYCLOAK_ERROR_CLEAR_MS",
            &mut self.status.error_clear_ms,
        );

        // Identity
        override_option_string(&lookup, "PAYCLOAK_ADDRESS", &mut self.identity.address);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.identity.address = Some(SAMPLE_IDENTITY_ADDRESS.into());
        sample.to_toml().unwrap_or_default()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static PaycloakConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PaycloakConfig::default();
        assert_eq!(config.ledger.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.status.success_clear_ms, 2000);
        assert_eq!(config.status.error_clear_ms, 3000);
        assert_eq!(config.identity.address, None);
    }

    #[test]
    fn test_generate_sample() {
        let sample = PaycloakConfig::generate_sample();
        assert!(sample.contains("[ledger]"));
        assert!(sample.contains("[status]"));
        assert!(sample.contains("[identity]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = PaycloakConfig::generate_sample();
        let parsed: PaycloakConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.ledger.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(
            parsed.identity.address.as_deref(),
            Some(SAMPLE_IDENTITY_ADDRESS)
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[status]\nerror_clear_ms = 4500").unwrap();

        let config = PaycloakConfig::load_from(file.path()).unwrap();
        assert_eq!(config.status.error_clear_ms, 4500);
        assert_eq!(config.status.success_clear_ms, DEFAULT_SUCCESS_CLEAR_MS);
        assert_eq!(config.ledger.contract_address, DEFAULT_CONTRACT_ADDRESS);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[status\nerror_clear_ms = ").unwrap();

        let err = PaycloakConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PAYCLOAK_CONTRACT_ADDRESS", "0x00000000000000000000000000000000000000c0"),
            ("PAYCLOAK_SUCCESS_CLEAR_MS", "250"),
            ("PAYCLOAK_ERROR_CLEAR_MS", "not-a-number"),
            ("PAYCLOAK_ADDRESS", "0x00000000000000000000000000000000000000a1"),
        ]);

        let mut config = PaycloakConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.ledger.contract_address,
            "0x00000000000000000000000000000000000000c0"
        );
        assert_eq!(config.status.success_clear_ms, 250);
        // unparseable values are ignored
        assert_eq!(config.status.error_clear_ms, DEFAULT_ERROR_CLEAR_MS);
        assert!(config.identity.address.is_some());
    }
}
