//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `blockchain.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "POLL_RELAY_RPC_URL";
/// Overrides `contract.address`.
pub const CONTRACT_ADDRESS_ENV_VAR: &str = "POLL_RELAY_CONTRACT_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load, override from the environment, and validate a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Build configuration without a file: defaults plus environment overrides.
pub fn load_from_env() -> Result<RelayConfig, ConfigError> {
    parse_config("", |key| std::env::var(key).ok())
}

/// Parse TOML text, apply overrides from `env`, then validate.
pub fn parse_config<F>(content: &str, env: F) -> Result<RelayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: RelayConfig = toml::from_str(content)?;
    apply_overrides(&mut config, env);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_overrides<F>(config: &mut RelayConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env(RPC_URL_ENV_VAR).filter(|v| !v.is_empty()) {
        config.blockchain.rpc_url = url;
    }
    if let Some(address) = env(CONTRACT_ADDRESS_ENV_VAR).filter(|v| !v.is_empty()) {
        config.contract.address = address;
    }
}
