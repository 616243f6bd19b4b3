//! Configuration parsing and validation for workdayd
//!
//! Supports:
//! - Versioned TOML service configuration
//! - Office policy overrides (TOML or JSON), merged with defaults
//! - Per-team break rules
//! - Validation with clear error messages

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<WorkdayConfig> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading config");
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<WorkdayConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        warn!(count = errors.len(), "Config validation failed");
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(WorkdayConfig::from_raw(raw))
}

/// Load an office policy override from a `.json` or `.toml` file and validate it
pub fn load_office_override(path: impl AsRef<Path>) -> ConfigResult<OfficePolicy> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading office policy override");
    let content = std::fs::read_to_string(path)?;
    let raw: RawOfficeConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => toml::from_str(&content)?,
    };
    OfficePolicy::from_override(&raw).map_err(|errors| ConfigError::ValidationFailed { errors })
}
