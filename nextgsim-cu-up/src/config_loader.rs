//! Configuration loading for the CU-UP
//!
//! Wraps the `CuUpConfig` from `nextgsim-common` with YAML loading and
//! range validation.
//!
//! # Example
//!
//! ```rust,ignore
//! use nextgsim_cu_up::config_loader::load_and_validate_cu_up_config;
//!
//! let config = load_and_validate_cu_up_config("config/cu-up.yaml")?;
//! ```

use std::path::Path;

use nextgsim_common::CuUpConfig;
use thiserror::Error;

/// Largest accepted per-UE PDU session limit (the session ID is 8 bits wide).
pub const MAX_PDU_SESSIONS_LIMIT: usize = 256;

/// Largest accepted UE limit (the UE index is 16 bits wide).
pub const MAX_NOF_UES_LIMIT: usize = 65536;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ConfigValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Invalid UPF port
    #[error("Invalid UPF port: {0}")]
    InvalidUpfPort(String),

    /// Invalid PDU session limit
    #[error("Invalid PDU session limit: {0}")]
    InvalidPduSessionLimit(String),

    /// Invalid UE limit
    #[error("Invalid UE limit: {0}")]
    InvalidUeLimit(String),

    /// Invalid IP address configuration
    #[error("Invalid IP configuration: {0}")]
    InvalidIpConfig(String),
}

/// Loads a CU-UP configuration from a YAML file without validating it.
pub fn load_cu_up_config<P: AsRef<Path>>(path: P) -> Result<CuUpConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_cu_up_config_from_str(&contents)
}

/// Loads a CU-UP configuration from a YAML string without validating it.
pub fn load_cu_up_config_from_str(yaml: &str) -> Result<CuUpConfig, ConfigError> {
    CuUpConfig::from_yaml_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Validates a CU-UP configuration.
///
/// # Validation Rules
///
/// - UPF port must be non-zero
/// - PDU session limit must be between 1 and 256
/// - UE limit must be between 1 and 65536
/// - N3 and F1-U bind addresses must not be unspecified (0.0.0.0 or ::)
pub fn validate_cu_up_config(config: &CuUpConfig) -> Result<(), ConfigValidationError> {
    if config.network.upf_port == 0 {
        return Err(ConfigValidationError::InvalidUpfPort(
            "UPF port 0 cannot be used".to_string(),
        ));
    }

    if config.max_pdu_sessions_per_ue == 0 || config.max_pdu_sessions_per_ue > MAX_PDU_SESSIONS_LIMIT {
        return Err(ConfigValidationError::InvalidPduSessionLimit(format!(
            "max_pdu_sessions_per_ue {} must be between 1 and {}",
            config.max_pdu_sessions_per_ue, MAX_PDU_SESSIONS_LIMIT
        )));
    }

    if config.max_nof_ues == 0 || config.max_nof_ues > MAX_NOF_UES_LIMIT {
        return Err(ConfigValidationError::InvalidUeLimit(format!(
            "max_nof_ues {} must be between 1 and {}",
            config.max_nof_ues, MAX_NOF_UES_LIMIT
        )));
    }

    if config.network.n3_bind_addr.is_unspecified() {
        return Err(ConfigValidationError::InvalidIpConfig(
            "n3_bind_addr cannot be unspecified (0.0.0.0 or ::)".to_string(),
        ));
    }
    if config.network.f1u_bind_addr.is_unspecified() {
        return Err(ConfigValidationError::InvalidIpConfig(
            "f1u_bind_addr cannot be unspecified (0.0.0.0 or ::)".to_string(),
        ));
    }

    Ok(())
}

/// Loads and validates a CU-UP configuration in one step.
pub fn load_and_validate_cu_up_config<P: AsRef<Path>>(path: P) -> Result<CuUpConfig, ConfigError> {
    let config = load_cu_up_config(path)?;
    validate_cu_up_config(&config)?;
    Ok(config)
}
