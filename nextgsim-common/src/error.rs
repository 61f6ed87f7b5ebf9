//! Error types for nextgsim

use thiserror::Error;

/// Error types shared by the CU-UP crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias using the nextgsim Error type.
pub type Result<T> = std::result::Result<T, Error>;
