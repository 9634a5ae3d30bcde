//! Error types for configuration loading and validation.

use ncd_diagnostics::{Category, Diagnose, DiagnosticCode, ErrorClass};

/// Errors that can occur when loading or validating an `ncd.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl Diagnose for ConfigError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Generic
    }

    fn code(&self) -> DiagnosticCode {
        let number = match self {
            ConfigError::IoError(_) => 1,
            ConfigError::ParseError(_) => 2,
            ConfigError::ValidationError(_) => 3,
        };
        DiagnosticCode::new(Category::Config, number)
    }
}
