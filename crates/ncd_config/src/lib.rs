//! Parsing and validation of `ncd.toml` build configuration files.
//!
//! The configuration is optional: every field has a default, and CLI flags
//! override whatever the file says.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{find_config, load_config, load_config_from_str, CONFIG_FILE};
pub use types::*;
