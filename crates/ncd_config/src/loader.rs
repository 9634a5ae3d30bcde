//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{NcdConfig, MIN_LOAD_FACTOR};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "ncd.toml";

/// Loads and validates an `ncd.toml` configuration file.
pub fn load_config(path: &Path) -> Result<NcdConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates an `ncd.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<NcdConfig, ConfigError> {
    let config: NcdConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Walks up from `start` looking for the nearest `ncd.toml`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn validate_config(config: &NcdConfig) -> Result<(), ConfigError> {
    if config.cache.dir.is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.dir must not be empty".to_string(),
        ));
    }
    if config.cache.max_entries == Some(0) {
        return Err(ConfigError::ValidationError(
            "cache.max_entries must be at least 1".to_string(),
        ));
    }
    let lf = config.compiler.effective_load_factor();
    if !(MIN_LOAD_FACTOR..=1.0).contains(&lf) {
        return Err(ConfigError::ValidationError(format!(
            "compiler.load_factor must be in [{MIN_LOAD_FACTOR}, 1], got {lf}"
        )));
    }

    let mut tags: BTreeMap<u32, &str> = BTreeMap::new();
    for (name, kind) in &config.kinds {
        if kind.tag == 0 {
            return Err(ConfigError::ValidationError(format!(
                "kind '{name}' has tag 0, which is reserved"
            )));
        }
        if let Some(other) = tags.insert(kind.tag, name) {
            return Err(ConfigError::ValidationError(format!(
                "kinds '{other}' and '{name}' share tag {}",
                kind.tag
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CAREFUL_LOAD_FACTOR, DEFAULT_CACHE_DIR, DEFAULT_LOAD_FACTOR};

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.cache.dir, DEFAULT_CACHE_DIR);
        assert!(config.cache.max_entries.is_none());
        assert_eq!(config.cache.retry_backoff_ms, 50);
        assert_eq!(config.compiler.effective_load_factor(), DEFAULT_LOAD_FACTOR);
        assert!(config.kinds.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[cache]
dir = "/var/cache/ncd"
max_entries = 64
max_bytes = 1048576
retry_backoff_ms = 10

[compiler]
load_factor = 0.6

[kinds.sequence]
tag = 16
refs = ["record", "sequence"]

[kinds.any_ref]
tag = 17
refs = ["*"]
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.dir, "/var/cache/ncd");
        assert_eq!(config.cache.max_entries, Some(64));
        assert_eq!(config.cache.max_bytes, Some(1_048_576));
        assert_eq!(config.cache.retry_backoff_ms, 10);
        assert_eq!(config.compiler.effective_load_factor(), 0.6);
        assert_eq!(config.kinds["sequence"].tag, 16);
        assert_eq!(config.kinds["sequence"].refs, vec!["record", "sequence"]);
    }

    #[test]
    fn careful_profile_changes_default_load_factor() {
        let config = load_config_from_str("[compiler]\ncareful = true\n").unwrap();
        assert_eq!(config.compiler.effective_load_factor(), CAREFUL_LOAD_FACTOR);
    }

    #[test]
    fn explicit_load_factor_beats_profile() {
        let config =
            load_config_from_str("[compiler]\ncareful = true\nload_factor = 0.9\n").unwrap();
        assert_eq!(config.compiler.effective_load_factor(), 0.9);
    }

    #[test]
    fn invalid_load_factor_rejected() {
        let err = load_config_from_str("[compiler]\nload_factor = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        let err = load_config_from_str("[compiler]\nload_factor = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        let err = load_config_from_str("[compiler]\nload_factor = 1e-300\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_max_entries_rejected() {
        let err = load_config_from_str("[cache]\nmax_entries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn duplicate_kind_tags_rejected() {
        let toml = r#"
[kinds.a]
tag = 20
[kinds.b]
tag = 20
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(err.to_string().contains("share tag 20"));
    }

    #[test]
    fn zero_kind_tag_rejected() {
        let err = load_config_from_str("[kinds.a]\ntag = 0\n").unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn find_config_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        let nested = dir.path().join("defs").join("more");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_config(&nested), Some(dir.path().join(CONFIG_FILE)));
    }

    #[test]
    fn io_error_from_missing_file() {
        let err = load_config(Path::new("/nonexistent/ncd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
