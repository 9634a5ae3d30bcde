//! Configuration types deserialized from `ncd.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".ncd-cache";

/// Default hash-index load factor.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.5;

/// Hash-index load factor used by `--careful` builds (smaller files).
pub const CAREFUL_LOAD_FACTOR: f64 = 0.75;

/// Smallest accepted load factor. Sparser indexes only waste space.
pub const MIN_LOAD_FACTOR: f64 = 0.01;

/// Default pause before retrying a failed cache I/O operation.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

/// The top-level configuration parsed from `ncd.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct NcdConfig {
    /// Artifact cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Compiler settings that affect artifact bytes.
    #[serde(default)]
    pub compiler: CompilerConfig,
    /// Additional entry kinds, keyed by kind name.
    #[serde(default)]
    pub kinds: BTreeMap<String, KindConfig>,
}

/// Where and how artifacts are cached.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Cache directory.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Evict least recently used artifacts beyond this many entries.
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Evict least recently used artifacts beyond this many bytes.
    #[serde(default)]
    pub max_bytes: Option<u64>,
    /// Pause before the single retry of a failed cache I/O operation.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_entries: None,
            max_bytes: None,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

/// Compiler settings.
#[derive(Debug, Default, Deserialize)]
pub struct CompilerConfig {
    /// Target load factor of the name index; `None` picks the profile default.
    #[serde(default)]
    pub load_factor: Option<f64>,
    /// Use the careful profile (denser index, smaller artifacts).
    #[serde(default)]
    pub careful: bool,
}

impl CompilerConfig {
    /// The load factor after applying the profile default.
    pub fn effective_load_factor(&self) -> f64 {
        match self.load_factor {
            Some(lf) => lf,
            None if self.careful => CAREFUL_LOAD_FACTOR,
            None => DEFAULT_LOAD_FACTOR,
        }
    }
}

/// A user-declared entry kind.
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    /// Numeric tag written into artifact records. Must be non-zero and unique.
    pub tag: u32,
    /// Kinds that entries of this kind may reference; `"*"` allows any.
    #[serde(default)]
    pub refs: Vec<String>,
}
