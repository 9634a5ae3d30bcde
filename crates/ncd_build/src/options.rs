//! Per-build options and their derivation from `ncd.toml`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ncd_cache::CacheOptions;
use ncd_compiler::CompilerSettings;
use ncd_config::{CacheConfig, ConfigError, NcdConfig};
use ncd_ir::{KindRegistry, RefPolicy};

use crate::cancel::CancelToken;
use crate::state::BuildState;

/// Callback invoked on every state a build enters.
pub type StateObserver = Arc<dyn Fn(BuildState) + Send + Sync>;

/// Everything a build needs besides the cache and the paths.
#[derive(Clone)]
pub struct BuildOptions {
    /// Settings that affect the compiled bytes.
    pub settings: CompilerSettings,
    /// Entry kinds the definition may use.
    pub kinds: KindRegistry,
    /// Cancellation flag.
    pub cancel: CancelToken,
    /// Optional progress callback.
    pub on_state: Option<StateObserver>,
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("settings", &self.settings)
            .field("kinds", &self.kinds.names().collect::<Vec<_>>())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("on_state", &self.on_state.is_some())
            .finish()
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            settings: CompilerSettings::default(),
            kinds: KindRegistry::builtin(),
            cancel: CancelToken::new(),
            on_state: None,
        }
    }
}

impl BuildOptions {
    /// Options with the built-in kinds and default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives options from a loaded configuration.
    pub fn from_config(config: &NcdConfig) -> Result<Self, ConfigError> {
        let settings = CompilerSettings::new(config.compiler.effective_load_factor())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(Self {
            settings,
            kinds: kind_registry(config)?,
            ..Self::default()
        })
    }

    /// Replaces the cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Installs a state observer.
    pub fn with_observer(mut self, observer: impl Fn(BuildState) + Send + Sync + 'static) -> Self {
        self.on_state = Some(Arc::new(observer));
        self
    }
}

/// The built-in kinds plus every `[kinds.*]` table of the configuration.
pub fn kind_registry(config: &NcdConfig) -> Result<KindRegistry, ConfigError> {
    let mut kinds = KindRegistry::builtin();
    for (name, kind) in &config.kinds {
        kinds
            .register(name, kind.tag, RefPolicy::from_list(&kind.refs))
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    }
    Ok(kinds)
}

/// Cache bounds and retry pause from the `[cache]` table.
pub fn cache_options(config: &CacheConfig) -> CacheOptions {
    CacheOptions {
        max_entries: config.max_entries,
        max_bytes: config.max_bytes,
        retry_backoff: Duration::from_millis(config.retry_backoff_ms),
    }
}
