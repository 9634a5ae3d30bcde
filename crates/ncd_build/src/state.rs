//! The build state machine.

use std::fmt;

use ncd_common::InternalError;

/// A stage of a single build.
///
/// ```text
/// Idle -> Loading -> Resolving -> CacheCheck -+-> CacheHit --------------------------> Emit -> Done
///                                             +-> CacheMiss -+-> Compiling -> CacheStore -^
///                                                            +-> CacheHit
/// ```
///
/// `CacheMiss -> CacheHit` is taken when another caller stored the artifact
/// after the first lookup. Every non-terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildState {
    /// Not started.
    Idle,
    /// Reading and parsing the definition.
    Loading,
    /// Resolving references into IR.
    Resolving,
    /// Fingerprinting and looking up the cache.
    CacheCheck,
    /// The artifact was in the cache, or another caller compiled it.
    CacheHit,
    /// The artifact was not in the cache.
    CacheMiss,
    /// This build is running the compiler.
    Compiling,
    /// The compiled artifact has been stored.
    CacheStore,
    /// Writing the output file.
    Emit,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
}

impl BuildState {
    /// Returns `true` for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }

    /// Returns `true` if `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: BuildState) -> bool {
        use BuildState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Loading)
            | (Loading, Resolving)
            | (Resolving, CacheCheck)
            | (CacheCheck, CacheHit)
            | (CacheCheck, CacheMiss)
            | (CacheHit, Emit)
            | (CacheMiss, Compiling)
            | (CacheMiss, CacheHit)
            | (Compiling, CacheStore)
            | (CacheStore, Emit)
            | (Emit, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Idle => "idle",
            BuildState::Loading => "loading",
            BuildState::Resolving => "resolving",
            BuildState::CacheCheck => "cache check",
            BuildState::CacheHit => "cache hit",
            BuildState::CacheMiss => "cache miss",
            BuildState::Compiling => "compiling",
            BuildState::CacheStore => "cache store",
            BuildState::Emit => "emit",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The states a build has passed through, starting at `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTrace {
    states: Vec<BuildState>,
}

impl Default for BuildTrace {
    fn default() -> Self {
        Self {
            states: vec![BuildState::Idle],
        }
    }
}

impl BuildTrace {
    /// Creates a trace in `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    pub fn current(&self) -> BuildState {
        self.states.last().copied().unwrap_or(BuildState::Idle)
    }

    /// Every state visited, in order.
    pub fn states(&self) -> &[BuildState] {
        &self.states
    }

    /// Moves to `next`. An illegal transition is a bug in the orchestrator.
    pub fn advance(&mut self, next: BuildState) -> Result<(), InternalError> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(InternalError::new(format!(
                "illegal build transition {current} -> {next}"
            )));
        }
        self.states.push(next);
        Ok(())
    }

    /// Moves to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.states.push(BuildState::Failed);
        }
    }
}
