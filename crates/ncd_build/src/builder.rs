//! The build orchestrator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ncd_cache::{write_atomic, ArtifactCache, Origin};
use ncd_common::{Fingerprint, InternalError};

use crate::error::BuildError;
use crate::options::BuildOptions;
use crate::state::{BuildState, BuildTrace};

/// The outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Fingerprint of the resolved definition and compiler settings.
    pub fingerprint: Fingerprint,
    /// `false` only for the build that ran the compile.
    pub from_cache: bool,
    /// Where the artifact was written.
    pub output: PathBuf,
    /// Artifact size in bytes.
    pub size: u64,
    /// Number of entries in the artifact.
    pub entries: usize,
    /// States visited, from `Idle` to `Done`.
    pub trace: Vec<BuildState>,
}

/// Runs builds against a shared [`ArtifactCache`].
///
/// A `Builder` is `Sync`; concurrent builds of the same definition through
/// one builder compile once.
pub struct Builder {
    cache: Arc<ArtifactCache>,
    compiles: AtomicUsize,
}

impl Builder {
    /// Creates a builder over `cache`.
    pub fn new(cache: Arc<ArtifactCache>) -> Self {
        Self {
            cache,
            compiles: AtomicUsize::new(0),
        }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// How many times this builder has invoked the compiler.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    /// Builds `definition` into `output`.
    ///
    /// The output file is replaced atomically and only after the artifact is
    /// complete. On failure the output is left untouched.
    pub fn build(
        &self,
        definition: &Path,
        output: &Path,
        options: &BuildOptions,
    ) -> Result<BuildResult, BuildError> {
        let mut run = Run {
            trace: BuildTrace::new(),
            options,
            label: definition.display().to_string(),
        };
        match self.run(&mut run, definition, output) {
            Ok(result) => Ok(result),
            Err(err) => {
                run.trace.fail();
                run.notify(BuildState::Failed);
                log::debug!("{}: failed after {}: {err}", run.label, run.previous());
                Err(err)
            }
        }
    }

    fn run(&self, run: &mut Run<'_>, definition: &Path, output: &Path) -> Result<BuildResult, BuildError> {
        let options = run.options;

        run.checkpoint()?;
        run.enter(BuildState::Loading)?;
        let loaded = ncd_loader::load(definition, &options.kinds)
            .map_err(|e| BuildError::load(definition, e))?;

        run.checkpoint()?;
        run.enter(BuildState::Resolving)?;
        let ir = ncd_loader::resolve(&loaded, &options.kinds)
            .map_err(|e| BuildError::load(definition, e))?;

        run.checkpoint()?;
        run.enter(BuildState::CacheCheck)?;
        let fingerprint = ncd_compiler::fingerprint(&ir, &options.settings);
        log::debug!("{}: fingerprint {}", run.label, fingerprint.short());

        let (artifact, from_cache) = match self.cache.get(&fingerprint) {
            Some(artifact) => {
                run.enter(BuildState::CacheHit)?;
                (artifact, true)
            }
            None => {
                run.enter(BuildState::CacheMiss)?;
                run.checkpoint()?;
                let fetched = self.cache.get_or_compile(&fingerprint, || {
                    run.enter(BuildState::Compiling)?;
                    self.compiles.fetch_add(1, Ordering::SeqCst);
                    ncd_compiler::compile(&ir, &options.settings)
                })?;
                match fetched.origin {
                    Origin::Compiled => {
                        run.enter(BuildState::CacheStore)?;
                        (fetched.artifact, false)
                    }
                    Origin::Hit | Origin::Joined => {
                        run.enter(BuildState::CacheHit)?;
                        (fetched.artifact, true)
                    }
                }
            }
        };

        // Past this point the cache is up to date; cancelling only skips the output.
        run.checkpoint()?;
        run.enter(BuildState::Emit)?;
        write_atomic(output, artifact.bytes()).map_err(|e| BuildError::Output {
            path: output.to_path_buf(),
            source: e,
        })?;
        run.enter(BuildState::Done)?;

        log::info!(
            "{}: wrote {} ({} bytes, {})",
            run.label,
            output.display(),
            artifact.size(),
            if from_cache { "cached" } else { "compiled" }
        );
        Ok(BuildResult {
            fingerprint,
            from_cache,
            output: output.to_path_buf(),
            size: artifact.size(),
            entries: ir.len(),
            trace: run.trace.states().to_vec(),
        })
    }
}

/// Per-build bookkeeping.
struct Run<'a> {
    trace: BuildTrace,
    options: &'a BuildOptions,
    label: String,
}

impl Run<'_> {
    fn enter(&mut self, next: BuildState) -> Result<(), InternalError> {
        self.trace.advance(next)?;
        log::debug!("{}: {}", self.label, next);
        self.notify(next);
        Ok(())
    }

    fn notify(&self, state: BuildState) {
        if let Some(observer) = &self.options.on_state {
            observer(state);
        }
    }

    fn checkpoint(&self) -> Result<(), BuildError> {
        if self.options.cancel.is_cancelled() {
            return Err(BuildError::Cancelled {
                stage: self.trace.current(),
            });
        }
        Ok(())
    }

    /// The state before `Failed`.
    fn previous(&self) -> BuildState {
        let states = self.trace.states();
        states
            .len()
            .checked_sub(2)
            .map_or(BuildState::Idle, |i| states[i])
    }
}
