//! Error types for builds.

use std::path::PathBuf;

use ncd_cache::{CacheError, FetchError};
use ncd_common::InternalError;
use ncd_compiler::CompileError;
use ncd_config::ConfigError;
use ncd_diagnostics::{Category, Diagnose, DiagnosticCode, ErrorClass, Location};
use ncd_loader::LoadError;

use crate::state::BuildState;

/// Errors that end a build. Each maps to a stable [`ErrorClass`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The definition could not be loaded or resolved.
    #[error("{source}")]
    Load {
        /// The definition file.
        path: PathBuf,
        /// The loader error.
        source: LoadError,
    },

    /// The compiler rejected the definition.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The cache could not store the artifact.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The output file could not be written.
    #[error("cannot write output {path}: {source}")]
    Output {
        /// The output path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The build was cancelled.
    #[error("build cancelled during {stage}")]
    Cancelled {
        /// The last state reached.
        stage: BuildState,
    },

    /// A bug in the build pipeline.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl BuildError {
    pub(crate) fn load(path: impl Into<PathBuf>, source: LoadError) -> Self {
        BuildError::Load {
            path: path.into(),
            source,
        }
    }
}

impl From<FetchError> for BuildError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Compile(e) => BuildError::Compile(e),
            FetchError::Cache(e) => BuildError::Cache(e),
        }
    }
}

impl Diagnose for BuildError {
    fn class(&self) -> ErrorClass {
        match self {
            BuildError::Load { source, .. } => source.class(),
            BuildError::Compile(e) => e.class(),
            BuildError::Cache(e) => e.class(),
            BuildError::Config(e) => e.class(),
            BuildError::Output { .. } | BuildError::Cancelled { .. } | BuildError::Internal(_) => {
                ErrorClass::Generic
            }
        }
    }

    fn code(&self) -> DiagnosticCode {
        match self {
            BuildError::Load { source, .. } => source.code(),
            BuildError::Compile(e) => e.code(),
            BuildError::Cache(e) => e.code(),
            BuildError::Config(e) => e.code(),
            BuildError::Output { .. } => DiagnosticCode::new(Category::Build, 101),
            BuildError::Cancelled { .. } => DiagnosticCode::new(Category::Build, 201),
            BuildError::Internal(_) => DiagnosticCode::new(Category::Build, 900),
        }
    }

    fn location(&self) -> Option<Location> {
        match self {
            BuildError::Load { path, source } => source.location().map(|loc| loc.in_file(path)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_gets_file_location() {
        let err = BuildError::load(
            "defs/inventory.ncdef",
            LoadError::UnknownKind {
                kind: "widget".to_string(),
                line: 4,
                column: 1,
            },
        );
        assert_eq!(
            err.to_diagnostic().render_line(),
            "error[L202]: resolution error: unknown entry kind 'widget' (at defs/inventory.ncdef:4:1)"
        );
        assert_eq!(err.to_diagnostic().exit_code(), 2);
    }

    #[test]
    fn fetch_errors_keep_their_class() {
        let compile: BuildError = FetchError::Compile(CompileError::TooLarge {
            size: 1 << 33,
            max: u32::MAX as u64,
        })
        .into();
        assert_eq!(compile.class(), ErrorClass::Compile);

        let cache: BuildError = FetchError::Cache(CacheError::Io {
            path: PathBuf::from("/cache"),
            source: std::sync::Arc::new(std::io::Error::other("disk gone")),
        })
        .into();
        assert_eq!(cache.to_diagnostic().exit_code(), 4);
    }

    #[test]
    fn cancelled_display() {
        let err = BuildError::Cancelled {
            stage: BuildState::Resolving,
        };
        assert_eq!(err.to_string(), "build cancelled during resolving");
        assert_eq!(err.to_diagnostic().exit_code(), 1);
    }
}
