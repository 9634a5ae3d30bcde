//! Error types for cache operations.

use std::path::PathBuf;
use std::sync::Arc;

use ncd_common::Fingerprint;
use ncd_compiler::CompileError;
use ncd_diagnostics::{Category, Diagnose, DiagnosticCode, ErrorClass};

/// Errors that can occur during cache operations.
///
/// Reads never produce these: a missing or damaged artifact is a cache miss.
/// Errors are `Clone` so one failure can be handed to every caller waiting
/// on the same fingerprint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// Storage failed, after one retry.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: Arc<std::io::Error>,
    },

    /// A different artifact is already stored under this fingerprint.
    #[error("fingerprint collision: {fingerprint} already stores a different artifact")]
    FingerprintCollision {
        /// The contested fingerprint.
        fingerprint: Fingerprint,
    },

    /// The index could not be serialized.
    #[error("failed to serialize cache index: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The caller compiling this fingerprint panicked before finishing.
    #[error("compile of {fingerprint} was abandoned")]
    Abandoned {
        /// The fingerprint being compiled.
        fingerprint: Fingerprint,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

impl Diagnose for CacheError {
    fn class(&self) -> ErrorClass {
        match self {
            CacheError::Io { .. } | CacheError::Serialization { .. } => ErrorClass::CacheIo,
            CacheError::FingerprintCollision { .. } => ErrorClass::Collision,
            CacheError::Abandoned { .. } => ErrorClass::Generic,
        }
    }

    fn code(&self) -> DiagnosticCode {
        let number = match self {
            CacheError::Io { .. } => 101,
            CacheError::Serialization { .. } => 102,
            CacheError::FingerprintCollision { .. } => 201,
            CacheError::Abandoned { .. } => 900,
        };
        DiagnosticCode::new(Category::Cache, number)
    }
}

/// Failure of [`ArtifactCache::get_or_compile`](crate::ArtifactCache::get_or_compile):
/// either the compile or the store step.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The compiler rejected the input.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The cache could not store the result.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl Diagnose for FetchError {
    fn class(&self) -> ErrorClass {
        match self {
            FetchError::Compile(e) => e.class(),
            FetchError::Cache(e) => e.class(),
        }
    }

    fn code(&self) -> DiagnosticCode {
        match self {
            FetchError::Compile(e) => e.code(),
            FetchError::Cache(e) => e.code(),
        }
    }
}
