//! Compiled artifacts: immutable bytes plus metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ncd_common::{ContentHash, Fingerprint};
use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::reader::ArtifactReader;

/// Metadata describing an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Fingerprint of the IR and compiler settings that produced it.
    pub fingerprint: Fingerprint,
    /// Size in bytes.
    pub size: u64,
    /// When it was compiled.
    pub created_at: DateTime<Utc>,
    /// Name of the definition it was compiled from.
    pub source_name: String,
}

/// An immutable compiled artifact. Cloning shares the bytes.
#[derive(Debug, Clone)]
pub struct Artifact {
    meta: ArtifactMeta,
    bytes: Arc<[u8]>,
}

impl Artifact {
    /// Wraps freshly compiled bytes, stamping the current time.
    pub fn new(fingerprint: Fingerprint, source_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            meta: ArtifactMeta {
                fingerprint,
                size: bytes.len() as u64,
                created_at: Utc::now(),
                source_name: source_name.into(),
            },
            bytes: bytes.into(),
        }
    }

    /// Rebuilds an artifact from stored metadata and bytes.
    ///
    /// The bytes must pass [`ArtifactReader::new`]; `meta.size` is corrected
    /// to the actual length.
    pub fn from_parts(mut meta: ArtifactMeta, bytes: Vec<u8>) -> Result<Self, FormatError> {
        ArtifactReader::new(&bytes)?;
        meta.size = bytes.len() as u64;
        Ok(Self {
            meta,
            bytes: bytes.into(),
        })
    }

    /// The metadata.
    pub fn meta(&self) -> &ArtifactMeta {
        &self.meta
    }

    /// The fingerprint this artifact is stored under.
    pub fn fingerprint(&self) -> Fingerprint {
        self.meta.fingerprint
    }

    /// The artifact bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.meta.size
    }

    /// Name of the source definition.
    pub fn source_name(&self) -> &str {
        &self.meta.source_name
    }

    /// Content hash of the bytes.
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::from_bytes(&self.bytes)
    }

    /// A reader over the bytes.
    pub fn reader(&self) -> Result<ArtifactReader<'_>, FormatError> {
        ArtifactReader::new(&self.bytes)
    }
}
