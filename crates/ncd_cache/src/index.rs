//! The cache index: fingerprint → metadata, in least-recently-used order.
//!
//! Stored as `index.json` in the cache directory. Entries are kept in an
//! [`IndexMap`] whose order is the eviction order: an entry moves to the
//! back when it is stored or hit, and eviction takes from the front.

use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use ncd_common::Fingerprint;
use ncd_compiler::format::FORMAT_VERSION;
use ncd_compiler::ArtifactMeta;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::store::write_atomic;

/// Name of the index file within the cache directory.
pub const INDEX_FILE: &str = "index.json";

/// Version of the index layout. Bump on incompatible changes.
pub const INDEX_VERSION: u32 = 1;

/// Metadata for one cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Artifact size in bytes.
    pub size: u64,
    /// When the artifact was compiled.
    pub created_at: DateTime<Utc>,
    /// Name of the definition it was compiled from.
    pub source_name: String,
}

impl IndexEntry {
    /// Rebuilds full artifact metadata for `fingerprint`.
    pub fn to_meta(&self, fingerprint: Fingerprint) -> ArtifactMeta {
        ArtifactMeta {
            fingerprint,
            size: self.size,
            created_at: self.created_at,
            source_name: self.source_name.clone(),
        }
    }
}

impl From<&ArtifactMeta> for IndexEntry {
    fn from(meta: &ArtifactMeta) -> Self {
        Self {
            size: meta.size,
            created_at: meta.created_at,
            source_name: meta.source_name.clone(),
        }
    }
}

/// The persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheIndex {
    /// Index layout version.
    pub version: u32,
    /// Artifact format version of the stored artifacts.
    pub format_version: u32,
    /// Entries, least recently used first.
    pub entries: IndexMap<Fingerprint, IndexEntry>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            format_version: FORMAT_VERSION,
            entries: IndexMap::new(),
        }
    }
}

impl CacheIndex {
    /// Loads the index from `cache_dir`.
    ///
    /// Fail-safe: a missing, unreadable, unparsable or incompatible index
    /// yields an empty one.
    pub fn load(cache_dir: &Path) -> Self {
        let path = cache_dir.join(INDEX_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("ignoring unreadable cache index {}: {e}", path.display());
                }
                return Self::default();
            }
        };
        match serde_json::from_str::<CacheIndex>(&text) {
            Ok(index) if index.is_compatible() => index,
            Ok(index) => {
                log::warn!(
                    "ignoring cache index version {}/format {} at {}",
                    index.version,
                    index.format_version,
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("ignoring corrupt cache index {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Saves the index atomically.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        let path = cache_dir.join(INDEX_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        write_atomic(&path, json.as_bytes()).map_err(|e| CacheError::io(path, e))
    }

    /// Returns `true` if this index was written by a compatible version.
    pub fn is_compatible(&self) -> bool {
        self.version == INDEX_VERSION && self.format_version == FORMAT_VERSION
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of all entries in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Looks up an entry.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&IndexEntry> {
        self.entries.get(fingerprint)
    }

    /// Inserts or replaces an entry as the most recently used.
    pub fn insert(&mut self, fingerprint: Fingerprint, entry: IndexEntry) {
        self.entries.shift_remove(&fingerprint);
        self.entries.insert(fingerprint, entry);
    }

    /// Marks an entry as most recently used. Returns `false` if absent.
    pub fn touch(&mut self, fingerprint: &Fingerprint) -> bool {
        match self.entries.shift_remove(fingerprint) {
            Some(entry) => {
                self.entries.insert(*fingerprint, entry);
                true
            }
            None => false,
        }
    }

    /// Removes an entry.
    pub fn remove(&mut self, fingerprint: &Fingerprint) -> Option<IndexEntry> {
        self.entries.shift_remove(fingerprint)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_oldest(&mut self) -> Option<(Fingerprint, IndexEntry)> {
        self.entries.shift_remove_index(0)
    }
}
