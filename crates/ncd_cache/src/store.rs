//! On-disk artifact files, one per fingerprint.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ncd_common::Fingerprint;

/// Subdirectory holding artifact files.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// File extension of stored artifacts.
pub const ARTIFACT_EXT: &str = "ncd";

/// Writes `bytes` to `path` through a temporary file in the same directory
/// and an atomic rename, so readers see the old file or the new one, never
/// a partial write. Creates the parent directory if needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".ncd-tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Artifact files under `<cache>/artifacts/<fingerprint>.ncd`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store for the cache rooted at `cache_dir`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(ARTIFACTS_DIR),
        }
    }

    /// The artifacts directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact file for `fingerprint`.
    pub fn path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{fingerprint}.{ARTIFACT_EXT}"))
    }

    /// Reads the stored bytes, or `None` if there is no file.
    pub fn read(&self, fingerprint: &Fingerprint) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path(fingerprint)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stores `bytes` atomically.
    pub fn write(&self, fingerprint: &Fingerprint, bytes: &[u8]) -> io::Result<()> {
        write_atomic(&self.path(fingerprint), bytes)
    }

    /// Deletes the artifact file. Returns `false` if there was none.
    pub fn remove(&self, fingerprint: &Fingerprint) -> io::Result<bool> {
        match std::fs::remove_file(self.path(fingerprint)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes the artifacts directory. Returns how many artifact files it held.
    pub fn remove_all(&self) -> io::Result<usize> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut count = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXT) {
                count += 1;
            }
        }
        std::fs::remove_dir_all(&self.dir)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(tag: &[u8]) -> Fingerprint {
        Fingerprint::from_chunks([tag])
    }

    #[test]
    fn write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let key = fp(b"a");
        assert_eq!(store.read(&key).unwrap(), None);

        store.write(&key, b"payload").unwrap();
        assert_eq!(store.read(&key).unwrap().as_deref(), Some(&b"payload"[..]));
        assert!(store.path(&key).ends_with(format!("{key}.ncd")));

        assert!(store.remove(&key).unwrap());
        assert!(!store.remove(&key).unwrap());
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.ncd");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn remove_all_counts_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.remove_all().unwrap(), 0);
        store.write(&fp(b"a"), b"1").unwrap();
        store.write(&fp(b"b"), b"2").unwrap();
        assert_eq!(store.remove_all().unwrap(), 2);
        assert!(!store.dir().exists());
    }
}
