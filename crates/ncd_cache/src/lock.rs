//! Advisory file locks shared by every handle and process using a cache
//! directory.
//!
//! `<dir>/.lock` guards `index.json`: each change re-reads the index, edits
//! it and saves it while the lock is held. `<dir>/locks/<fingerprint>.lock`
//! is held while one fingerprint is compiled and stored.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

/// Lock file guarding the index.
pub const INDEX_LOCK_FILE: &str = ".lock";

/// Directory of per-fingerprint compile locks.
pub const COMPILE_LOCKS_DIR: &str = "locks";

/// An exclusive lock on a file, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Blocks until `path` is locked exclusively. Creates the file and its
    /// parent directory if needed.
    ///
    /// Two `FileLock`s on the same path exclude each other even within one
    /// process.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// The locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("cannot unlock {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn creates_parent_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locks").join("a.lock");
        let lock = FileLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn second_lock_waits_for_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(INDEX_LOCK_FILE);
        let released = AtomicBool::new(false);

        let first = FileLock::acquire(&path).unwrap();
        std::thread::scope(|s| {
            let waiter = s.spawn(|| {
                let _second = FileLock::acquire(&path).unwrap();
                released.load(Ordering::SeqCst)
            });
            std::thread::sleep(Duration::from_millis(50));
            released.store(true, Ordering::SeqCst);
            drop(first);
            assert!(waiter.join().unwrap());
        });
    }
}
