//! The shared artifact cache handle.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ncd_common::Fingerprint;
use ncd_compiler::{Artifact, ArtifactMeta, CompileError};

use crate::error::{CacheError, FetchError};
use crate::index::{CacheIndex, IndexEntry, INDEX_FILE};
use crate::lock::{FileLock, COMPILE_LOCKS_DIR, INDEX_LOCK_FILE};
use crate::store::ArtifactStore;

/// Default pause before retrying a failed storage operation.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Bounds and retry behavior of a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Keep at most this many artifacts.
    pub max_entries: Option<usize>,
    /// Keep at most this many bytes of artifacts.
    pub max_bytes: Option<u64>,
    /// Pause before the single retry of a failed write.
    pub retry_backoff: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_entries: None,
            max_bytes: None,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// How [`ArtifactCache::get_or_compile`] obtained its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Read from the cache.
    Hit,
    /// Another caller was compiling the same fingerprint; its result was shared.
    Joined,
    /// This caller ran the compile.
    Compiled,
}

/// An artifact and how it was obtained.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// The artifact.
    pub artifact: Artifact,
    /// Where it came from.
    pub origin: Origin,
}

type SlotResult = Result<Artifact, FetchError>;

/// Completion signal for one in-flight compile.
#[derive(Default)]
struct Slot {
    result: Mutex<Option<SlotResult>>,
    ready: Condvar,
}

/// A content-addressed artifact cache rooted at a directory.
///
/// The handle is `Sync`; share it between builds with an `Arc`. Reads are
/// fail-safe: a missing, truncated or corrupt artifact is a miss. At most
/// one compile per fingerprint runs at a time: callers on one handle wait
/// for the in-flight compile and receive the same outcome, and other
/// handles or processes on the same directory wait on the fingerprint's
/// lock file and then find the stored artifact.
///
/// `index.json` is only changed under the directory's index lock, after
/// re-reading it, so handles sharing a directory never drop each other's
/// entries. Hits are recorded in memory and written with the next index
/// change, [`flush`](Self::flush) or drop.
pub struct ArtifactCache {
    dir: PathBuf,
    options: CacheOptions,
    store: ArtifactStore,
    index: Mutex<CacheIndex>,
    touched: Mutex<Vec<Fingerprint>>,
    in_flight: Mutex<HashMap<Fingerprint, Arc<Slot>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ArtifactCache {
    /// Opens the cache at `dir`. Nothing is created until the first store.
    pub fn open(dir: impl Into<PathBuf>, options: CacheOptions) -> Self {
        let dir = dir.into();
        let index = CacheIndex::load(&dir);
        log::debug!(
            "opened cache {} ({} entries)",
            dir.display(),
            index.len()
        );
        Self {
            store: ArtifactStore::new(&dir),
            dir,
            options,
            index: Mutex::new(index),
            touched: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The options this cache was opened with.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Number of indexed artifacts, as currently on disk.
    pub fn len(&self) -> usize {
        self.refresh().len()
    }

    /// Returns `true` if no artifacts are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the index entries, least recently used first.
    pub fn entries(&self) -> Vec<(Fingerprint, IndexEntry)> {
        self.refresh()
            .entries
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Looks up a stored artifact.
    ///
    /// A hit marks the entry as recently used. Unreadable or invalid files
    /// are logged, removed and reported as a miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Artifact> {
        let bytes = match self.store.read(fingerprint) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                if lock(&self.index).get(fingerprint).is_some() {
                    self.update_index_quietly(|index| {
                        if index.remove(fingerprint).is_some() {
                            log::warn!(
                                "artifact {} missing from cache; dropping",
                                fingerprint.short()
                            );
                        }
                    });
                }
                return None;
            }
            Err(e) => {
                log::warn!("cannot read cached artifact {}: {e}", fingerprint.short());
                return None;
            }
        };

        let entry = self.indexed(fingerprint);
        let meta = match &entry {
            Some(entry) => entry.to_meta(*fingerprint),
            None => ArtifactMeta {
                fingerprint: *fingerprint,
                size: bytes.len() as u64,
                created_at: chrono::Utc::now(),
                source_name: String::new(),
            },
        };
        match Artifact::from_parts(meta, bytes) {
            Ok(artifact) => {
                if entry.is_some() {
                    lock(&self.touched).push(*fingerprint);
                } else {
                    let adopted = IndexEntry::from(artifact.meta());
                    self.update_index_quietly(|index| {
                        if !index.touch(fingerprint) {
                            index.insert(*fingerprint, adopted);
                        }
                    });
                }
                log::info!("cache hit {}", fingerprint.short());
                Some(artifact)
            }
            Err(e) => {
                log::warn!("discarding corrupt cached artifact {}: {e}", fingerprint.short());
                self.update_index_quietly(|index| {
                    // Another writer may have replaced the file meanwhile.
                    if self.valid_stored(fingerprint).is_some() {
                        return;
                    }
                    index.remove(fingerprint);
                    if let Err(e) = self.store.remove(fingerprint) {
                        log::warn!("cannot remove corrupt artifact {}: {e}", fingerprint.short());
                    }
                });
                None
            }
        }
    }

    /// Stores `artifact` under `fingerprint`.
    ///
    /// Storing byte-identical bytes again succeeds without rewriting. Different
    /// bytes under a fingerprint that already holds a valid artifact fail with
    /// [`CacheError::FingerprintCollision`]. Bounds are enforced afterwards,
    /// oldest entries first.
    pub fn put(&self, fingerprint: &Fingerprint, artifact: &Artifact) -> Result<(), CacheError> {
        self.update_index(|index| {
            if let Some(existing) = self.valid_stored(fingerprint) {
                if existing.as_slice() != artifact.bytes() {
                    log::error!("fingerprint collision on {fingerprint}");
                    return Err(CacheError::FingerprintCollision {
                        fingerprint: *fingerprint,
                    });
                }
                if !index.touch(fingerprint) {
                    index.insert(*fingerprint, IndexEntry::from(artifact.meta()));
                }
                return Ok(());
            }

            let path = self.store.path(fingerprint);
            self.with_retry(&path, || self.store.write(fingerprint, artifact.bytes()))?;
            index.insert(*fingerprint, IndexEntry::from(artifact.meta()));
            self.evict(index);
            log::info!(
                "stored {} ({} bytes) from '{}'",
                fingerprint.short(),
                artifact.size(),
                artifact.source_name()
            );
            Ok(())
        })
    }

    /// Returns the artifact for `fingerprint`, compiling and storing it on a miss.
    ///
    /// Concurrent calls for the same fingerprint run `compile` once: the first
    /// caller compiles and stores, the rest wait for it and receive the same
    /// artifact or the same error. Nothing is stored when `compile` fails.
    pub fn get_or_compile<F>(&self, fingerprint: &Fingerprint, compile: F) -> Result<Fetched, FetchError>
    where
        F: FnOnce() -> Result<Artifact, CompileError>,
    {
        if let Some(artifact) = self.get(fingerprint) {
            return Ok(Fetched {
                artifact,
                origin: Origin::Hit,
            });
        }

        let slot = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(fingerprint) {
                Some(slot) => Some(Arc::clone(slot)),
                None => {
                    in_flight.insert(*fingerprint, Arc::new(Slot::default()));
                    None
                }
            }
        };
        if let Some(slot) = slot {
            log::debug!("waiting for in-flight compile of {}", fingerprint.short());
            return wait_for(&slot).map(|artifact| Fetched {
                artifact,
                origin: Origin::Joined,
            });
        }

        let leader = Leader {
            cache: self,
            fingerprint: *fingerprint,
            finished: false,
        };
        // Other handles and processes compiling this fingerprint hold the same lock.
        let lock_path = self.compile_lock_path(fingerprint);
        let _compile_lock = match self.with_retry(&lock_path, || FileLock::acquire(&lock_path)) {
            Ok(file_lock) => file_lock,
            Err(e) => {
                leader.finish(Err(e.clone().into()));
                return Err(e.into());
            }
        };
        // Stored by another caller between our miss and our claim.
        if let Some(artifact) = self.get(fingerprint) {
            leader.finish(Ok(artifact.clone()));
            return Ok(Fetched {
                artifact,
                origin: Origin::Hit,
            });
        }

        let result = compile()
            .map_err(FetchError::from)
            .and_then(|artifact| {
                self.put(fingerprint, &artifact)?;
                Ok(artifact)
            });
        leader.finish(result.clone());
        result.map(|artifact| Fetched {
            artifact,
            origin: Origin::Compiled,
        })
    }

    /// Removes every artifact and the index. Returns how many artifacts were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let _guard = self.lock_index_file()?;
        let removed = self.with_retry(self.store.dir(), || self.store.remove_all())?;
        let index_path = self.dir.join(INDEX_FILE);
        self.with_retry(&index_path, || match std::fs::remove_file(&index_path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        })?;
        *lock(&self.index) = CacheIndex::default();
        lock(&self.touched).clear();
        log::info!("cleared {removed} artifacts from {}", self.dir.display());
        Ok(removed)
    }

    /// Writes hits recorded since the last index change to `index.json`.
    pub fn flush(&self) -> Result<(), CacheError> {
        if lock(&self.touched).is_empty() {
            return Ok(());
        }
        self.update_index(|_| Ok(()))
    }

    /// Re-reads `index.json` under the index lock, applies pending hits and
    /// `change`, and saves the result. Nothing is saved if `change` fails.
    fn update_index<T>(
        &self,
        change: impl FnOnce(&mut CacheIndex) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let _guard = self.lock_index_file()?;
        let mut index = CacheIndex::load(&self.dir);
        let touched = std::mem::take(&mut *lock(&self.touched));
        for fingerprint in &touched {
            index.touch(fingerprint);
        }
        let value = change(&mut index)?;
        self.save_index(&index)?;
        *lock(&self.index) = index;
        Ok(value)
    }

    fn update_index_quietly(&self, change: impl FnOnce(&mut CacheIndex)) {
        let result = self.update_index(|index| {
            change(index);
            Ok(())
        });
        if let Err(e) = result {
            log::warn!("cannot update cache index: {e}");
        }
    }

    /// The index entry for `fingerprint`, re-reading `index.json` if this
    /// handle has not seen it yet.
    fn indexed(&self, fingerprint: &Fingerprint) -> Option<IndexEntry> {
        if let Some(entry) = lock(&self.index).get(fingerprint) {
            return Some(entry.clone());
        }
        self.refresh().get(fingerprint).cloned()
    }

    fn refresh(&self) -> CacheIndex {
        let index = CacheIndex::load(&self.dir);
        *lock(&self.index) = index.clone();
        index
    }

    /// The stored bytes for `fingerprint` if they form a valid artifact.
    fn valid_stored(&self, fingerprint: &Fingerprint) -> Option<Vec<u8>> {
        self.store
            .read(fingerprint)
            .ok()
            .flatten()
            .filter(|bytes| ncd_compiler::ArtifactReader::new(bytes).is_ok())
    }

    fn lock_index_file(&self) -> Result<FileLock, CacheError> {
        let path = self.dir.join(INDEX_LOCK_FILE);
        self.with_retry(&path, || FileLock::acquire(&path))
    }

    fn compile_lock_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir
            .join(COMPILE_LOCKS_DIR)
            .join(format!("{fingerprint}.lock"))
    }

    /// Drops least recently used entries until the bounds hold. The newest
    /// entry sits at the back and is never evicted.
    fn evict(&self, index: &mut CacheIndex) {
        let over = |index: &CacheIndex| {
            self.options.max_entries.is_some_and(|max| index.len() > max)
                || self.options.max_bytes.is_some_and(|max| index.total_bytes() > max)
        };
        while index.len() > 1 && over(index) {
            let Some((victim, _)) = index.pop_oldest() else {
                break;
            };
            match self.store.remove(&victim) {
                Ok(_) => log::debug!("evicted {}", victim.short()),
                Err(e) => log::warn!("cannot evict {}: {e}", victim.short()),
            }
        }
    }

    fn save_index(&self, index: &CacheIndex) -> Result<(), CacheError> {
        match index.save(&self.dir) {
            Err(CacheError::Io { .. }) => {
                std::thread::sleep(self.options.retry_backoff);
                index.save(&self.dir)
            }
            other => other,
        }
    }

    /// Runs `op`, retrying once after the backoff if it fails.
    fn with_retry<T>(&self, path: &Path, mut op: impl FnMut() -> io::Result<T>) -> Result<T, CacheError> {
        match op() {
            Ok(value) => Ok(value),
            Err(first) => {
                log::warn!("cache I/O at {} failed ({first}); retrying", path.display());
                std::thread::sleep(self.options.retry_backoff);
                op().map_err(|e| CacheError::io(path, e))
            }
        }
    }
}

impl Drop for ArtifactCache {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("cannot record cache hits: {e}");
        }
    }
}

/// The caller running the compile for a fingerprint. Publishes the outcome to
/// waiters exactly once, including when the compile panics.
struct Leader<'a> {
    cache: &'a ArtifactCache,
    fingerprint: Fingerprint,
    finished: bool,
}

impl Leader<'_> {
    fn finish(mut self, result: SlotResult) {
        self.publish(result);
    }

    fn publish(&mut self, result: SlotResult) {
        self.finished = true;
        let slot = lock(&self.cache.in_flight).remove(&self.fingerprint);
        if let Some(slot) = slot {
            *lock(&slot.result) = Some(result);
            slot.ready.notify_all();
        }
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let fingerprint = self.fingerprint;
            self.publish(Err(CacheError::Abandoned { fingerprint }.into()));
        }
    }
}

fn wait_for(slot: &Slot) -> SlotResult {
    let mut guard = lock(&slot.result);
    loop {
        if let Some(result) = guard.as_ref() {
            return result.clone();
        }
        guard = slot.ready.wait(guard).unwrap_or_else(PoisonError::into_inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use ncd_compiler::{compile, fingerprint, CompilerSettings};
    use ncd_ir::{Ir, KindRegistry};

    fn ir(src: &str) -> Ir {
        let kinds = KindRegistry::builtin();
        let def = ncd_loader::load_from_str("defs", src, &kinds).unwrap();
        ncd_loader::resolve(&def, &kinds).unwrap()
    }

    fn artifact(src: &str) -> Artifact {
        compile(&ir(src), &CompilerSettings::default()).unwrap()
    }

    fn fast_options() -> CacheOptions {
        CacheOptions {
            retry_backoff: Duration::from_millis(1),
            ..CacheOptions::default()
        }
    }

    fn open(dir: &Path) -> ArtifactCache {
        ArtifactCache::open(dir, fast_options())
    }

    fn waiters(cache: &ArtifactCache, fp: &Fingerprint) -> usize {
        lock(&cache.in_flight)
            .get(fp)
            .map_or(0, |slot| Arc::strong_count(slot) - 1)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let a = artifact("record A { val = 1 }");
        assert!(cache.get(&a.fingerprint()).is_none());

        cache.put(&a.fingerprint(), &a).unwrap();
        let hit = cache.get(&a.fingerprint()).unwrap();
        assert_eq!(hit.bytes(), a.bytes());
        assert_eq!(hit.source_name(), "defs");
        assert!(dir.path().join("artifacts").join(format!("{}.ncd", a.fingerprint())).exists());
        assert!(dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let a = artifact("record A {}");
        cache.put(&a.fingerprint(), &a).unwrap();
        cache.put(&a.fingerprint(), &a.clone()).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_bytes_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let a = artifact("record A {}");
        let b = artifact("record B {}");
        cache.put(&a.fingerprint(), &a).unwrap();
        let err = cache.put(&a.fingerprint(), &b).unwrap_err();
        assert!(matches!(err, CacheError::FingerprintCollision { .. }));
        assert_eq!(cache.get(&a.fingerprint()).unwrap().bytes(), a.bytes());
    }

    #[test]
    fn corrupt_artifact_is_a_miss_and_can_be_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let a = artifact("record A { val = 1 }");
        cache.put(&a.fingerprint(), &a).unwrap();

        let path = cache.store.path(&a.fingerprint());
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x55;
        std::fs::write(&path, &bytes).unwrap();

        assert!(cache.get(&a.fingerprint()).is_none());
        assert!(!path.exists());
        assert!(cache.is_empty());
        cache.put(&a.fingerprint(), &a).unwrap();
        assert!(cache.get(&a.fingerprint()).is_some());
    }

    #[test]
    fn index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact("record A {}");
        open(dir.path()).put(&a.fingerprint(), &a).unwrap();

        let reopened = open(dir.path());
        assert_eq!(reopened.len(), 1);
        let hit = reopened.get(&a.fingerprint()).unwrap();
        assert_eq!(hit.meta().created_at, a.meta().created_at);
    }

    #[test]
    fn get_or_compile_compiles_once_then_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let source = ir("record A {}\nrecord B { ref = @A }\n");
        let settings = CompilerSettings::default();
        let fp = fingerprint(&source, &settings);
        let calls = AtomicUsize::new(0);
        let run = || {
            calls.fetch_add(1, Ordering::SeqCst);
            compile(&source, &settings)
        };

        let first = cache.get_or_compile(&fp, run).unwrap();
        assert_eq!(first.origin, Origin::Compiled);
        let second = cache.get_or_compile(&fp, run).unwrap();
        assert_eq!(second.origin, Origin::Hit);
        assert_eq!(first.artifact.bytes(), second.artifact.bytes());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_compile_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let cyclic = ir("record A { r = @A }");
        let settings = CompilerSettings::default();
        let fp = fingerprint(&cyclic, &settings);

        let err = cache
            .get_or_compile(&fp, || compile(&cyclic, &settings))
            .unwrap_err();
        assert!(matches!(err, FetchError::Compile(CompileError::Cycle { .. })));
        assert!(cache.is_empty());
        assert!(lock(&cache.in_flight).is_empty());
    }

    #[test]
    fn concurrent_callers_share_one_compile() {
        const N: usize = 8;
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let source = ir("record A { val = 1 }\nrecord B { ref = @A }\n");
        let settings = CompilerSettings::default();
        let fp = fingerprint(&source, &settings);
        let calls = AtomicUsize::new(0);

        let results: Vec<Fetched> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..N)
                .map(|_| {
                    s.spawn(|| {
                        cache
                            .get_or_compile(&fp, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                wait_until(|| waiters(&cache, &fp) == N - 1);
                                compile(&source, &settings)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let compiled = results.iter().filter(|r| r.origin == Origin::Compiled).count();
        let joined = results.iter().filter(|r| r.origin == Origin::Joined).count();
        assert_eq!((compiled, joined), (1, N - 1));
        for r in &results {
            assert_eq!(r.artifact.bytes(), results[0].artifact.bytes());
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_callers_share_one_failure() {
        const N: usize = 4;
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let cyclic = ir("record A { r = @B }\nrecord B { r = @A }\n");
        let settings = CompilerSettings::default();
        let fp = fingerprint(&cyclic, &settings);
        let calls = AtomicUsize::new(0);

        let errors: Vec<FetchError> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..N)
                .map(|_| {
                    s.spawn(|| {
                        cache
                            .get_or_compile(&fp, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                wait_until(|| waiters(&cache, &fp) == N - 1);
                                compile(&cyclic, &settings)
                            })
                            .unwrap_err()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for err in &errors {
            assert_eq!(err.to_string(), "reference cycle: A -> B -> A");
        }
    }

    #[test]
    fn panicking_compile_releases_waiters() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        let source = ir("record A {}");
        let fp = fingerprint(&source, &CompilerSettings::default());

        std::thread::scope(|s| {
            let leader = s.spawn(|| {
                cache.get_or_compile(&fp, || -> Result<Artifact, CompileError> {
                    wait_until(|| waiters(&cache, &fp) == 1);
                    panic!("compiler bug");
                })
            });
            wait_until(|| lock(&cache.in_flight).contains_key(&fp));
            let waiter = s.spawn(|| cache.get_or_compile(&fp, || unreachable!()));
            assert!(leader.join().is_err());
            let err = waiter.join().unwrap().unwrap_err();
            assert!(matches!(err, FetchError::Cache(CacheError::Abandoned { .. })));
        });
        assert!(lock(&cache.in_flight).is_empty());
    }

    #[test]
    fn eviction_by_entry_count() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(
            dir.path(),
            CacheOptions {
                max_entries: Some(2),
                ..fast_options()
            },
        );
        let a = artifact("record A {}");
        let b = artifact("record B {}");
        let c = artifact("record C {}");
        cache.put(&a.fingerprint(), &a).unwrap();
        cache.put(&b.fingerprint(), &b).unwrap();
        // Touch A so B becomes the oldest.
        assert!(cache.get(&a.fingerprint()).is_some());
        cache.put(&c.fingerprint(), &c).unwrap();

        let keys: Vec<_> = cache.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![a.fingerprint(), c.fingerprint()]);
        assert!(!cache.store.path(&b.fingerprint()).exists());
    }

    #[test]
    fn eviction_by_bytes_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(
            dir.path(),
            CacheOptions {
                max_bytes: Some(1),
                ..fast_options()
            },
        );
        let a = artifact("record A {}");
        let b = artifact("record B {}");
        cache.put(&a.fingerprint(), &a).unwrap();
        cache.put(&b.fingerprint(), &b).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&b.fingerprint()).is_some());
    }

    #[test]
    fn handles_sharing_a_directory_keep_one_index() {
        let dir = tempfile::tempdir().unwrap();
        let bounded = || {
            ArtifactCache::open(
                dir.path(),
                CacheOptions {
                    max_entries: Some(1),
                    ..fast_options()
                },
            )
        };
        let first = bounded();
        let second = bounded();
        let a = artifact("record A {}");
        let b = artifact("record B {}");
        first.put(&a.fingerprint(), &a).unwrap();
        second.put(&b.fingerprint(), &b).unwrap();

        let files = std::fs::read_dir(first.store.dir()).unwrap().count();
        assert_eq!(files, 1);
        for cache in [&first, &second] {
            let keys: Vec<_> = cache.entries().into_iter().map(|(k, _)| k).collect();
            assert_eq!(keys, vec![b.fingerprint()]);
        }
        assert!(first.get(&a.fingerprint()).is_none());
        assert!(first.get(&b.fingerprint()).is_some());
    }

    #[test]
    fn handles_sharing_a_directory_compile_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = ir("record A { val = 1 }\nrecord B { ref = @A }\n");
        let settings = CompilerSettings::default();
        let fp = fingerprint(&source, &settings);
        let calls = AtomicUsize::new(0);
        let barrier = std::sync::Barrier::new(2);

        let origins: Vec<Origin> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(|| {
                        let cache = open(dir.path());
                        barrier.wait();
                        cache
                            .get_or_compile(&fp, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(100));
                                compile(&source, &settings)
                            })
                            .unwrap()
                            .origin
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(origins.iter().filter(|&&o| o == Origin::Compiled).count(), 1);
        assert_eq!(open(dir.path()).len(), 1);
    }

    #[test]
    fn hits_are_recorded_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact("record A {}");
        let b = artifact("record B {}");
        {
            let cache = open(dir.path());
            cache.put(&a.fingerprint(), &a).unwrap();
            cache.put(&b.fingerprint(), &b).unwrap();
            assert!(cache.get(&a.fingerprint()).is_some());
            let on_disk: Vec<_> = CacheIndex::load(dir.path()).entries.into_keys().collect();
            assert_eq!(on_disk, vec![a.fingerprint(), b.fingerprint()]);
            cache.flush().unwrap();
        }
        let on_disk: Vec<_> = CacheIndex::load(dir.path()).entries.into_keys().collect();
        assert_eq!(on_disk, vec![b.fingerprint(), a.fingerprint()]);
    }

    #[test]
    fn dropping_a_handle_records_hits() {
        let dir = tempfile::tempdir().unwrap();
        let a = artifact("record A {}");
        let b = artifact("record B {}");
        let cache = open(dir.path());
        cache.put(&a.fingerprint(), &a).unwrap();
        cache.put(&b.fingerprint(), &b).unwrap();
        assert!(cache.get(&a.fingerprint()).is_some());
        drop(cache);

        let keys: Vec<_> = open(dir.path()).entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b.fingerprint(), a.fingerprint()]);
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());
        assert_eq!(cache.clear().unwrap(), 0);
        let a = artifact("record A {}");
        let b = artifact("record B {}");
        cache.put(&a.fingerprint(), &a).unwrap();
        cache.put(&b.fingerprint(), &b).unwrap();

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.is_empty());
        assert!(cache.get(&a.fingerprint()).is_none());
        assert!(!dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn unwritable_cache_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("cache");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let cache = open(&blocker);
        let a = artifact("record A {}");
        let err = cache.put(&a.fingerprint(), &a).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[test]
    fn retry_runs_operation_twice_at_most() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open(dir.path());

        let mut attempts = 0;
        let value = cache
            .with_retry(dir.path(), || {
                attempts += 1;
                if attempts == 1 {
                    Err(io::Error::new(io::ErrorKind::Interrupted, "flaky"))
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!((value, attempts), (7, 2));

        let mut attempts = 0;
        let err = cache
            .with_retry(dir.path(), || -> io::Result<()> {
                attempts += 1;
                Err(io::Error::new(io::ErrorKind::Other, "down"))
            })
            .unwrap_err();
        assert_eq!(attempts, 2);
        assert!(err.to_string().contains("down"));
    }
}
