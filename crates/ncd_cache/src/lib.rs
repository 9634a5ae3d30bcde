//! Content-addressed storage for compiled artifacts.
//!
//! An [`ArtifactCache`] maps fingerprints to artifact files under
//! `<dir>/artifacts/` and keeps their metadata in `<dir>/index.json`. It
//! runs at most one compile per fingerprint, even across handles and
//! processes sharing the directory. Files are written through a temporary
//! file and an atomic rename; a damaged file is a miss.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod index;
pub mod lock;
pub mod store;

pub use cache::{ArtifactCache, CacheOptions, Fetched, Origin, DEFAULT_RETRY_BACKOFF};
pub use error::{CacheError, FetchError};
pub use index::{CacheIndex, IndexEntry};
pub use lock::FileLock;
pub use store::{write_atomic, ArtifactStore};
