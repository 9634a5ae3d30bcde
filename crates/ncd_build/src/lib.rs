//! The build orchestrator: definition file in, artifact file out.
//!
//! A [`Builder`] drives one build through the [`BuildState`] machine:
//! load, resolve, fingerprint, consult the shared [`ArtifactCache`](ncd_cache::ArtifactCache),
//! compile on a miss, and write the output file atomically. Any number of
//! builds may run concurrently against one cache.

#![warn(missing_docs)]

pub mod builder;
pub mod cancel;
pub mod error;
pub mod options;
pub mod state;

pub use builder::{BuildResult, Builder};
pub use cancel::CancelToken;
pub use error::BuildError;
pub use options::{cache_options, kind_registry, BuildOptions, StateObserver};
pub use state::{BuildState, BuildTrace};
