//! Shared foundational types used across the NCD build toolchain.
//!
//! This crate provides the content hash used for integrity checks, the
//! fingerprint used as the cache identity of a build, and the internal error
//! type that signals a bug rather than bad input.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod hash;
pub mod result;

pub use fingerprint::{Fingerprint, ParseFingerprintError};
pub use hash::ContentHash;
pub use result::InternalError;
