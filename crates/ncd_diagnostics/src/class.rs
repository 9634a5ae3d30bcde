//! Stable error classes and their process exit codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The broad class of a build failure.
///
/// Classes are stable across releases: scripts rely on the exit code that
/// each class maps to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Malformed definition text.
    Parse,
    /// Unknown kinds, duplicate names, unresolved or incompatible
    /// references, and reference cycles.
    Resolution,
    /// Layout invariant violations and oversized artifacts.
    Compile,
    /// Cache storage unavailable or unreadable.
    CacheIo,
    /// Two different artifacts claimed the same fingerprint.
    Collision,
    /// Everything else (configuration, output I/O, cancellation, bugs).
    Generic,
}

impl ErrorClass {
    /// Returns the process exit code for this class.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorClass::Parse | ErrorClass::Resolution => 2,
            ErrorClass::Compile => 3,
            ErrorClass::CacheIo => 4,
            ErrorClass::Collision | ErrorClass::Generic => 1,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Parse => "parse error",
            ErrorClass::Resolution => "resolution error",
            ErrorClass::Compile => "compile error",
            ErrorClass::CacheIo => "cache I/O error",
            ErrorClass::Collision => "fingerprint collision",
            ErrorClass::Generic => "error",
        };
        f.write_str(name)
    }
}
