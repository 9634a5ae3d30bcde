//! Error types for compilation and artifact decoding.

use ncd_common::InternalError;
use ncd_diagnostics::{Category, Diagnose, DiagnosticCode, ErrorClass};

use crate::format::HEADER_LEN;

/// Errors produced while compiling an [`Ir`](ncd_ir::Ir) into an artifact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// Entries reference each other in a loop. `path` starts at the cycle
    /// entry defined first and follows the references.
    #[error("reference cycle: {}", cycle_display(.path))]
    Cycle {
        /// Entry names around the cycle.
        path: Vec<String>,
    },

    /// The artifact would not fit the 32-bit offsets of the format.
    #[error("artifact would be {size} bytes, over the {max} byte format limit")]
    TooLarge {
        /// Computed artifact size.
        size: u64,
        /// Largest representable size.
        max: u64,
    },

    /// The name index load factor is outside `[0.01, 1]`.
    #[error("load factor {0} is outside [0.01, 1]")]
    InvalidLoadFactor(f64),

    /// A layout invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

fn cycle_display(path: &[String]) -> String {
    match path.first() {
        Some(first) => format!("{} -> {first}", path.join(" -> ")),
        None => String::new(),
    }
}

impl Diagnose for CompileError {
    fn class(&self) -> ErrorClass {
        match self {
            CompileError::Cycle { .. } => ErrorClass::Resolution,
            CompileError::TooLarge { .. } | CompileError::Internal(_) => ErrorClass::Compile,
            CompileError::InvalidLoadFactor(_) => ErrorClass::Generic,
        }
    }

    fn code(&self) -> DiagnosticCode {
        let number = match self {
            CompileError::Cycle { .. } => 201,
            CompileError::TooLarge { .. } => 301,
            CompileError::InvalidLoadFactor(_) => 101,
            CompileError::Internal(_) => 900,
        };
        DiagnosticCode::new(Category::Compiler, number)
    }
}

/// Errors produced while validating or decoding artifact bytes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    /// Fewer bytes than a header.
    #[error("artifact is {len} bytes, shorter than the {HEADER_LEN}-byte header")]
    Truncated {
        /// Actual length.
        len: usize,
    },

    /// The file does not start with the artifact magic.
    #[error("not an NCD artifact (magic {0:02x?})")]
    BadMagic([u8; 4]),

    /// The format version is not one this reader understands.
    #[error("unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    /// The header's total length disagrees with the byte count.
    #[error("artifact header declares {declared} bytes but {actual} are present")]
    LengthMismatch {
        /// Length from the header.
        declared: u32,
        /// Actual length.
        actual: usize,
    },

    /// The body checksum does not match the header.
    #[error("artifact checksum mismatch (header {expected:016x}, computed {actual:016x})")]
    ChecksumMismatch {
        /// Checksum stored in the header.
        expected: u64,
        /// Checksum of the bytes present.
        actual: u64,
    },

    /// Structurally invalid contents.
    #[error("malformed artifact at byte {offset}: {reason}")]
    Malformed {
        /// Byte offset of the problem.
        offset: usize,
        /// What was wrong.
        reason: String,
    },
}

impl Diagnose for FormatError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Generic
    }

    fn code(&self) -> DiagnosticCode {
        let number = match self {
            FormatError::Truncated { .. } => 401,
            FormatError::BadMagic(_) => 402,
            FormatError::UnsupportedVersion(_) => 403,
            FormatError::LengthMismatch { .. } => 404,
            FormatError::ChecksumMismatch { .. } => 405,
            FormatError::Malformed { .. } => 406,
        };
        DiagnosticCode::new(Category::Compiler, number)
    }
}
