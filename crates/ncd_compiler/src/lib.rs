//! The compiler core: resolved IR in, validated binary artifact out.
//!
//! Compilation runs three steps:
//!
//! 1. [`cycle::check_acyclic`] rejects reference cycles.
//! 2. [`layout::ReferenceGraph`] orders records so every referenced entry
//!    precedes the entries referencing it.
//! 3. [`writer::write_artifact`] sizes everything, then serializes with each
//!    reference written as the byte offset of its target's record.
//!
//! The result is an in-memory [`Artifact`]. Nothing is written to disk here;
//! persisting is the cache's job.
//!
//! [`ArtifactReader`] validates and decodes artifacts.

#![warn(missing_docs)]

pub mod artifact;
pub mod cycle;
pub mod error;
pub mod format;
pub mod layout;
pub mod reader;
pub mod writer;

use ncd_common::Fingerprint;
use ncd_ir::Ir;

pub use artifact::{Artifact, ArtifactMeta};
pub use error::{CompileError, FormatError};
pub use reader::{ArtifactReader, DecodedEntry, DecodedValue, Record};

/// Version of this compiler, part of every fingerprint.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default name index load factor.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.5;

/// Smallest accepted load factor.
pub const MIN_LOAD_FACTOR: f64 = 0.01;

/// Settings that affect the compiled bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompilerSettings {
    load_factor: f64,
}

impl CompilerSettings {
    /// Creates settings with the given name index load factor, in
    /// `[MIN_LOAD_FACTOR, 1]`.
    pub fn new(load_factor: f64) -> Result<Self, CompileError> {
        if !(MIN_LOAD_FACTOR..=1.0).contains(&load_factor) {
            return Err(CompileError::InvalidLoadFactor(load_factor));
        }
        Ok(Self { load_factor })
    }

    /// The name index load factor.
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// The version string hashed into fingerprints. Covers everything that
    /// changes output bytes: compiler version, format version, load factor.
    pub fn version_tag(&self) -> String {
        format!(
            "ncd {COMPILER_VERSION}/format {}/lf {}",
            format::FORMAT_VERSION,
            self.load_factor
        )
    }
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

/// Fingerprint of `ir` as compiled with `settings`.
pub fn fingerprint(ir: &Ir, settings: &CompilerSettings) -> Fingerprint {
    ncd_ir::fingerprint(ir, &settings.version_tag())
}

/// Compiles `ir` into an artifact.
pub fn compile(ir: &Ir, settings: &CompilerSettings) -> Result<Artifact, CompileError> {
    cycle::check_acyclic(ir)?;
    let order = layout::ReferenceGraph::build(ir).layout_order()?;
    let bytes = writer::write_artifact(ir, &order, settings.load_factor)?;
    let fingerprint = fingerprint(ir, settings);
    log::debug!(
        "compiled '{}': {} entries, {} bytes, fingerprint {}",
        ir.name,
        ir.len(),
        bytes.len(),
        fingerprint.short()
    );
    Ok(Artifact::new(fingerprint, ir.name.clone(), bytes))
}
