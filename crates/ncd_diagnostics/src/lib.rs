//! Error classification, diagnostic codes, and one-line rendering.
//!
//! Every user-facing error in the toolchain implements [`Diagnose`], which
//! assigns it a stable [`ErrorClass`] and [`DiagnosticCode`]. The CLI turns
//! that into a single [`Diagnostic`] line and a process exit code.

#![warn(missing_docs)]

pub mod class;
pub mod code;
pub mod diagnostic;

pub use class::ErrorClass;
pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnose, Diagnostic, Location};
