//! One-line diagnostics built from typed errors.

use crate::class::ErrorClass;
use crate::code::DiagnosticCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Implemented by every user-facing error type in the toolchain.
pub trait Diagnose: fmt::Display {
    /// The stable class of this error.
    fn class(&self) -> ErrorClass;

    /// The diagnostic code of this error.
    fn code(&self) -> DiagnosticCode;

    /// Where in the input the error was detected, if known.
    fn location(&self) -> Option<Location> {
        None
    }

    /// Builds the rendered diagnostic for this error.
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            class: self.class(),
            code: self.code(),
            message: self.to_string(),
            location: self.location(),
        }
    }
}

/// A position in a definition file. Lines and columns are 1-based.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Location {
    /// The file, when known.
    pub path: Option<PathBuf>,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number, 0 when unknown.
    pub column: u32,
}

impl Location {
    /// Creates a location without a file.
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            path: None,
            line,
            column,
        }
    }

    /// Attaches a file path.
    pub fn in_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}:", path.display())?;
        }
        write!(f, "{}", self.line)?;
        if self.column > 0 {
            write!(f, ":{}", self.column)?;
        }
        Ok(())
    }
}

/// A rendered error: class, code, message and optional location.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable error class.
    pub class: ErrorClass,
    /// Diagnostic code.
    pub code: DiagnosticCode,
    /// Human-readable message.
    pub message: String,
    /// Input location, if known.
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Process exit code for this diagnostic.
    pub fn exit_code(&self) -> i32 {
        self.class.exit_code()
    }

    /// Renders the diagnostic as a single line, e.g.
    /// `error[L101]: parse error: expected '}' (at defs.ncdef:3:5)`.
    pub fn render_line(&self) -> String {
        match &self.location {
            Some(loc) => format!(
                "error[{}]: {}: {} (at {loc})",
                self.code, self.class, self.message
            ),
            None => format!("error[{}]: {}: {}", self.code, self.class, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    struct Sample;

    impl fmt::Display for Sample {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "expected '}}'")
        }
    }

    impl Diagnose for Sample {
        fn class(&self) -> ErrorClass {
            ErrorClass::Parse
        }

        fn code(&self) -> DiagnosticCode {
            DiagnosticCode::new(Category::Loader, 101)
        }

        fn location(&self) -> Option<Location> {
            Some(Location::new(3, 5).in_file("defs.ncdef"))
        }
    }

    #[test]
    fn render_with_location() {
        let diag = Sample.to_diagnostic();
        assert_eq!(
            diag.render_line(),
            "error[L101]: parse error: expected '}' (at defs.ncdef:3:5)"
        );
        assert_eq!(diag.exit_code(), 2);
    }

    #[test]
    fn render_without_location() {
        let diag = Diagnostic {
            class: ErrorClass::CacheIo,
            code: DiagnosticCode::new(Category::Cache, 1),
            message: "disk full".to_string(),
            location: None,
        };
        assert_eq!(diag.render_line(), "error[K001]: cache I/O error: disk full");
        assert!(!diag.render_line().contains('\n'));
    }

    #[test]
    fn location_without_column() {
        let loc = Location::new(7, 0);
        assert_eq!(loc.to_string(), "7");
    }
}
