//! Error types for loading and resolving definitions.

use std::path::PathBuf;

use ncd_diagnostics::{Category, Diagnose, DiagnosticCode, ErrorClass, Location};

/// Errors produced while loading or resolving a definition.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The definition file could not be read.
    #[error("cannot read definition {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Malformed syntax.
    #[error("{reason}")]
    Parse {
        /// 1-based line.
        line: u32,
        /// 1-based column.
        column: u32,
        /// What was wrong.
        reason: String,
    },

    /// Two entries share a name.
    #[error("duplicate entry name '{name}' (first defined on line {first_line})")]
    DuplicateName {
        /// The repeated name.
        name: String,
        /// Line of the repeated definition.
        line: u32,
        /// Column of the repeated definition.
        column: u32,
        /// Line of the first definition.
        first_line: u32,
    },

    /// An entry uses a kind missing from the registry.
    #[error("unknown entry kind '{kind}'")]
    UnknownKind {
        /// The unrecognized kind.
        kind: String,
        /// 1-based line.
        line: u32,
        /// 1-based column.
        column: u32,
    },

    /// A reference names no entry.
    #[error("entry '{entry}' attribute '{attribute}' references unknown entry '{target}'")]
    UnresolvedReference {
        /// The referencing entry.
        entry: String,
        /// The referencing attribute.
        attribute: String,
        /// The missing name.
        target: String,
        /// 1-based line of the attribute.
        line: u32,
        /// 1-based column of the attribute.
        column: u32,
    },

    /// A reference targets a kind its source kind may not reference.
    #[error(
        "{kind} '{entry}' attribute '{attribute}' may not reference {target_kind} '{target}'"
    )]
    IncompatibleReference {
        /// The referencing entry.
        entry: String,
        /// Kind of the referencing entry.
        kind: String,
        /// The referencing attribute.
        attribute: String,
        /// The referenced entry.
        target: String,
        /// Kind of the referenced entry.
        target_kind: String,
        /// 1-based line of the attribute.
        line: u32,
        /// 1-based column of the attribute.
        column: u32,
    },
}

impl Diagnose for LoadError {
    fn class(&self) -> ErrorClass {
        match self {
            LoadError::Io { .. } => ErrorClass::Generic,
            LoadError::Parse { .. } => ErrorClass::Parse,
            LoadError::DuplicateName { .. }
            | LoadError::UnknownKind { .. }
            | LoadError::UnresolvedReference { .. }
            | LoadError::IncompatibleReference { .. } => ErrorClass::Resolution,
        }
    }

    fn code(&self) -> DiagnosticCode {
        let number = match self {
            LoadError::Io { .. } => 100,
            LoadError::Parse { .. } => 101,
            LoadError::DuplicateName { .. } => 201,
            LoadError::UnknownKind { .. } => 202,
            LoadError::UnresolvedReference { .. } => 203,
            LoadError::IncompatibleReference { .. } => 204,
        };
        DiagnosticCode::new(Category::Loader, number)
    }

    fn location(&self) -> Option<Location> {
        match self {
            LoadError::Io { .. } => None,
            LoadError::Parse { line, column, .. }
            | LoadError::DuplicateName { line, column, .. }
            | LoadError::UnknownKind { line, column, .. }
            | LoadError::UnresolvedReference { line, column, .. }
            | LoadError::IncompatibleReference { line, column, .. } => {
                Some(Location::new(*line, *column))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_diagnostic() {
        let err = LoadError::Parse {
            line: 3,
            column: 5,
            reason: "expected '}'".to_string(),
        };
        let diag = err.to_diagnostic();
        assert_eq!(diag.render_line(), "error[L101]: parse error: expected '}' (at 3:5)");
        assert_eq!(diag.exit_code(), 2);
    }

    #[test]
    fn duplicate_name_display() {
        let err = LoadError::DuplicateName {
            name: "A".to_string(),
            line: 4,
            column: 1,
            first_line: 1,
        };
        assert_eq!(
            err.to_string(),
            "duplicate entry name 'A' (first defined on line 1)"
        );
        assert_eq!(err.class(), ErrorClass::Resolution);
    }

    #[test]
    fn io_error_has_no_location() {
        let err = LoadError::Io {
            path: PathBuf::from("missing.ncdef"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.location().is_none());
        assert_eq!(err.class(), ErrorClass::Generic);
        assert!(err.to_string().contains("missing.ncdef"));
    }
}
