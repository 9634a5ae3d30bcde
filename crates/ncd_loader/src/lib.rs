//! The definition loader: text → [`Definition`] → resolved [`Ir`].
//!
//! Loading is a pure read. [`load`] and [`load_from_str`] lex and parse the
//! definition syntax, rejecting unknown kinds and duplicate entry names as
//! they go. [`resolve`] then turns names into arena IDs and checks that every
//! reference targets an existing entry of a kind its source may reference.
//!
//! ```text
//! # inventory.ncdef
//! definition inventory
//!
//! record A { val = 1 }
//! record B { ref = @A, label = "second" }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod token;

use std::path::Path;

use ncd_ir::{Definition, KindRegistry};

pub use error::LoadError;
pub use resolve::resolve;

/// Conventional extension of definition files.
pub const DEFINITION_EXT: &str = "ncdef";

/// Reads and parses the definition at `path`.
///
/// Without a `definition <name>` header the file stem becomes the name.
pub fn load(path: &Path, kinds: &KindRegistry) -> Result<Definition, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let text = String::from_utf8(bytes).map_err(|e| invalid_utf8(e.as_bytes(), e.utf8_error()))?;
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("definition");
    let definition = load_from_str(fallback, &text, kinds)?;
    log::debug!(
        "loaded definition '{}' ({} entries) from {}",
        definition.name,
        definition.len(),
        path.display()
    );
    Ok(definition)
}

/// A parse error at the first byte of `bytes` that is not UTF-8.
fn invalid_utf8(bytes: &[u8], err: std::str::Utf8Error) -> LoadError {
    let valid = String::from_utf8_lossy(&bytes[..err.valid_up_to()]);
    let line = valid.matches('\n').count() + 1;
    let column = valid.rsplit('\n').next().map_or(0, |tail| tail.chars().count()) + 1;
    LoadError::Parse {
        line: line as u32,
        column: column as u32,
        reason: format!("invalid UTF-8 at byte {}", err.valid_up_to()),
    }
}

/// Parses definition text. `fallback_name` is used when there is no header.
pub fn load_from_str(
    fallback_name: &str,
    text: &str,
    kinds: &KindRegistry,
) -> Result<Definition, LoadError> {
    let tokens = lexer::lex(text)?;
    parser::parse(&tokens, fallback_name, kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncd_diagnostics::{Diagnose, ErrorClass};

    #[test]
    fn load_uses_file_stem_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.ncdef");
        std::fs::write(&path, "record A { val = 1 }\n").unwrap();
        let def = load(&path, &KindRegistry::builtin()).unwrap();
        assert_eq!(def.name, "inventory");
        assert_eq!(def.len(), 1);
    }

    #[test]
    fn load_prefers_header_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.ncdef");
        std::fs::write(&path, "definition stock\nrecord A { val = 1 }\n").unwrap();
        let def = load(&path, &KindRegistry::builtin()).unwrap();
        assert_eq!(def.name, "stock");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/x.ncdef"), &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn non_utf8_file_is_parse_error_at_first_bad_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.ncdef");
        std::fs::write(&path, b"record A { val = 1 }\nrecord B { s = \"caf\xe9\" }\n").unwrap();
        let err = load(&path, &KindRegistry::builtin()).unwrap_err();
        match &err {
            LoadError::Parse { line, column, reason } => {
                assert_eq!((*line, *column), (2, 20));
                assert!(reason.contains("invalid UTF-8"), "{reason}");
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
        assert_eq!(err.class(), ErrorClass::Parse);
        assert_eq!(err.to_diagnostic().exit_code(), 2);
        assert!(err.to_diagnostic().render_line().contains("(at 2:20)"));
    }
}
