//! Definitions as loaded from source text, before reference resolution.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A named, ordered collection of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Definition name: the `definition` header, or the file stem.
    pub name: String,
    /// Entries in source order.
    pub entries: Vec<Entry>,
}

/// One declarative entry: `<kind> <name> { attributes }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Kind name, validated against a [`KindRegistry`](crate::KindRegistry).
    pub kind: String,
    /// Entry name, unique within the definition.
    pub name: String,
    /// Attributes in source order.
    pub attributes: Vec<Attribute>,
    /// 1-based line of the entry's kind keyword.
    pub line: u32,
    /// 1-based column of the entry's kind keyword.
    pub column: u32,
}

/// A single `name = value` attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name, unique within its entry.
    pub name: String,
    /// Attribute value.
    pub value: Value,
    /// 1-based line of the attribute name.
    pub line: u32,
    /// 1-based column of the attribute name.
    pub column: u32,
}

impl Definition {
    /// Creates an empty definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the definition has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an entry by name.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

impl Entry {
    /// Finds an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}
