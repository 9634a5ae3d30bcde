//! Attribute values, before and after reference resolution.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An attribute value as written in a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A UTF-8 string.
    Str(String),
    /// A signed 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// A reference to another entry, by name.
    Ref(String),
}

impl Value {
    /// Name of the value's type, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Ref(_) => "reference",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Ref(name) => write!(f, "@{name}"),
        }
    }
}

/// An attribute value after resolution: references point at arena nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IrValue {
    /// A UTF-8 string.
    Str(String),
    /// A signed 64-bit integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// A resolved reference.
    Ref(NodeId),
}

impl IrValue {
    /// Returns the referenced node, if this is a reference.
    pub fn as_ref_target(&self) -> Option<NodeId> {
        match self {
            IrValue::Ref(id) => Some(*id),
            _ => None,
        }
    }
}
