//! The resolved intermediate representation.

use crate::arena::Arena;
use crate::ids::NodeId;
use crate::value::IrValue;
use serde::{Deserialize, Serialize};

/// A resolved definition: nodes in an arena, references as [`NodeId`]s.
///
/// Node IDs follow definition order. An `Ir` is built for one build and
/// handed to the compiler; it is never shared between builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ir {
    /// Name of the source definition.
    pub name: String,
    /// All nodes, in definition order.
    pub nodes: Arena<NodeId, IrNode>,
}

/// A resolved entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrNode {
    /// Entry name.
    pub name: String,
    /// Kind name.
    pub kind: String,
    /// Kind tag, as written into the artifact.
    pub tag: u32,
    /// Attributes sorted by name.
    pub attributes: Vec<IrAttribute>,
}

/// A resolved attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrAttribute {
    /// Attribute name.
    pub name: String,
    /// Resolved value.
    pub value: IrValue,
}

impl Ir {
    /// Creates an empty IR.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Arena::new(),
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds a node by entry name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.ids().find(|&id| self.nodes[id].name == name)
    }

    /// Nodes referenced by `id`, in attribute order.
    pub fn references(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id]
            .attributes
            .iter()
            .filter_map(|a| a.value.as_ref_target())
    }
}

impl IrNode {
    /// Creates a node, sorting the attributes by name.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        tag: u32,
        mut attributes: Vec<IrAttribute>,
    ) -> Self {
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            name: name.into(),
            kind: kind.into(),
            tag,
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, value: IrValue) -> IrAttribute {
        IrAttribute {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn node_sorts_attributes() {
        let node = IrNode::new(
            "A",
            "record",
            1,
            vec![attr("z", IrValue::Int(1)), attr("a", IrValue::Bool(true))],
        );
        let names: Vec<_> = node.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "z"]);
    }

    #[test]
    fn find_and_references() {
        let mut ir = Ir::new("demo");
        let a = ir.nodes.alloc(IrNode::new("A", "record", 1, vec![]));
        let b = ir.nodes.alloc(IrNode::new(
            "B",
            "record",
            1,
            vec![attr("ref", IrValue::Ref(a)), attr("val", IrValue::Int(2))],
        ));
        assert_eq!(ir.find("B"), Some(b));
        assert_eq!(ir.find("C"), None);
        assert_eq!(ir.references(b).collect::<Vec<_>>(), vec![a]);
        assert_eq!(ir.references(a).count(), 0);
        assert_eq!(ir.len(), 2);
    }
}
