//! The fingerprint engine: a deterministic identity hash over resolved IR.
//!
//! The IR is written to a canonical byte form and hashed together with the
//! compiler version tag. Attributes are already sorted by name in every
//! [`IrNode`](crate::IrNode), so attribute order in the source never reaches
//! the hash. Entry order does, because it decides node IDs.
//!
//! The definition name is deliberately not hashed: it does not affect the
//! compiled bytes, so two files with the same entries share one artifact.

use crate::ir::Ir;
use crate::value::IrValue;
use ncd_common::Fingerprint;

const TAG_STR: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_BOOL: u8 = 4;
const TAG_REF: u8 = 5;

/// Computes the fingerprint of `ir` as built by compiler `compiler_version`.
pub fn fingerprint(ir: &Ir, compiler_version: &str) -> Fingerprint {
    let canonical = canonical_bytes(ir);
    Fingerprint::from_chunks([canonical.as_slice(), compiler_version.as_bytes()])
}

/// Serializes the semantically relevant parts of `ir` in a fixed layout.
pub fn canonical_bytes(ir: &Ir) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, ir.nodes.len() as u32);
    for node in ir.nodes.values() {
        put_u32(&mut out, node.tag);
        put_str(&mut out, &node.name);
        put_u32(&mut out, node.attributes.len() as u32);
        for attr in &node.attributes {
            put_str(&mut out, &attr.name);
            match &attr.value {
                IrValue::Str(s) => {
                    out.push(TAG_STR);
                    put_str(&mut out, s);
                }
                IrValue::Int(i) => {
                    out.push(TAG_INT);
                    out.extend_from_slice(&i.to_le_bytes());
                }
                IrValue::Float(x) => {
                    out.push(TAG_FLOAT);
                    out.extend_from_slice(&x.to_bits().to_le_bytes());
                }
                IrValue::Bool(b) => {
                    out.push(TAG_BOOL);
                    out.push(u8::from(*b));
                }
                IrValue::Ref(id) => {
                    out.push(TAG_REF);
                    put_u32(&mut out, id.as_raw());
                }
            }
        }
    }
    out
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::ir::{IrAttribute, IrNode};

    fn attr(name: &str, value: IrValue) -> IrAttribute {
        IrAttribute {
            name: name.to_string(),
            value,
        }
    }

    fn sample(attr_order_reversed: bool) -> Ir {
        let mut attrs = vec![
            attr("val", IrValue::Int(1)),
            attr("label", IrValue::Str("x".into())),
        ];
        if attr_order_reversed {
            attrs.reverse();
        }
        let mut ir = Ir::new("sample");
        let a = ir.nodes.alloc(IrNode::new("A", "record", 1, attrs));
        ir.nodes.alloc(IrNode::new(
            "B",
            "record",
            1,
            vec![attr("ref", IrValue::Ref(a))],
        ));
        ir
    }

    #[test]
    fn deterministic() {
        let ir = sample(false);
        assert_eq!(fingerprint(&ir, "v1"), fingerprint(&ir, "v1"));
        assert_eq!(fingerprint(&ir, "v1"), fingerprint(&ir.clone(), "v1"));
    }

    #[test]
    fn attribute_order_is_irrelevant() {
        assert_eq!(fingerprint(&sample(false), "v1"), fingerprint(&sample(true), "v1"));
    }

    #[test]
    fn compiler_version_matters() {
        let ir = sample(false);
        assert_ne!(fingerprint(&ir, "v1"), fingerprint(&ir, "v2"));
    }

    #[test]
    fn definition_name_is_irrelevant() {
        let a = sample(false);
        let mut b = sample(false);
        b.name = "renamed".to_string();
        assert_eq!(fingerprint(&a, "v1"), fingerprint(&b, "v1"));
    }

    #[test]
    fn entry_order_matters() {
        let mut first = Ir::new("x");
        first.nodes.alloc(IrNode::new("A", "record", 1, vec![]));
        first.nodes.alloc(IrNode::new("B", "record", 1, vec![]));
        let mut second = Ir::new("x");
        second.nodes.alloc(IrNode::new("B", "record", 1, vec![]));
        second.nodes.alloc(IrNode::new("A", "record", 1, vec![]));
        assert_ne!(fingerprint(&first, "v1"), fingerprint(&second, "v1"));
    }

    #[test]
    fn value_changes_change_fingerprint() {
        let base = sample(false);
        let mut changed = sample(false);
        changed.nodes = {
            let mut ir = Ir::new("sample");
            let a = ir.nodes.alloc(IrNode::new(
                "A",
                "record",
                1,
                vec![
                    attr("val", IrValue::Int(2)),
                    attr("label", IrValue::Str("x".into())),
                ],
            ));
            ir.nodes.alloc(IrNode::new(
                "B",
                "record",
                1,
                vec![attr("ref", IrValue::Ref(a))],
            ));
            ir.nodes
        };
        assert_ne!(fingerprint(&base, "v1"), fingerprint(&changed, "v1"));
    }

    #[test]
    fn value_types_are_distinguished() {
        let mut int_ir = Ir::new("t");
        int_ir
            .nodes
            .alloc(IrNode::new("A", "record", 1, vec![attr("v", IrValue::Int(1))]));
        let mut ref_ir = Ir::new("t");
        ref_ir.nodes.alloc(IrNode::new(
            "A",
            "record",
            1,
            vec![attr("v", IrValue::Ref(NodeId::from_raw(1)))],
        ));
        assert_ne!(fingerprint(&int_ir, "v1"), fingerprint(&ref_ir, "v1"));
    }
}
