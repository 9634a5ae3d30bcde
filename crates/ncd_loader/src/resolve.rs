//! Name resolution: [`Definition`] → [`Ir`].

use std::collections::HashMap;

use ncd_ir::{Definition, Ir, IrAttribute, IrNode, IrValue, KindRegistry, NodeId, Value};

use crate::error::LoadError;

/// Resolves every reference in `definition` to a [`NodeId`].
///
/// Node IDs follow definition order. Fails on the first reference, in
/// definition order, that names no entry or targets a kind the source kind
/// may not reference. Entry kinds and name uniqueness are re-checked so a
/// definition built in code gets the same guarantees as a parsed one.
pub fn resolve(definition: &Definition, kinds: &KindRegistry) -> Result<Ir, LoadError> {
    let mut ids: HashMap<&str, (NodeId, usize)> = HashMap::with_capacity(definition.len());
    for (index, entry) in definition.entries.iter().enumerate() {
        if !kinds.contains(&entry.kind) {
            return Err(LoadError::UnknownKind {
                kind: entry.kind.clone(),
                line: entry.line,
                column: entry.column,
            });
        }
        if let Some(&(_, first)) = ids.get(entry.name.as_str()) {
            return Err(LoadError::DuplicateName {
                name: entry.name.clone(),
                line: entry.line,
                column: entry.column,
                first_line: definition.entries[first].line,
            });
        }
        ids.insert(&entry.name, (NodeId::from_raw(index as u32), index));
    }

    let mut ir = Ir::new(definition.name.clone());
    for entry in &definition.entries {
        let mut attributes = Vec::with_capacity(entry.attributes.len());
        for attr in &entry.attributes {
            let value = match &attr.value {
                Value::Str(s) => IrValue::Str(s.clone()),
                Value::Int(i) => IrValue::Int(*i),
                Value::Float(x) => IrValue::Float(*x),
                Value::Bool(b) => IrValue::Bool(*b),
                Value::Ref(target) => {
                    let Some(&(id, index)) = ids.get(target.as_str()) else {
                        return Err(LoadError::UnresolvedReference {
                            entry: entry.name.clone(),
                            attribute: attr.name.clone(),
                            target: target.clone(),
                            line: attr.line,
                            column: attr.column,
                        });
                    };
                    let target_kind = &definition.entries[index].kind;
                    if !kinds.can_reference(&entry.kind, target_kind) {
                        return Err(LoadError::IncompatibleReference {
                            entry: entry.name.clone(),
                            kind: entry.kind.clone(),
                            attribute: attr.name.clone(),
                            target: target.clone(),
                            target_kind: target_kind.clone(),
                            line: attr.line,
                            column: attr.column,
                        });
                    }
                    IrValue::Ref(id)
                }
            };
            attributes.push(IrAttribute {
                name: attr.name.clone(),
                value,
            });
        }
        // Checked above; every kind is registered.
        let tag = kinds.get(&entry.kind).map_or(0, |spec| spec.tag);
        ir.nodes
            .alloc(IrNode::new(entry.name.clone(), entry.kind.clone(), tag, attributes));
    }

    log::trace!("resolved {} nodes of '{}'", ir.len(), ir.name);
    Ok(ir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_from_str;
    use ncd_ir::{Entry, RefPolicy};

    fn resolve_str(src: &str) -> Result<Ir, LoadError> {
        let kinds = KindRegistry::builtin();
        let def = load_from_str("test", src, &kinds)?;
        resolve(&def, &kinds)
    }

    #[test]
    fn references_become_node_ids() {
        let ir = resolve_str("record A { val = 1 }\nrecord B { ref = @A }\n").unwrap();
        let a = ir.find("A").unwrap();
        let b = ir.find("B").unwrap();
        assert_eq!(a, NodeId::from_raw(0));
        assert_eq!(ir.references(b).collect::<Vec<_>>(), vec![a]);
        assert_eq!(ir.nodes[a].tag, 1);
    }

    #[test]
    fn forward_references_resolve() {
        let ir = resolve_str("table T { first = @A }\nrecord A { n = 1 }\n").unwrap();
        let t = ir.find("T").unwrap();
        assert_eq!(ir.references(t).next(), ir.find("A"));
    }

    #[test]
    fn self_reference_resolves() {
        // Cycles are the compiler's concern, not the resolver's.
        let ir = resolve_str("record A { me = @A }").unwrap();
        assert_eq!(ir.references(NodeId::from_raw(0)).count(), 1);
    }

    #[test]
    fn unresolved_reference() {
        let err = resolve_str("record A {\n  next = @Missing\n}\n").unwrap_err();
        match err {
            LoadError::UnresolvedReference {
                entry,
                attribute,
                target,
                line,
                column,
            } => {
                assert_eq!(entry, "A");
                assert_eq!(attribute, "next");
                assert_eq!(target, "Missing");
                assert_eq!((line, column), (2, 3));
            }
            other => panic!("expected UnresolvedReference, got {other:?}"),
        }
    }

    #[test]
    fn incompatible_reference() {
        let err = resolve_str("table T { row = @t2 }\nblob B { x = @T }\ntable t2 {}\n")
            .unwrap_err();
        // T -> t2 is table -> table and fine; blob may reference nothing.
        match err {
            LoadError::IncompatibleReference {
                entry,
                kind,
                target_kind,
                ..
            } => {
                assert_eq!(entry, "B");
                assert_eq!(kind, "blob");
                assert_eq!(target_kind, "table");
            }
            other => panic!("expected IncompatibleReference, got {other:?}"),
        }
    }

    #[test]
    fn alias_may_reference_anything() {
        let ir = resolve_str("blob B {}\nalias X { to = @B }\nalias Y { to = @X }\n").unwrap();
        assert_eq!(ir.len(), 3);
    }

    #[test]
    fn custom_kind_policy() {
        let mut kinds = KindRegistry::builtin();
        kinds
            .register("index", 10, RefPolicy::Only(vec!["table".to_string()]))
            .unwrap();
        let def = load_from_str("t", "table T {}\nindex I { on = @T }\n", &kinds).unwrap();
        let ir = resolve(&def, &kinds).unwrap();
        assert_eq!(ir.nodes[ir.find("I").unwrap()].tag, 10);

        let def = load_from_str("t", "record R {}\nindex I { on = @R }\n", &kinds).unwrap();
        assert!(matches!(
            resolve(&def, &kinds),
            Err(LoadError::IncompatibleReference { .. })
        ));
    }

    #[test]
    fn programmatic_duplicates_rejected() {
        let mut def = Definition::new("d");
        for line in [1, 2] {
            def.entries.push(Entry {
                kind: "record".to_string(),
                name: "A".to_string(),
                attributes: Vec::new(),
                line,
                column: 1,
            });
        }
        let err = resolve(&def, &KindRegistry::builtin()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateName { line: 2, first_line: 1, .. }));
    }
}
