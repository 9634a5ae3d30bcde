//! Reference cycle detection.
//!
//! An iterative depth-first search with an explicit stack, so adversarially
//! deep reference chains cannot overflow the thread stack.

use ncd_ir::{Ir, NodeId};

use crate::error::CompileError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Finds a reference cycle, if any.
///
/// Roots are tried in definition order and references followed in attribute
/// order, so the result is deterministic. The returned path is rotated to
/// start at the cycle entry defined first.
pub fn find_cycle(ir: &Ir) -> Option<Vec<NodeId>> {
    let mut marks = vec![Mark::Unvisited; ir.len()];
    // (node, index of the next attribute to follow)
    let mut stack: Vec<(NodeId, usize)> = Vec::new();

    for root in ir.nodes.ids() {
        if marks[root.index()] != Mark::Unvisited {
            continue;
        }
        marks[root.index()] = Mark::OnStack;
        stack.push((root, 0));

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let attributes = &ir.nodes[node].attributes;
            if cursor == attributes.len() {
                marks[node.index()] = Mark::Done;
                stack.pop();
                continue;
            }
            frame.1 += 1;

            let Some(target) = attributes[cursor].value.as_ref_target() else {
                continue;
            };
            match marks[target.index()] {
                Mark::Unvisited => {
                    marks[target.index()] = Mark::OnStack;
                    stack.push((target, 0));
                }
                Mark::OnStack => {
                    let start = stack
                        .iter()
                        .position(|&(n, _)| n == target)
                        .unwrap_or(0);
                    let mut path: Vec<NodeId> = stack[start..].iter().map(|&(n, _)| n).collect();
                    let first = path
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, id)| **id)
                        .map_or(0, |(i, _)| i);
                    path.rotate_left(first);
                    return Some(path);
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Fails with [`CompileError::Cycle`] if `ir` contains a reference cycle.
pub fn check_acyclic(ir: &Ir) -> Result<(), CompileError> {
    match find_cycle(ir) {
        None => Ok(()),
        Some(path) => Err(CompileError::Cycle {
            path: path
                .into_iter()
                .map(|id| ir.nodes[id].name.clone())
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ncd_ir::KindRegistry;

    fn ir(src: &str) -> Ir {
        let kinds = KindRegistry::builtin();
        let def = ncd_loader::load_from_str("t", src, &kinds).unwrap();
        ncd_loader::resolve(&def, &kinds).unwrap()
    }

    fn cycle_names(src: &str) -> Option<Vec<String>> {
        match check_acyclic(&ir(src)) {
            Ok(()) => None,
            Err(CompileError::Cycle { path }) => Some(path),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn two_entry_cycle() {
        assert_eq!(
            cycle_names("record A { ref = @B }\nrecord B { ref = @A }\n"),
            Some(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn self_reference() {
        assert_eq!(
            cycle_names("record A { me = @A }"),
            Some(vec!["A".to_string()])
        );
    }

    #[test]
    fn cycle_path_starts_at_first_defined_entry() {
        // Search enters at R, walks into the C -> B -> C loop at C.
        let path = cycle_names(
            "record R { to = @C }\nrecord B { to = @C }\nrecord C { to = @B }\n",
        );
        assert_eq!(path, Some(vec!["B".to_string(), "C".to_string()]));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let src = "record D {}\nrecord B { d = @D }\nrecord C { d = @D }\nrecord A { b = @B, c = @C }\n";
        assert_eq!(cycle_names(src), None);
    }

    #[test]
    fn long_chain_does_not_recurse() {
        let mut src = String::new();
        for i in 0..20_000 {
            src.push_str(&format!("record n{i} {{ next = @n{} }}\n", i + 1));
        }
        src.push_str("record n20000 { next = @n0 }\n");
        let path = cycle_names(&src).unwrap();
        assert_eq!(path.len(), 20_001);
        assert_eq!(path[0], "n0");
        assert_eq!(path[20_000], "n20000");
    }
}
