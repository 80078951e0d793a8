//! Transitive-weight rollup over the dominator tree.
//!
//! One DFS over the reachable graph establishes both derived quantities:
//! `max_weight` folds along `refs` edges only (never dominator edges), and
//! each node's finished `weight` is added to its immediate dominator in
//! post-order. Each node is visited once; on cycle re-entry the target
//! contributes whatever value it has at that moment. Both behaviors are
//! deliberate.

use std::collections::{BTreeSet, HashMap};

use crate::core::object::ObjectId;
use crate::core::program::Program;
use crate::error::{Error, Result};

/// Populate `weight` and `max_weight` for everything reachable from the
/// entry point and record the entry's `max_weight` on the program.
///
/// `dominators` is the immediate-dominator mapping for the same entry.
pub fn calculate_weights(
    program: &mut Program,
    dominators: &HashMap<ObjectId, ObjectId>,
) -> Result<()> {
    let entry = program.entry_point().ok_or(Error::MissingEntryPoint)?;

    let mut seen = BTreeSet::new();
    seen.insert(entry);
    start_node(program, entry);

    let mut stack: Vec<(ObjectId, Vec<ObjectId>, usize)> =
        vec![(entry, successors(program, entry), 0)];

    while !stack.is_empty() {
        let step = {
            let (_, succ, cursor) = stack.last_mut().expect("stack is non-empty");
            if *cursor < succ.len() {
                let child = succ[*cursor];
                *cursor += 1;
                Some(child)
            } else {
                None
            }
        };
        match step {
            Some(child) => {
                if seen.insert(child) {
                    start_node(program, child);
                    stack.push((child, successors(program, child), 0));
                } else {
                    // Already visited (or still in flight on a cycle): fold
                    // its current max_weight and move on.
                    let (v, _, _) = *stack.last().expect("stack is non-empty");
                    fold_max(program, v, child);
                }
            }
            None => {
                let (v, _, _) = stack.pop().expect("stack is non-empty");
                // The node's weight is final once its subtree is done (every
                // node it dominates lives in that subtree), so its own
                // max_weight can absorb it now.
                let obj = program.object_mut(v);
                obj.max_weight = obj.max_weight.max(obj.weight);
                if let Some(&dom) = dominators.get(&v) {
                    let weight = program.object(v).weight;
                    program.object_mut(dom).weight += weight;
                }
                if let Some(&(parent, _, _)) = stack.last() {
                    fold_max(program, parent, v);
                }
            }
        }
    }

    let entry_max = program.object(entry).max_weight;
    program.set_max_weight(entry_max);
    Ok(())
}

fn start_node(program: &mut Program, id: ObjectId) {
    let obj = program.object_mut(id);
    obj.weight = obj.size;
    obj.max_weight = obj.weight;
}

fn fold_max(program: &mut Program, into: ObjectId, from: ObjectId) {
    let from_max = program.object(from).max_weight;
    let obj = program.object_mut(into);
    obj.max_weight = obj.max_weight.max(from_max);
}

fn successors(program: &Program, id: ObjectId) -> Vec<ObjectId> {
    program.object(id).refs.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dominators::immediate_dominators;
    use crate::core::object::TraceConfig;
    use crate::demangle::LibraryDemangler;

    fn program_with(
        objects: &[(&str, u64)],
        edges: &[(usize, usize)],
    ) -> (Program, Vec<ObjectId>) {
        let mut p = Program::new(Box::new(LibraryDemangler), TraceConfig::default());
        let ids: Vec<ObjectId> = objects
            .iter()
            .enumerate()
            .map(|(i, (name, size))| {
                p.add_object(name, 0x1000 * (i as u64 + 1), *size, false)
                    .unwrap()
            })
            .collect();
        for &(from, to) in edges {
            p.add_ref(ids[from], ids[to]);
        }
        (p, ids)
    }

    fn run_weights(p: &mut Program, entry: ObjectId) {
        p.set_entry_point(entry);
        let dominators = immediate_dominators(p, entry);
        calculate_weights(p, &dominators).unwrap();
    }

    #[test]
    fn test_linear_chain_weights() {
        // A(100)→B(200)→C(300): weights telescope up the chain.
        let (mut p, ids) =
            program_with(&[("A", 100), ("B", 200), ("C", 300)], &[(0, 1), (1, 2)]);
        run_weights(&mut p, ids[0]);

        assert_eq!(p.object(ids[0]).weight, 600);
        assert_eq!(p.object(ids[1]).weight, 500);
        assert_eq!(p.object(ids[2]).weight, 300);
        assert_eq!(p.object(ids[0]).max_weight, 600);
        assert_eq!(p.object(ids[1]).max_weight, 500);
        assert_eq!(p.object(ids[2]).max_weight, 300);
        assert_eq!(p.max_weight(), 600);
    }

    #[test]
    fn test_diamond_weights_accumulate_at_the_dominator() {
        // A(10)→B(20), A→C(30), B→D(40), C→D: D is dominated by A, so its
        // weight lands on A, not on B or C.
        let (mut p, ids) = program_with(
            &[("A", 10), ("B", 20), ("C", 30), ("D", 40)],
            &[(0, 1), (0, 2), (1, 3), (2, 3)],
        );
        run_weights(&mut p, ids[0]);

        assert_eq!(p.object(ids[0]).weight, 100);
        assert_eq!(p.object(ids[1]).weight, 20);
        assert_eq!(p.object(ids[2]).weight, 30);
        assert_eq!(p.object(ids[3]).weight, 40);
    }

    #[test]
    fn test_root_weight_equals_total_reachable_size() {
        let (mut p, ids) = program_with(
            &[("A", 7), ("B", 11), ("C", 13), ("junk", 1000)],
            &[(0, 1), (0, 2), (1, 2)],
        );
        run_weights(&mut p, ids[0]);

        // The unreachable object contributes nothing to the root's weight
        // and keeps its own size as its weight.
        assert_eq!(p.object(ids[0]).weight, 31);
        assert_eq!(p.object(ids[3]).weight, 1000);
    }

    #[test]
    fn test_max_weight_is_monotone_along_refs() {
        let (mut p, ids) = program_with(
            &[("A", 10), ("B", 200), ("C", 30), ("D", 40)],
            &[(0, 1), (0, 2), (1, 3), (2, 3)],
        );
        run_weights(&mut p, ids[0]);

        for obj in p.objects() {
            for &t in &obj.refs {
                assert!(
                    obj.max_weight >= p.object(t).max_weight,
                    "{} < its target {}",
                    obj.name,
                    p.object(t).name
                );
            }
        }
    }

    #[test]
    fn test_cycle_weights_terminate() {
        let (mut p, ids) =
            program_with(&[("A", 5), ("B", 6), ("C", 7)], &[(0, 1), (1, 2), (2, 1)]);
        run_weights(&mut p, ids[0]);

        assert_eq!(p.object(ids[0]).weight, 18);
    }

    #[test]
    fn test_missing_entry_point_is_an_error() {
        let (mut p, _) = program_with(&[("A", 1)], &[]);
        let err = calculate_weights(&mut p, &HashMap::new());
        assert!(matches!(err, Err(Error::MissingEntryPoint)));
    }
}
