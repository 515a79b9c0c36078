//! Deadlock detection over a resource-allocation graph snapshot.
//!
//! The request and allocation edges are treated as one directed graph over
//! the union of process and resource nodes; a deadlock exists iff that graph
//! contains a cycle. The detector enumerates every elementary cycle with a
//! depth-first search that keeps the current path explicit: an edge into a
//! node already on the path closes a cycle, and the path slice from that
//! ancestor to the current node is the circular wait, reported in traversal
//! order.
//!
//! Roots are taken in node insertion order and only from nodes no earlier
//! search has reached, so full restarts are not repeated. A search may still
//! walk into previously reached nodes, which means the same circular wait can
//! surface more than once under different rotations; candidates are
//! deduplicated by rotating them to a canonical start before recording.

use crate::store::{EdgeKind, Node, RagSnapshot};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of a deadlock scan.
///
/// Serializes to `{"has_deadlock": bool, "cycles": [["P1", "R1", ...], ...]}`,
/// the shape transport layers hand to their clients. `has_deadlock` is true
/// iff `cycles` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    pub has_deadlock: bool,
    pub cycles: Vec<Vec<String>>,
}

/// Enumerates every elementary cycle in the snapshot.
///
/// Pure computation over the immutable capture; a graph with no nodes or no
/// edges yields an empty report. Self-referential length-1 cycles are not
/// special-cased and are reported if such an edge exists.
pub fn find_cycles(snapshot: &RagSnapshot) -> DetectionReport {
    let graph = &snapshot.graph;

    let mut reached: HashSet<NodeIndex> = HashSet::new();
    let mut seen_rotations: HashSet<Vec<NodeIndex>> = HashSet::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for root in graph.node_indices() {
        if reached.contains(&root) {
            continue;
        }

        // Explicit DFS frames: (node, successors, next child cursor).
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut on_path: HashSet<NodeIndex> = HashSet::new();

        reached.insert(root);
        stack.push((root, successors(graph, root), 0));
        path.push(root);
        on_path.insert(root);

        while let Some((node, children, cursor)) = stack.last_mut() {
            if *cursor >= children.len() {
                let node = *node;
                stack.pop();
                path.pop();
                on_path.remove(&node);
                continue;
            }

            let child = children[*cursor];
            *cursor += 1;

            if on_path.contains(&child) {
                if let Some(pos) = path.iter().position(|&n| n == child) {
                    record_cycle(graph, &path[pos..], &mut seen_rotations, &mut cycles);
                }
                continue;
            }

            reached.insert(child);
            path.push(child);
            on_path.insert(child);
            stack.push((child, successors(graph, child), 0));
        }
    }

    DetectionReport {
        has_deadlock: !cycles.is_empty(),
        cycles,
    }
}

/// Successors of `node` in edge insertion order.
fn successors(graph: &DiGraph<Node, EdgeKind>, node: NodeIndex) -> Vec<NodeIndex> {
    // petgraph iterates neighbors most-recent-first; reverse for stable,
    // insertion-ordered traversal.
    let mut out: Vec<NodeIndex> = graph.neighbors(node).collect();
    out.reverse();
    out
}

/// Records `slice` as a cycle unless an equivalent rotation was already seen.
///
/// The canonical form rotates the cycle to start at its lowest node index;
/// two discoveries of the same circular wait from different starts map to the
/// same key. The reported id sequence keeps the discovery order, starting at
/// the ancestor the back-edge returned to.
fn record_cycle(
    graph: &DiGraph<Node, EdgeKind>,
    slice: &[NodeIndex],
    seen_rotations: &mut HashSet<Vec<NodeIndex>>,
    cycles: &mut Vec<Vec<String>>,
) {
    let Some(min_pos) = slice
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| n.index())
        .map(|(i, _)| i)
    else {
        return;
    };

    let mut canonical = Vec::with_capacity(slice.len());
    canonical.extend_from_slice(&slice[min_pos..]);
    canonical.extend_from_slice(&slice[..min_pos]);

    if seen_rotations.insert(canonical) {
        cycles.push(slice.iter().map(|&n| graph[n].id.clone()).collect());
    }
}
