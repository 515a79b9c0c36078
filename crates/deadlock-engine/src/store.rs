use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Kind of a vertex in the resource-allocation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Process,
    Resource,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Process => write!(f, "process"),
            NodeKind::Resource => write!(f, "resource"),
        }
    }
}

/// Kind of a directed edge in the resource-allocation graph.
///
/// - `Request`: Process -> Resource, the process is waiting for the resource.
/// - `Allocation`: Resource -> Process, the resource is held by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Request,
    #[serde(rename = "allocate")]
    Allocation,
}

/// A registered process or resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

/// Lookup key for a node. Process and resource id spaces are independent, so
/// the kind is part of the identity: a process "X" and a resource "X" do not
/// collide. Identity is exact string match, no case folding or trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    kind: NodeKind,
    id: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} '{id}' is already registered")]
    DuplicateNode { kind: NodeKind, id: String },
    #[error("{kind} '{id}' is not registered")]
    UnknownNode { kind: NodeKind, id: String },
}

/// The canonical in-memory resource-allocation graph.
///
/// Nodes are registered explicitly; edge operations never create nodes and
/// are rejected with [`StoreError::UnknownNode`] when an endpoint is missing.
/// Edge creation is idempotent: at most one edge exists per ordered node
/// pair. Node indices follow insertion order, which gives the detector a
/// deterministic traversal order.
#[derive(Debug, Default)]
pub struct RagStore {
    graph: DiGraph<Node, EdgeKind>,
    node_map: HashMap<NodeKey, NodeIndex>,
}

impl RagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a process. Duplicate registration is a returned error and
    /// leaves the store unchanged.
    pub fn add_process(&mut self, id: &str) -> Result<(), StoreError> {
        self.add_node(NodeKind::Process, id)
    }

    /// Registers a resource. Same duplicate policy as [`RagStore::add_process`].
    pub fn add_resource(&mut self, id: &str) -> Result<(), StoreError> {
        self.add_node(NodeKind::Resource, id)
    }

    fn add_node(&mut self, kind: NodeKind, id: &str) -> Result<(), StoreError> {
        let key = NodeKey {
            kind,
            id: id.to_string(),
        };
        if self.node_map.contains_key(&key) {
            return Err(StoreError::DuplicateNode {
                kind,
                id: id.to_string(),
            });
        }
        let idx = self.graph.add_node(Node {
            id: id.to_string(),
            kind,
        });
        self.node_map.insert(key, idx);
        Ok(())
    }

    /// Records that `process_id` is waiting for `resource_id`.
    pub fn add_request_edge(
        &mut self,
        process_id: &str,
        resource_id: &str,
    ) -> Result<(), StoreError> {
        let from = self.lookup(NodeKind::Process, process_id)?;
        let to = self.lookup(NodeKind::Resource, resource_id)?;
        self.graph.update_edge(from, to, EdgeKind::Request);
        Ok(())
    }

    /// Records that `resource_id` is currently held by `process_id`.
    pub fn add_allocation_edge(
        &mut self,
        resource_id: &str,
        process_id: &str,
    ) -> Result<(), StoreError> {
        let from = self.lookup(NodeKind::Resource, resource_id)?;
        let to = self.lookup(NodeKind::Process, process_id)?;
        self.graph.update_edge(from, to, EdgeKind::Allocation);
        Ok(())
    }

    fn lookup(&self, kind: NodeKind, id: &str) -> Result<NodeIndex, StoreError> {
        self.node_map
            .get(&NodeKey {
                kind,
                id: id.to_string(),
            })
            .copied()
            .ok_or_else(|| StoreError::UnknownNode {
                kind,
                id: id.to_string(),
            })
    }

    /// Clears all nodes and edges. Never fails.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.node_map.clear();
    }

    pub fn contains(&self, kind: NodeKind, id: &str) -> bool {
        self.node_map.contains_key(&NodeKey {
            kind,
            id: id.to_string(),
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Immutable capture of the current graph. Detection and export traverse
    /// the copy, so a run is never corrupted by a concurrent mutation.
    pub fn snapshot(&self) -> RagSnapshot {
        RagSnapshot {
            graph: self.graph.clone(),
        }
    }
}

/// A consistent, point-in-time copy of the graph taken under the store lock.
#[derive(Debug, Clone)]
pub struct RagSnapshot {
    pub(crate) graph: DiGraph<Node, EdgeKind>,
}

impl RagSnapshot {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_weights()
    }

    /// Edges as (source, target, kind) triples.
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node, EdgeKind)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()], *e.weight()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrations_yield_exactly_those_nodes() {
        let mut store = RagStore::new();
        store.add_process("P1").unwrap();
        store.add_process("P2").unwrap();
        store.add_resource("R1").unwrap();

        assert_eq!(store.node_count(), 3);
        assert!(store.contains(NodeKind::Process, "P1"));
        assert!(store.contains(NodeKind::Process, "P2"));
        assert!(store.contains(NodeKind::Resource, "R1"));
        assert!(!store.contains(NodeKind::Resource, "P1"));
    }

    #[test]
    fn duplicate_registration_is_an_error_and_mutates_nothing() {
        let mut store = RagStore::new();
        store.add_process("P1").unwrap();
        let err = store.add_process("P1").unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateNode {
                kind: NodeKind::Process,
                id: "P1".into()
            }
        );
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn process_and_resource_id_spaces_are_independent() {
        let mut store = RagStore::new();
        store.add_process("X").unwrap();
        store.add_resource("X").unwrap();
        assert_eq!(store.node_count(), 2);

        // Identity is exact string match.
        assert!(!store.contains(NodeKind::Process, "x"));
        assert!(!store.contains(NodeKind::Process, " X"));
    }

    #[test]
    fn edge_to_unregistered_node_is_rejected() {
        let mut store = RagStore::new();
        store.add_process("P1").unwrap();

        let err = store.add_request_edge("P1", "R1").unwrap_err();
        assert_eq!(
            err,
            StoreError::UnknownNode {
                kind: NodeKind::Resource,
                id: "R1".into()
            }
        );
        assert_eq!(store.edge_count(), 0);

        let err = store.add_allocation_edge("R1", "P1").unwrap_err();
        assert!(matches!(err, StoreError::UnknownNode { .. }));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn edge_creation_is_idempotent() {
        let mut store = RagStore::new();
        store.add_process("P1").unwrap();
        store.add_resource("R1").unwrap();

        store.add_request_edge("P1", "R1").unwrap();
        store.add_request_edge("P1", "R1").unwrap();
        assert_eq!(store.edge_count(), 1);

        // Opposite direction is a distinct edge.
        store.add_allocation_edge("R1", "P1").unwrap();
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = RagStore::new();
        store.add_process("P1").unwrap();
        store.add_resource("R1").unwrap();
        store.add_request_edge("P1", "R1").unwrap();

        store.reset();
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.edge_count(), 0);

        // Ids are free for re-registration after a reset.
        store.add_process("P1").unwrap();
    }

    #[test]
    fn snapshot_is_detached_from_later_mutations() {
        let mut store = RagStore::new();
        store.add_process("P1").unwrap();
        let snap = store.snapshot();

        store.add_resource("R1").unwrap();
        store.add_request_edge("P1", "R1").unwrap();

        assert_eq!(snap.node_count(), 1);
        assert_eq!(snap.edge_count(), 0);
    }
}
