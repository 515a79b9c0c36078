//! Rendering and projection of graph snapshots.
//!
//! Everything here is presentation-only: renderers and views never mutate the
//! store and have no influence on detection results.

use crate::store::{EdgeKind, NodeKind, RagSnapshot};
use anyhow::Result;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use uuid::Uuid;

/// A rendered graph, ready for the transport layer to serve.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Opaque reference handed back to callers.
    pub key: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Pure projection from a snapshot to a renderable artifact. Swapping the
/// rendering technology never touches detection.
pub trait GraphRenderer: Send + Sync {
    fn render(&self, snapshot: &RagSnapshot) -> Result<Artifact>;
}

/// Graphviz DOT renderer.
///
/// Processes are drawn as skyblue ellipses and resources as lightgreen
/// boxes; request edges are solid, allocation edges dashed. Internal DOT
/// node names are kind-prefixed so a process and a resource sharing a
/// textual id stay distinct.
#[derive(Debug, Default)]
pub struct DotRenderer;

impl GraphRenderer for DotRenderer {
    fn render(&self, snapshot: &RagSnapshot) -> Result<Artifact> {
        let mut dot = String::from("digraph rag {\n  rankdir=LR;\n");

        for node in snapshot.nodes() {
            let (shape, fill) = match node.kind {
                NodeKind::Process => ("ellipse", "skyblue"),
                NodeKind::Resource => ("box", "lightgreen"),
            };
            writeln!(
                dot,
                "  \"{}\" [label=\"{}\", shape={}, style=filled, fillcolor={}];",
                dot_name(node.kind, &node.id),
                escape(&node.id),
                shape,
                fill,
            )?;
        }

        for (from, to, kind) in snapshot.edges() {
            let (style, label) = match kind {
                EdgeKind::Request => ("solid", "request"),
                EdgeKind::Allocation => ("dashed", "allocate"),
            };
            writeln!(
                dot,
                "  \"{}\" -> \"{}\" [style={}, label=\"{}\"];",
                dot_name(from.kind, &from.id),
                dot_name(to.kind, &to.id),
                style,
                label,
            )?;
        }

        dot.push_str("}\n");

        Ok(Artifact {
            key: format!("graph_{}.dot", &Uuid::new_v4().simple().to_string()[..8]),
            content_type: "text/vnd.graphviz",
            bytes: dot.into_bytes(),
        })
    }
}

fn dot_name(kind: NodeKind, id: &str) -> String {
    let prefix = match kind {
        NodeKind::Process => "p",
        NodeKind::Resource => "r",
    };
    format!("{}:{}", prefix, escape(id))
}

fn escape(id: &str) -> String {
    id.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Concurrent registry of rendered artifacts, keyed by the opaque reference
/// returned to callers. Previously handed-out references stay fetchable
/// until the registry is dropped. With a spill directory configured, each
/// artifact is also written to disk so a static file server can pick it up.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    artifacts: DashMap<String, Artifact>,
    spill_dir: Option<PathBuf>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spill_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts: DashMap::new(),
            spill_dir: Some(dir.into()),
        }
    }

    /// Stores an artifact and returns its key.
    pub fn put(&self, artifact: Artifact) -> Result<String> {
        if let Some(dir) = &self.spill_dir {
            std::fs::create_dir_all(dir)?;
            std::fs::write(dir.join(&artifact.key), &artifact.bytes)?;
        }
        let key = artifact.key.clone();
        self.artifacts.insert(key.clone(), artifact);
        Ok(key)
    }

    pub fn get(&self, key: &str) -> Option<Artifact> {
        self.artifacts.get(key).map(|a| a.value().clone())
    }

    /// Drops every stored artifact. Spilled files are left on disk.
    pub fn clear(&self) {
        self.artifacts.clear();
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Structural projection of a snapshot for clients that render the graph
/// themselves. Serializes as `{"nodes": [{"id", "type"}], "edges":
/// [{"source", "target", "type"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl GraphView {
    pub fn from_snapshot(snapshot: &RagSnapshot) -> Self {
        Self {
            nodes: snapshot
                .nodes()
                .map(|n| NodeView {
                    id: n.id.clone(),
                    kind: n.kind,
                })
                .collect(),
            edges: snapshot
                .edges()
                .map(|(from, to, kind)| EdgeView {
                    source: from.id.clone(),
                    target: to.id.clone(),
                    kind,
                })
                .collect(),
        }
    }
}
