//! In-memory resource-allocation-graph (RAG) deadlock detection.
//!
//! The engine keeps one shared directed graph of processes and resources,
//! records request and allocation edges, and answers deadlock queries by
//! enumerating the elementary cycles of the graph. Transport layers (HTTP,
//! CLI) sit on top of [`DeadlockEngine`] and stay out of this crate: they
//! surface the typed [`EngineError`] categories to users and serve artifact
//! bytes out of [`ArtifactStore`].

pub mod detect;
pub mod engine;
pub mod export;
pub mod store;

pub use detect::{find_cycles, DetectionReport};
pub use engine::{DeadlockEngine, EngineError};
pub use export::{Artifact, ArtifactStore, DotRenderer, GraphRenderer, GraphView};
pub use store::{EdgeKind, Node, NodeKind, RagSnapshot, RagStore, StoreError};
