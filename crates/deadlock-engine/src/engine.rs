use crate::detect::{self, DetectionReport};
use crate::export::{ArtifactStore, DotRenderer, GraphRenderer, GraphView};
use crate::store::{NodeKind, RagSnapshot, RagStore, StoreError};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

/// User-facing error taxonomy. Every variant except `Render` is recoverable
/// by resubmission and leaves the graph unchanged.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("identifier must be a non-empty string")]
    InvalidId,
    #[error("{kind} '{id}' is already registered")]
    DuplicateNode { kind: NodeKind, id: String },
    #[error("{kind} '{id}' is not registered")]
    UnknownNode { kind: NodeKind, id: String },
    #[error("failed to materialize graph artifact: {0}")]
    Render(#[from] anyhow::Error),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateNode { kind, id } => EngineError::DuplicateNode { kind, id },
            StoreError::UnknownNode { kind, id } => EngineError::UnknownNode { kind, id },
        }
    }
}

/// The shared deadlock-detection engine: one process-wide resource-allocation
/// graph behind a lock, plus the export adapter that materializes renders.
///
/// Mutations serialize on the write lock. Reads (`detect`, `visualize`,
/// `graph_view`) take the read lock only long enough to clone a snapshot and
/// do their traversal outside it, so detection is never corrupted by a
/// concurrent mutation and rendering never holds the lock. Wrap in an `Arc`
/// to share across threads.
pub struct DeadlockEngine {
    store: RwLock<RagStore>,
    renderer: Box<dyn GraphRenderer>,
    artifacts: ArtifactStore,
}

impl Default for DeadlockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlockEngine {
    pub fn new() -> Self {
        Self::with_renderer(Box::new(DotRenderer))
    }

    /// Builds an engine with a custom rendering backend. The renderer is a
    /// pure projection of snapshots and has no effect on detection.
    pub fn with_renderer(renderer: Box<dyn GraphRenderer>) -> Self {
        Self::with_parts(renderer, ArtifactStore::new())
    }

    /// Builds an engine from a renderer and a pre-configured artifact
    /// registry, e.g. one with a spill directory for a static file server.
    pub fn with_parts(renderer: Box<dyn GraphRenderer>, artifacts: ArtifactStore) -> Self {
        Self {
            store: RwLock::new(RagStore::new()),
            renderer,
            artifacts,
        }
    }

    /// Registry holding the artifacts produced by [`DeadlockEngine::visualize`];
    /// the transport layer serves bytes out of it.
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn register_process(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        self.store.write().unwrap().add_process(id)?;
        debug!(id, "registered process");
        Ok(())
    }

    pub fn register_resource(&self, id: &str) -> Result<(), EngineError> {
        validate_id(id)?;
        self.store.write().unwrap().add_resource(id)?;
        debug!(id, "registered resource");
        Ok(())
    }

    /// Records that `process_id` is waiting to acquire `resource_id`.
    pub fn submit_request(&self, process_id: &str, resource_id: &str) -> Result<(), EngineError> {
        validate_id(process_id)?;
        validate_id(resource_id)?;
        self.store
            .write()
            .unwrap()
            .add_request_edge(process_id, resource_id)?;
        debug!(process_id, resource_id, "recorded request edge");
        Ok(())
    }

    /// Records that `resource_id` is currently held by `process_id`.
    pub fn submit_allocation(&self, resource_id: &str, process_id: &str) -> Result<(), EngineError> {
        validate_id(process_id)?;
        validate_id(resource_id)?;
        self.store
            .write()
            .unwrap()
            .add_allocation_edge(resource_id, process_id)?;
        debug!(resource_id, process_id, "recorded allocation edge");
        Ok(())
    }

    /// Runs deadlock detection against a snapshot of the current graph.
    pub fn detect(&self) -> DetectionReport {
        let snapshot = self.snapshot();
        let report = detect::find_cycles(&snapshot);
        if report.has_deadlock {
            info!(cycles = report.cycles.len(), "deadlock detected");
        }
        report
    }

    /// Renders the current graph and returns an opaque artifact reference.
    /// Fetch the bytes through [`DeadlockEngine::artifacts`].
    pub fn visualize(&self) -> Result<String, EngineError> {
        let snapshot = self.snapshot();
        let artifact = self.renderer.render(&snapshot)?;
        let key = self.artifacts.put(artifact)?;
        info!(%key, "rendered graph artifact");
        Ok(key)
    }

    /// Structural projection of the current graph for clients that render
    /// themselves.
    pub fn graph_view(&self) -> GraphView {
        GraphView::from_snapshot(&self.snapshot())
    }

    /// Clears the graph back to empty. Serializes with in-flight mutations on
    /// the same lock; snapshots taken before the reset stay valid. Artifact
    /// references handed out before the reset are invalidated along with the
    /// graph they depict.
    pub fn reset(&self) {
        self.store.write().unwrap().reset();
        self.artifacts.clear();
        info!("graph state cleared");
    }

    fn snapshot(&self) -> RagSnapshot {
        self.store.read().unwrap().snapshot()
    }
}

fn validate_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() {
        return Err(EngineError::InvalidId);
    }
    Ok(())
}
