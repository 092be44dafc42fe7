//! Shared data model and error taxonomy for the indexing coordination engine.
//!
//! Every other crate in the workspace depends on this one and nothing here depends back on
//! them, keeping the dependency graph a strict DAG rooted at the coordinator.

mod error;
mod model;

pub use error::{ErrorScope, IndexError, Result};
pub use model::{
    content_hash, vector_point_id, EmbedderProvider, EmbeddingInput, EmbeddingResult, FileRecord,
    FileState, GraphEdge, GraphNode, ProjectId, ProjectSettings, ProjectState, ProjectStatus,
    SubsystemState, SubsystemStatus, VectorPoint,
};
