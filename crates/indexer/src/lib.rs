//! # Index Coordinator
//!
//! Registers source-code projects and keeps their vector and graph stores populated and in
//! sync, both for an initial full pass and incrementally as files change.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware, streamed through a bounded queue)
//!     │      └─> Source files
//!     │
//!     ├──> Chunker (AST-aware)
//!     │      └─> Code chunks
//!     │
//!     ├──> Embedder Pool ──> Vector Store
//!     │
//!     └──> Graph Builder ──> Graph Store
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use indexcore_coordinator::IndexCoordinator;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // `coordinator` is constructed from a registry, hash store, embedder pool, and the
//!     // vector/graph store adapters; see `IndexCoordinator::new`.
//!     # let coordinator: std::sync::Arc<IndexCoordinator> = unimplemented!();
//!     let id = coordinator.start_indexing(Path::new("/path/to/project"), false).await?;
//!     let state = coordinator.status(&id).await?;
//!     println!("indexed {} files", state.indexed_files);
//!     Ok(())
//! }
//! ```

mod coordinator;
mod embedder_pool;
mod error;
mod hash_store;
mod health;
mod ignore_matcher;
mod index_state;
mod registry;
mod scanner;
mod stats;
mod watcher;
mod watermark_io;

pub use coordinator::{IndexCoordinator, IndexScope};
pub use embedder_pool::{EmbedderBackend, EmbedderPool, LocalEmbedderBackend, RemoteEmbedderBackend};
pub use error::{IndexerError, Result};
pub use hash_store::{HashDiff, HashStore};
pub use health::append_failure_reason;
pub use health::{health_file_path, read_health_snapshot, write_health_snapshot, HealthSnapshot};
pub use ignore_matcher::IgnoreMatcher;
pub use index_state::{
    assess_staleness, IndexSnapshot, IndexState, ReindexAttempt, ReindexResult, StaleAssessment,
    StaleReason, ToolMeta, Watermark, INDEX_STATE_SCHEMA_VERSION,
};
pub use registry::ProjectRegistry;
pub use scanner::FileScanner;
pub use stats::IndexStats;
pub use watcher::{IndexUpdate, IndexerHealth, ProjectWatcher, StreamingIndexerConfig};
pub use watermark_io::{
    compute_project_watermark, index_watermark_path_for_store, read_index_watermark,
    write_index_watermark, PersistedIndexWatermark,
};
