//! Per-project, per-model semantic vector index.
//!
//! Chunks come in from the chunker, get rendered through an [`EmbeddingTemplates`] profile,
//! embedded locally via ONNX Runtime, and stored as a flat JSON file searched by brute-force
//! cosine similarity. A [`ChunkCorpus`] holds the un-embedded twin of the same chunks for text
//! search and diagnostics that don't need vectors at all.
//!
//! ```no_run
//! # async fn run() -> indexcore_vector_store::Result<()> {
//! use indexcore_vector_store::VectorStore;
//!
//! let mut store = VectorStore::new("/tmp/project/.indexcore/indexes/bge-small/index.json")?;
//! let results = store.search("where do we parse config?", 10).await?;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod corpus;
mod embedder;
mod error;
mod model_registry;
mod store;
mod templates;

pub use corpus::{corpus_path_for_project_root, ChunkCorpus, CHUNK_CORPUS_SCHEMA_VERSION};
pub use embedder::{cosine_similarity, Embedder};
pub use error::{Result, VectorStoreError};
pub use model_registry::{current_model_id, ModelInfo, ModelRegistry, DEFAULT_MODEL_ID};
pub use store::{classify_chunk_kind, SearchResult, StoredChunk, VectorStore, VECTOR_STORE_SCHEMA_VERSION};
pub use templates::{
    classify_document_kind, DocumentKind, DocumentTemplates, EmbeddingTemplates,
    GraphNodeTemplates, QueryKind, QueryTemplates, EMBEDDING_TEMPLATES_SCHEMA_VERSION,
};
