//! Splits source files into syntax-aware chunks for embedding and graph extraction.
//!
//! Consumers treat a [`CodeChunk`] as opaque content plus metadata; this crate owns the
//! tree-sitter grammars and chunk-size heuristics so the rest of the workspace doesn't have to.

mod chunker;
mod contextual_imports;
mod error;
mod language;
mod types;

pub use chunker::{Chunker, ChunkerConfig, ChunkingStrategy, OverlapStrategy};
pub use contextual_imports::{
    extract_identifiers_from_import, extract_imports_from_lines, filter_relevant_imports,
};
pub use error::{ChunkerError, Result};
pub use language::{Language, LanguageSizeLimits};
pub use types::{ChunkMetadata, ChunkType, CodeChunk};
