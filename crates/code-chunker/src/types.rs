use serde::{Deserialize, Serialize};

/// Structural kind of a chunk, when the chunker could determine one via AST analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkType {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Variable,
    Const,
    Module,
}

/// Metadata attached to a chunk. Built incrementally via the builder-style setters during
/// chunking, then consumed read-only by everything downstream (embedding templates, the
/// graph builder, search ranking).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub language: Option<String>,
    pub chunk_type: Option<ChunkType>,
    pub symbol_name: Option<String>,
    pub qualified_name: Option<String>,
    pub parent_scope: Option<String>,
    pub documentation: Option<String>,
    pub tags: Vec<String>,
    pub bundle_tags: Vec<String>,
    pub related_paths: Vec<String>,
    /// Imports judged relevant to this chunk's symbols, attached without mutating `content`.
    pub context_imports: Vec<String>,
    pub modified: Option<i64>,
}

impl ChunkMetadata {
    #[must_use]
    pub fn symbol_name(mut self, name: impl Into<String>) -> Self {
        self.symbol_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn chunk_type(mut self, kind: ChunkType) -> Self {
        self.chunk_type = Some(kind);
        self
    }

    #[must_use]
    pub fn qualified_name(mut self, name: impl Into<String>) -> Self {
        self.qualified_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn parent_scope(mut self, scope: impl Into<String>) -> Self {
        self.parent_scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn documentation(mut self, doc: impl Into<String>) -> Self {
        self.documentation = Some(doc.into());
        self
    }

    #[must_use]
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.language = Some(lang.into());
        self
    }
}

/// A contiguous fragment of source code, the unit the embedder and graph builder operate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl CodeChunk {
    #[must_use]
    pub fn new(
        file_path: String,
        start_line: usize,
        end_line: usize,
        content: String,
        metadata: ChunkMetadata,
    ) -> Self {
        Self {
            file_path,
            start_line,
            end_line,
            content,
            metadata,
        }
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line).max(1)
    }

    #[must_use]
    pub fn chunk_id(&self) -> String {
        format!("{}:{}:{}", self.file_path, self.start_line, self.end_line)
    }
}
