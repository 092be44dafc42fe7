use crate::contextual_imports::{extract_imports_from_lines, filter_relevant_imports};
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::types::{ChunkMetadata, ChunkType, CodeChunk};
use tree_sitter::{Node, Parser};

/// How chunks are carved out of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingStrategy {
    /// Split along top-level syntactic units (functions, methods, types) via tree-sitter.
    /// Falls back to `LineCount` for languages without AST support.
    Ast,
    /// Fixed-size windows of lines, with no syntax awareness.
    LineCount,
}

/// How neighboring chunks carry shared context (e.g. imports) without duplicating content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapStrategy {
    None,
    /// Attach relevant file-level imports to each chunk's metadata instead of repeating
    /// the import lines in the chunk body.
    Contextual,
}

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub strategy: ChunkingStrategy,
    pub overlap: OverlapStrategy,
    pub target_chunk_tokens: usize,
    pub max_chunk_tokens: usize,
    pub min_chunk_tokens: usize,
    pub include_imports: bool,
    pub include_parent_context: bool,
    pub include_documentation: bool,
    pub max_imports_per_chunk: usize,
    pub supported_languages: Vec<Language>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Ast,
            overlap: OverlapStrategy::Contextual,
            target_chunk_tokens: 400,
            max_chunk_tokens: 1200,
            min_chunk_tokens: 20,
            include_imports: true,
            include_parent_context: true,
            include_documentation: true,
            max_imports_per_chunk: 6,
            supported_languages: Vec::new(),
        }
    }
}

impl ChunkerConfig {
    /// Tuned for dense, embedding-sized chunks: smaller windows, tighter import budget.
    #[must_use]
    pub fn for_embeddings() -> Self {
        Self {
            target_chunk_tokens: 256,
            max_chunk_tokens: 800,
            min_chunk_tokens: 10,
            max_imports_per_chunk: 4,
            ..Self::default()
        }
    }
}

/// Splits file content into [`CodeChunk`]s per a [`ChunkerConfig`].
///
/// The chunker is deliberately kept opaque to its consumers: they see a sequence of chunks
/// with metadata, never the parser internals.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn chunk_str(&self, content: &str, path: Option<&str>) -> Result<Vec<CodeChunk>> {
        let path_str = path.unwrap_or("buffer");
        let language = Language::from_path(path_str);

        if !self.language_enabled(language) {
            return Ok(Vec::new());
        }

        let lines: Vec<&str> = content.lines().collect();
        let file_imports = extract_imports_from_lines(language, &lines, usize::MAX);

        let mut chunks = if self.config.strategy == ChunkingStrategy::Ast && language.supports_ast()
        {
            self.chunk_ast(content, path_str, language)?
        } else {
            Vec::new()
        };

        if chunks.is_empty() {
            chunks = self.chunk_by_lines(content, path_str, language);
        }

        chunks = self.merge_small_chunks(chunks, content, path_str);

        if self.config.include_imports && self.config.overlap == OverlapStrategy::Contextual {
            for chunk in &mut chunks {
                let relevant = filter_relevant_imports(
                    language,
                    &file_imports,
                    &chunk.content,
                    self.config.max_imports_per_chunk,
                );
                chunk.metadata.context_imports = relevant;
            }
        }

        Ok(chunks)
    }

    fn language_enabled(&self, language: Language) -> bool {
        self.config.supported_languages.is_empty()
            || self.config.supported_languages.contains(&language)
    }

    fn chunk_ast(&self, content: &str, path: &str, language: Language) -> Result<Vec<CodeChunk>> {
        let ts_lang = language
            .tree_sitter_language()
            .map_err(|_| ChunkerError::unsupported_language(language.as_str()))?;

        let mut parser = Parser::new();
        parser
            .set_language(&ts_lang)
            .map_err(|e| ChunkerError::ParseFailed(e.to_string()))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::ParseFailed("tree-sitter returned no tree".to_string()))?;

        let mut chunks = Vec::new();
        let root = tree.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            self.collect_ast_chunk(child, content, path, language, None, &mut chunks);
        }
        Ok(chunks)
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_ast_chunk(
        &self,
        node: Node,
        content: &str,
        path: &str,
        language: Language,
        parent_scope: Option<String>,
        out: &mut Vec<CodeChunk>,
    ) {
        let kind = node.kind();

        if language == Language::Rust && kind == "impl_item" {
            let scope = node
                .child_by_field_name("type")
                .map(|n| node_text(n, content).to_string());

            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.children(&mut cursor) {
                    if member.kind() == "function_item" {
                        self.push_function_chunk(
                            member,
                            content,
                            path,
                            scope.clone(),
                            ChunkType::Method,
                            out,
                        );
                    }
                }
            }
            return;
        }

        let chunk_type = rust_like_chunk_type(language, kind);
        if let Some(chunk_type) = chunk_type {
            self.push_function_chunk(node, content, path, parent_scope, chunk_type, out);
        }
    }

    fn push_function_chunk(
        &self,
        node: Node,
        content: &str,
        path: &str,
        parent_scope: Option<String>,
        chunk_type: ChunkType,
        out: &mut Vec<CodeChunk>,
    ) {
        let language = Language::from_path(path);
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(n, content).to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        let (doc, doc_start_row) = self.leading_doc_comment(node, content);
        let start_row = doc_start_row.unwrap_or_else(|| node.start_position().row);
        let end_row = node.end_position().row;

        let body_text = node_text(node, content).to_string();
        let full_text = if let Some(doc) = &doc {
            if self.config.include_documentation {
                format!("{doc}\n{body_text}")
            } else {
                body_text
            }
        } else {
            body_text
        };

        let qualified_name = if self.config.include_parent_context {
            parent_scope
                .as_ref()
                .map_or_else(|| name.clone(), |scope| format!("{scope}::{name}"))
        } else {
            name.clone()
        };

        let mut metadata = ChunkMetadata::default()
            .symbol_name(name)
            .chunk_type(chunk_type)
            .qualified_name(qualified_name)
            .language(language.as_str());

        if self.config.include_parent_context {
            if let Some(scope) = parent_scope {
                metadata = metadata.parent_scope(scope);
            }
        }

        if self.config.include_documentation {
            if let Some(doc) = doc {
                metadata = metadata.documentation(doc);
            }
        }

        out.push(CodeChunk::new(
            path.to_string(),
            start_row + 1,
            end_row + 1,
            full_text,
            metadata,
        ));
    }

    fn leading_doc_comment(&self, node: Node, content: &str) -> (Option<String>, Option<usize>) {
        let mut doc_lines = Vec::new();
        let mut cursor_row = None;
        let mut sibling = node.prev_sibling();
        while let Some(s) = sibling {
            if s.kind() == "line_comment" || s.kind() == "block_comment" || s.kind() == "comment" {
                let text = node_text(s, content);
                if text.starts_with("///") || text.starts_with("//!") || text.starts_with("/**") {
                    doc_lines.push(text.to_string());
                    cursor_row = Some(s.start_position().row);
                    sibling = s.prev_sibling();
                    continue;
                }
            }
            break;
        }
        if doc_lines.is_empty() {
            return (None, None);
        }
        doc_lines.reverse();
        (Some(doc_lines.join("\n")), cursor_row)
    }

    fn chunk_by_lines(&self, content: &str, path: &str, language: Language) -> Vec<CodeChunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let window = self.config.target_chunk_tokens.max(1);
        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < lines.len() {
            let end = (start + window).min(lines.len());
            let slice = lines[start..end].join("\n");
            let metadata = ChunkMetadata::default().language(language.as_str());
            chunks.push(CodeChunk::new(
                path.to_string(),
                start + 1,
                end,
                slice,
                metadata,
            ));
            start = end;
        }
        chunks
    }

    /// Merge tiny adjacent top-level chunks so very small items (a one-line const, a trivial
    /// getter) don't each become their own embedding unit.
    fn merge_small_chunks(
        &self,
        chunks: Vec<CodeChunk>,
        _content: &str,
        _path: &str,
    ) -> Vec<CodeChunk> {
        if chunks.len() < 2 {
            return chunks;
        }

        let soft_threshold = (self.config.target_chunk_tokens / 2).max(1);
        let mut merged: Vec<CodeChunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.line_count() < self.config.min_chunk_tokens {
                if let Some(prev) = merged.last_mut() {
                    if prev.line_count() < soft_threshold && prev.file_path == chunk.file_path {
                        prev.end_line = chunk.end_line;
                        prev.content = format!("{}\n{}", prev.content, chunk.content);
                        continue;
                    }
                }
            }
            merged.push(chunk);
        }
        merged
    }
}

fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    &content[node.start_byte()..node.end_byte()]
}

fn rust_like_chunk_type(language: Language, kind: &str) -> Option<ChunkType> {
    match language {
        Language::Rust => match kind {
            "function_item" => Some(ChunkType::Function),
            "struct_item" => Some(ChunkType::Struct),
            "enum_item" => Some(ChunkType::Enum),
            "trait_item" => Some(ChunkType::Interface),
            "const_item" | "static_item" => Some(ChunkType::Const),
            _ => None,
        },
        Language::Python => match kind {
            "function_definition" => Some(ChunkType::Function),
            "class_definition" => Some(ChunkType::Class),
            _ => None,
        },
        Language::JavaScript | Language::TypeScript => match kind {
            "function_declaration" => Some(ChunkType::Function),
            "class_declaration" => Some(ChunkType::Class),
            "method_definition" => Some(ChunkType::Method),
            "interface_declaration" => Some(ChunkType::Interface),
            _ => None,
        },
        _ => None,
    }
}
