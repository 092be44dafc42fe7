use crate::embedder::{cosine_similarity, Embedder};
use crate::error::{Result, VectorStoreError};
use crate::model_registry::{current_model_id, ModelRegistry, DEFAULT_MODEL_ID};
use crate::templates::{classify_document_kind, DocumentKind, EmbeddingTemplates, QueryKind};
use indexcore_chunker::CodeChunk;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const VECTOR_STORE_SCHEMA_VERSION: u32 = 3;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk: CodeChunk,
    pub vector: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub chunk: CodeChunk,
    pub score: f32,
    pub id: String,
}

#[derive(Default, Serialize, Deserialize)]
struct PersistedStore {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    model_id: String,
    #[serde(default)]
    template_hash: u64,
    #[serde(default)]
    id_map: HashMap<u64, String>,
    #[serde(default)]
    vectors: HashMap<u64, StoredChunk>,
}

fn default_schema_version() -> u32 {
    VECTOR_STORE_SCHEMA_VERSION
}

/// Per-project, per-model semantic index: chunk text rendered through `EmbeddingTemplates`,
/// embedded via `Embedder`, and kept in memory as flat vectors searched by brute-force cosine
/// similarity. Persisted as a single JSON file so it can be inspected and diffed by hand.
pub struct VectorStore {
    path: PathBuf,
    model_id: String,
    dimension: usize,
    templates: EmbeddingTemplates,
    embedder: Embedder,
    next_id: u64,
    id_map: HashMap<u64, String>,
    chunk_index: HashMap<String, u64>,
    vectors: HashMap<u64, StoredChunk>,
}

fn fallback_model_id() -> String {
    current_model_id().unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string())
}

impl VectorStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::new_for_model(path, fallback_model_id())
    }

    pub fn new_for_model(path: impl AsRef<Path>, model_id: impl Into<String>) -> Result<Self> {
        Self::new_with_templates_for_model(path, model_id, EmbeddingTemplates::default())
    }

    pub fn new_with_templates_for_model(
        path: impl AsRef<Path>,
        model_id: impl Into<String>,
        templates: EmbeddingTemplates,
    ) -> Result<Self> {
        templates.validate()?;
        let model_id = model_id.into();
        let registry = ModelRegistry::from_env()?;
        let dimension = registry.dimension(&model_id).unwrap_or(384);
        let repo_id = registry.repo_id(&model_id).ok().map(str::to_string);
        let embedder = Embedder::new(model_id.clone(), dimension, repo_id);

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            model_id,
            dimension,
            templates,
            embedder,
            next_id: 0,
            id_map: HashMap::new(),
            chunk_index: HashMap::new(),
            vectors: HashMap::new(),
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_for_model(path, fallback_model_id()).await
    }

    pub async fn load_for_model(path: impl AsRef<Path>, model_id: impl Into<String>) -> Result<Self> {
        Self::load_with_templates_for_model(path, EmbeddingTemplates::default(), model_id).await
    }

    pub async fn load_with_templates_for_model(
        path: impl AsRef<Path>,
        templates: EmbeddingTemplates,
        model_id: impl Into<String>,
    ) -> Result<Self> {
        templates.validate()?;
        let path = path.as_ref().to_path_buf();
        let requested_model_id = model_id.into();

        let bytes = tokio::fs::read(&path).await?;
        let persisted: PersistedStore = serde_json::from_slice(&bytes)
            .map_err(|e| VectorStoreError::Corrupted(format!("{}: {e}", path.display())))?;

        let model_id = if persisted.model_id.is_empty() {
            requested_model_id
        } else {
            persisted.model_id
        };

        let registry = ModelRegistry::from_env()?;
        let dimension = if persisted.dimension > 0 {
            persisted.dimension
        } else {
            registry.dimension(&model_id).unwrap_or(384)
        };
        let repo_id = registry.repo_id(&model_id).ok().map(str::to_string);
        let embedder = Embedder::new(model_id.clone(), dimension, repo_id);

        let mut chunk_index = HashMap::with_capacity(persisted.id_map.len());
        for (&id, chunk_id) in &persisted.id_map {
            chunk_index.insert(chunk_id.clone(), id);
        }

        Ok(Self {
            path,
            model_id,
            dimension,
            templates,
            embedder,
            next_id: persisted.next_id.max(
                persisted
                    .id_map
                    .keys()
                    .copied()
                    .max()
                    .map_or(0, |m| m + 1),
            ),
            id_map: persisted.id_map,
            chunk_index,
            vectors: persisted.vectors,
        })
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn add_chunks(&mut self, chunks: Vec<CodeChunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut texts = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            texts.push(self.templates.render_doc_chunk(chunk)?);
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_texts(&refs).await?;

        if vectors.len() != chunks.len() {
            return Err(VectorStoreError::Corrupted(
                "embedder returned a different number of vectors than chunks".into(),
            ));
        }

        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let chunk_id = chunk.chunk_id();
            let id = match self.chunk_index.get(&chunk_id) {
                Some(&existing) => existing,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.chunk_index.insert(chunk_id.clone(), id);
                    id
                }
            };
            self.id_map.insert(id, chunk_id);
            self.vectors.insert(id, StoredChunk { chunk, vector });
        }

        Ok(())
    }

    /// Removes every chunk belonging to `relative_path`, returning how many were removed.
    pub fn remove_chunks_for_file(&mut self, relative_path: &str) -> usize {
        let stale: Vec<u64> = self
            .vectors
            .iter()
            .filter(|(_, stored)| stored.chunk.file_path == relative_path)
            .map(|(&id, _)| id)
            .collect();
        self.remove_ids(&stale)
    }

    /// Removes every chunk whose file is absent from `live_files`, returning how many were
    /// removed. Mirrors `ChunkCorpus::purge_missing_files`.
    pub fn purge_missing_files(&mut self, live_files: &HashSet<String>) -> usize {
        let stale: Vec<u64> = self
            .vectors
            .iter()
            .filter(|(_, stored)| !live_files.contains(&stored.chunk.file_path))
            .map(|(&id, _)| id)
            .collect();
        self.remove_ids(&stale)
    }

    fn remove_ids(&mut self, ids: &[u64]) -> usize {
        for id in ids {
            self.vectors.remove(id);
            if let Some(chunk_id) = self.id_map.remove(id) {
                self.chunk_index.remove(&chunk_id);
            }
        }
        ids.len()
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let persisted = PersistedStore {
            schema_version: VECTOR_STORE_SCHEMA_VERSION,
            dimension: self.dimension,
            next_id: self.next_id,
            model_id: self.model_id.clone(),
            template_hash: self.templates.doc_template_hash(),
            id_map: self.id_map.clone(),
            vectors: self.vectors.clone(),
        };

        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    #[must_use]
    pub fn chunk_ids(&self) -> Vec<String> {
        self.id_map.values().cloned().collect()
    }

    #[must_use]
    pub fn get_chunk(&self, id: &str) -> Option<&StoredChunk> {
        let numeric_id = self.chunk_index.get(id)?;
        self.vectors.get(numeric_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub async fn search(&mut self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let results = self.search_batch(&[query], limit).await?;
        Ok(results.into_iter().next().unwrap_or_default())
    }

    pub async fn search_batch(&mut self, queries: &[&str], limit: usize) -> Result<Vec<Vec<SearchResult>>> {
        if queries.is_empty() || self.vectors.is_empty() {
            return Ok(vec![Vec::new(); queries.len()]);
        }

        let mut rendered = Vec::with_capacity(queries.len());
        for query in queries {
            let kind = classify_query_kind(query);
            rendered.push(self.templates.render_query(kind, query)?);
        }
        let refs: Vec<&str> = rendered.iter().map(String::as_str).collect();
        let query_vectors = self.embedder.embed_texts(&refs).await?;

        let mut all_results = Vec::with_capacity(query_vectors.len());
        for query_vector in &query_vectors {
            let mut scored: Vec<SearchResult> = self
                .vectors
                .iter()
                .map(|(id, stored)| SearchResult {
                    chunk: stored.chunk.clone(),
                    score: cosine_similarity(query_vector, &stored.vector),
                    id: self
                        .id_map
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| stored.chunk.chunk_id()),
                })
                .collect();

            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(limit);
            all_results.push(scored);
        }

        Ok(all_results)
    }
}

fn classify_query_kind(query: &str) -> QueryKind {
    let trimmed = query.trim();
    if trimmed.contains('/') || trimmed.contains('\\') || trimmed.ends_with(".rs") {
        return QueryKind::Path;
    }
    let is_identifier_like = !trimmed.contains(' ')
        && trimmed
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == ':' || c == '.');
    if is_identifier_like && !trimmed.is_empty() {
        QueryKind::Identifier
    } else {
        QueryKind::Conceptual
    }
}

#[must_use]
pub fn classify_chunk_kind(chunk: &CodeChunk) -> DocumentKind {
    classify_document_kind(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_query_kind_detects_paths_and_identifiers() {
        assert_eq!(classify_query_kind("src/main.rs"), QueryKind::Path);
        assert_eq!(classify_query_kind("ProjectRegistry"), QueryKind::Identifier);
        assert_eq!(classify_query_kind("how does indexing work"), QueryKind::Conceptual);
    }

    #[test]
    fn new_rejects_invalid_templates() {
        let mut templates = EmbeddingTemplates::default();
        templates.schema_version = 99;
        let dir = tempfile::tempdir().unwrap();
        let result = VectorStore::new_with_templates_for_model(
            dir.path().join("index.json"),
            "bge-small",
            templates,
        );
        assert!(result.is_err());
    }
}
