use crate::error::Result;
use indexcore_chunker::CodeChunk;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const CHUNK_CORPUS_SCHEMA_VERSION: u32 = 1;

/// Flat, per-project record of every chunk produced by the chunker, keyed by relative file
/// path. This is the un-embedded twin of `VectorStore`: text search, the doctor tool, and
/// incremental corpus rebuilds read this file directly instead of paying for embeddings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChunkCorpus {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    files: HashMap<String, Vec<CodeChunk>>,
}

fn default_schema_version() -> u32 {
    CHUNK_CORPUS_SCHEMA_VERSION
}

impl ChunkCorpus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: CHUNK_CORPUS_SCHEMA_VERSION,
            files: HashMap::new(),
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let corpus: Self = serde_json::from_slice(&bytes)?;
        Ok(corpus)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn set_file_chunks(&mut self, relative_path: String, chunks: Vec<CodeChunk>) {
        if chunks.is_empty() {
            self.files.remove(&relative_path);
        } else {
            self.files.insert(relative_path, chunks);
        }
    }

    /// Drops every file not present in `live_files`, returning how many were removed.
    pub fn purge_missing_files(&mut self, live_files: &HashSet<String>) -> usize {
        let stale: Vec<String> = self
            .files
            .keys()
            .filter(|path| !live_files.contains(*path))
            .cloned()
            .collect();
        for path in &stale {
            self.files.remove(path);
        }
        stale.len()
    }

    #[must_use]
    pub fn files(&self) -> &HashMap<String, Vec<CodeChunk>> {
        &self.files
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// The chunk corpus for a project lives alongside its per-model indices under `.indexcore/`.
#[must_use]
pub fn corpus_path_for_project_root(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(".indexcore").join("corpus.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexcore_chunker::ChunkMetadata;

    fn chunk(path: &str) -> CodeChunk {
        CodeChunk::new(path.to_string(), 1, 2, "fn x() {}".to_string(), ChunkMetadata::default())
    }

    #[test]
    fn set_file_chunks_removes_entry_when_empty() {
        let mut corpus = ChunkCorpus::new();
        corpus.set_file_chunks("a.rs".to_string(), vec![chunk("a.rs")]);
        assert_eq!(corpus.chunk_count(), 1);
        corpus.set_file_chunks("a.rs".to_string(), vec![]);
        assert_eq!(corpus.chunk_count(), 0);
    }

    #[test]
    fn purge_missing_files_drops_stale_entries() {
        let mut corpus = ChunkCorpus::new();
        corpus.set_file_chunks("a.rs".to_string(), vec![chunk("a.rs")]);
        corpus.set_file_chunks("b.rs".to_string(), vec![chunk("b.rs")]);
        let live: HashSet<String> = ["a.rs".to_string()].into_iter().collect();
        let removed = corpus.purge_missing_files(&live);
        assert_eq!(removed, 1);
        assert!(corpus.files().contains_key("a.rs"));
        assert!(!corpus.files().contains_key("b.rs"));
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".indexcore").join("corpus.json");
        let mut corpus = ChunkCorpus::new();
        corpus.set_file_chunks("a.rs".to_string(), vec![chunk("a.rs")]);
        corpus.save(&path).await.unwrap();

        let loaded = ChunkCorpus::load(&path).await.unwrap();
        assert_eq!(loaded.chunk_count(), 1);
    }
}
