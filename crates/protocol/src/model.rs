use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Stable project identity: a truncated hex digest of the normalized absolute path.
/// Immutable once assigned; collisions are treated as impossible for this domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let normalized = normalize_path(path);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let digest = hasher.finalize();
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self(hex[..32].to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reconstructs an id previously produced by [`Self::from_path`] or [`Self::as_str`],
    /// e.g. when loading a persisted registry keyed by project id.
    #[must_use]
    pub fn from_raw(id: String) -> Self {
        Self(id)
    }

    /// Backend collection name for the vector store. Deterministic from the id.
    #[must_use]
    pub fn collection_name(&self) -> String {
        format!("collection_{}", self.0)
    }

    /// Backend space name for the graph store, sanitized to `[A-Za-z0-9_]`.
    #[must_use]
    pub fn space_name(&self) -> String {
        format!("project_{}", self.0)
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize to an OS-native absolute form. Symlink resolution is attempted but falls back to
/// the lexical absolute path when the target doesn't exist yet (e.g. during tests).
fn normalize_path(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let resolved = std::fs::canonicalize(&absolute).unwrap_or(absolute);
    resolved.to_string_lossy().into_owned()
}

/// Deterministic VectorPoint id so reindexing the same content is idempotent.
#[must_use]
pub fn vector_point_id(
    project_id: &ProjectId,
    relative_path: &str,
    chunk_index: usize,
    content_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_id.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(relative_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(chunk_index.to_le_bytes());
    hasher.update(b"\0");
    hasher.update(content_hash.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Pending,
    Indexing,
    Active,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsystemState {
    Pending,
    Indexing,
    Completed,
    Partial,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemStatus {
    pub state: SubsystemState,
    pub progress: f32,
    pub processed: u64,
    pub failed: u64,
    pub error: Option<String>,
}

impl Default for SubsystemStatus {
    fn default() -> Self {
        Self {
            state: SubsystemState::Pending,
            progress: 0.0,
            processed: 0,
            failed: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub embedder: Option<String>,
    pub batch_size: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    pub id: ProjectId,
    pub path: String,
    pub status: ProjectStatus,
    pub vector_status: SubsystemStatus,
    pub graph_status: SubsystemStatus,
    pub indexing_progress: f32,
    pub total_files: u64,
    pub indexed_files: u64,
    pub failed_files: u64,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_indexed_at: Option<i64>,
    pub settings: ProjectSettings,
}

impl ProjectState {
    #[must_use]
    pub fn new(id: ProjectId, path: String, now: i64) -> Self {
        Self {
            id,
            path,
            status: ProjectStatus::Pending,
            vector_status: SubsystemStatus::default(),
            graph_status: SubsystemStatus::default(),
            indexing_progress: 0.0,
            total_files: 0,
            indexed_files: 0,
            failed_files: 0,
            created_at: now,
            updated_at: now,
            last_indexed_at: None,
            settings: ProjectSettings::default(),
        }
    }

    /// Aggregate status is derived from the two subsystem statuses, never set directly.
    pub fn recompute_status(&mut self) {
        self.status = match (self.vector_status.state, self.graph_status.state) {
            (SubsystemState::Indexing, _) | (_, SubsystemState::Indexing) => {
                ProjectStatus::Indexing
            }
            (SubsystemState::Error, SubsystemState::Error) => ProjectStatus::Error,
            (SubsystemState::Completed, SubsystemState::Completed) => ProjectStatus::Active,
            _ => ProjectStatus::Pending,
        };
        self.indexing_progress = if self.total_files == 0 {
            1.0
        } else {
            self.indexed_files as f32 / self.total_files.max(1) as f32
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Pending,
    Indexed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub project_id: ProjectId,
    pub relative_path: String,
    pub content_hash: String,
    pub size: u64,
    pub mtime: i64,
    pub language: Option<String>,
    pub last_indexed: Option<i64>,
    pub state: FileState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderProvider {
    pub name: String,
    pub available: bool,
    pub model: String,
    pub dimensions: usize,
    pub max_batch_size: usize,
    pub requires_api_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingInput {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub vector: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_is_stable_for_same_path() {
        let a = ProjectId::from_path(Path::new("/tmp/does-not-exist-abc"));
        let b = ProjectId::from_path(Path::new("/tmp/does-not-exist-abc"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn project_id_differs_for_different_paths() {
        let a = ProjectId::from_path(Path::new("/tmp/project-a"));
        let b = ProjectId::from_path(Path::new("/tmp/project-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn collection_and_space_names_are_derived_and_distinct() {
        let id = ProjectId::from_path(Path::new("/tmp/project-a"));
        assert!(id.collection_name().starts_with("collection_"));
        assert!(id.space_name().starts_with("project_"));
        assert_ne!(id.collection_name(), id.space_name());
    }

    #[test]
    fn vector_point_id_is_deterministic() {
        let id = ProjectId::from_path(Path::new("/tmp/project-a"));
        let a = vector_point_id(&id, "src/main.rs", 0, "abc123");
        let b = vector_point_id(&id, "src/main.rs", 0, "abc123");
        let c = vector_point_id(&id, "src/main.rs", 1, "abc123");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
