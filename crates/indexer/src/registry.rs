//! C1: the project registry. Maps filesystem roots to stable [`ProjectId`]s and the durable
//! [`ProjectState`] the coordinator mutates as indexing progresses. Grounded on the teacher's
//! atomic tmp-then-rename persistence idiom (`watermark_io.rs`), generalized from a single
//! watermark file to a whole-registry snapshot.

use indexcore_protocol::{IndexError, ProjectId, ProjectState, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

const REGISTRY_FILE_NAME: &str = "registry.json";

fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedRegistry {
    #[serde(default)]
    projects: HashMap<String, ProjectState>,
}

/// Durable `root path -> ProjectState` table. One entry per registered project, keyed by the
/// project's derived [`ProjectId`] so re-registering the same path is idempotent.
pub struct ProjectRegistry {
    storage_dir: PathBuf,
    projects: RwLock<HashMap<ProjectId, ProjectState>>,
}

impl ProjectRegistry {
    fn registry_path(storage_dir: &Path) -> PathBuf {
        storage_dir.join(REGISTRY_FILE_NAME)
    }

    /// Loads the registry snapshot from `storage_dir` if present, otherwise starts empty.
    pub async fn load(storage_dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let storage_dir = storage_dir.into();
        let path = Self::registry_path(&storage_dir);
        let projects = if path.exists() {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
            let persisted: PersistedRegistry = serde_json::from_slice(&bytes)
                .map_err(|e| IndexError::Fatal { message: format!("corrupt registry: {e}") })?;
            persisted
                .projects
                .into_iter()
                .map(|(id, state)| (ProjectId::from_raw(id), state))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(Arc::new(Self {
            storage_dir,
            projects: RwLock::new(projects),
        }))
    }

    async fn persist(&self, projects: &HashMap<ProjectId, ProjectState>) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        let persisted = PersistedRegistry {
            projects: projects
                .iter()
                .map(|(id, state)| (id.as_str().to_string(), state.clone()))
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        let path = Self::registry_path(&self.storage_dir);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        Ok(())
    }

    /// Registers `path`, or returns the existing entry if already registered. Idempotent:
    /// calling twice with the same path yields the same [`ProjectId`] and does not reset state.
    pub async fn register_or_get(&self, path: &Path) -> Result<ProjectState> {
        let id = ProjectId::from_path(path);
        let mut guard = self.projects.write().await;
        if let Some(existing) = guard.get(&id) {
            return Ok(existing.clone());
        }
        let state = ProjectState::new(id.clone(), path.to_string_lossy().into_owned(), unix_now_ms());
        guard.insert(id, state.clone());
        self.persist(&guard).await?;
        Ok(state)
    }

    pub async fn path_of(&self, id: &ProjectId) -> Result<PathBuf> {
        let guard = self.projects.read().await;
        guard
            .get(id)
            .map(|s| PathBuf::from(&s.path))
            .ok_or_else(|| IndexError::NotFound { message: format!("unknown project: {id}") })
    }

    #[must_use]
    pub fn collection_of(id: &ProjectId) -> String {
        id.collection_name()
    }

    #[must_use]
    pub fn space_of(id: &ProjectId) -> String {
        id.space_name()
    }

    pub async fn get(&self, id: &ProjectId) -> Option<ProjectState> {
        self.projects.read().await.get(id).cloned()
    }

    /// Mutates a project's state under the write lock and persists the result. `f` returning
    /// an error aborts the mutation before anything is written to disk.
    pub async fn update<F>(&self, id: &ProjectId, f: F) -> Result<ProjectState>
    where
        F: FnOnce(&mut ProjectState),
    {
        let mut guard = self.projects.write().await;
        let state = guard
            .get_mut(id)
            .ok_or_else(|| IndexError::NotFound { message: format!("unknown project: {id}") })?;
        f(state);
        state.updated_at = unix_now_ms();
        let updated = state.clone();
        self.persist(&guard).await?;
        Ok(updated)
    }

    /// Bumps `updated_at` without any other mutation; used by the file watcher to record
    /// liveness on every debounced batch even when nothing in `ProjectState` itself changed.
    pub async fn touch(&self, id: &ProjectId) -> Result<()> {
        self.update(id, |_| {}).await.map(|_| ())
    }

    pub async fn remove(&self, id: &ProjectId) -> Result<()> {
        let mut guard = self.projects.write().await;
        guard.remove(id);
        self.persist(&guard).await
    }

    pub async fn list(&self) -> Vec<ProjectState> {
        self.projects.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_or_get_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::load(dir.path()).await.unwrap();

        let first = registry.register_or_get(Path::new("/tmp/proj-a")).await.unwrap();
        let second = registry.register_or_get(Path::new("/tmp/proj-a")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn update_persists_and_reload_sees_it() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::load(dir.path()).await.unwrap();
        let state = registry.register_or_get(Path::new("/tmp/proj-b")).await.unwrap();

        registry
            .update(&state.id, |s| s.total_files = 42)
            .await
            .unwrap();

        let reloaded = ProjectRegistry::load(dir.path()).await.unwrap();
        let got = reloaded.get(&state.id).await.unwrap();
        assert_eq!(got.total_files, 42);
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::load(dir.path()).await.unwrap();
        let state = registry.register_or_get(Path::new("/tmp/proj-c")).await.unwrap();

        registry.remove(&state.id).await.unwrap();
        assert!(registry.get(&state.id).await.is_none());
    }
}
