//! C2: the content-hash ledger. Tracks the last-known [`FileRecord`] per `(project, relative
//! path)` so the coordinator can diff a fresh directory walk against what's already indexed and
//! only touch files whose content actually changed. Same atomic snapshot-persistence idiom as
//! [`crate::registry::ProjectRegistry`].

use indexcore_protocol::{FileRecord, IndexError, ProjectId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const HASH_STORE_FILE_NAME: &str = "hashes.json";

type Key = (String, String);

fn key(project_id: &ProjectId, relative_path: &str) -> Key {
    (project_id.as_str().to_string(), relative_path.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedHashStore {
    #[serde(default)]
    records: Vec<FileRecord>,
}

/// What changed between a [`HashStore`] snapshot and a fresh directory listing.
#[derive(Debug, Clone, Default)]
pub struct HashDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl HashDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

pub struct HashStore {
    storage_dir: PathBuf,
    records: RwLock<HashMap<Key, FileRecord>>,
}

impl HashStore {
    fn store_path(storage_dir: &Path) -> PathBuf {
        storage_dir.join(HASH_STORE_FILE_NAME)
    }

    pub async fn load(storage_dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let storage_dir = storage_dir.into();
        let path = Self::store_path(&storage_dir);
        let records = if path.exists() {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
            let persisted: PersistedHashStore = serde_json::from_slice(&bytes)
                .map_err(|e| IndexError::Fatal { message: format!("corrupt hash store: {e}") })?;
            persisted
                .records
                .into_iter()
                .map(|r| (key(&r.project_id, &r.relative_path), r))
                .collect()
        } else {
            HashMap::new()
        };

        Ok(Arc::new(Self {
            storage_dir,
            records: RwLock::new(records),
        }))
    }

    async fn persist(&self, records: &HashMap<Key, FileRecord>) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        let persisted = PersistedHashStore {
            records: records.values().cloned().collect(),
        };
        // Serialize before touching disk: a serialization failure must never truncate the
        // existing snapshot.
        let bytes = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        let path = Self::store_path(&self.storage_dir);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        Ok(())
    }

    pub async fn get(&self, project_id: &ProjectId, relative_path: &str) -> Option<FileRecord> {
        self.records
            .read()
            .await
            .get(&key(project_id, relative_path))
            .cloned()
    }

    pub async fn put(&self, record: FileRecord) -> Result<()> {
        let mut guard = self.records.write().await;
        guard.insert(key(&record.project_id, &record.relative_path), record);
        self.persist(&guard).await
    }

    pub async fn batch_put(&self, records: Vec<FileRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut guard = self.records.write().await;
        for record in records {
            guard.insert(key(&record.project_id, &record.relative_path), record);
        }
        self.persist(&guard).await
    }

    pub async fn delete(&self, project_id: &ProjectId, relative_path: &str) -> Result<()> {
        let mut guard = self.records.write().await;
        guard.remove(&key(project_id, relative_path));
        self.persist(&guard).await
    }

    pub async fn list_since(&self, project_id: &ProjectId, since_unix_ms: i64) -> Vec<FileRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.project_id == *project_id && r.last_indexed.unwrap_or(0) >= since_unix_ms)
            .cloned()
            .collect()
    }

    pub async fn list_for_project(&self, project_id: &ProjectId) -> Vec<FileRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.project_id == *project_id)
            .cloned()
            .collect()
    }

    /// Diffs `current` (relative path -> content hash, from a fresh walk) against the stored
    /// snapshot for `project_id`. A path present in both with a differing hash is `modified`;
    /// present only in `current` is `added`; present only in the snapshot is `removed`.
    pub async fn diff(
        &self,
        project_id: &ProjectId,
        current: &HashMap<String, String>,
    ) -> HashDiff {
        let guard = self.records.read().await;
        let mut diff = HashDiff::default();

        for (path, hash) in current {
            match guard.get(&key(project_id, path)) {
                None => diff.added.push(path.clone()),
                Some(existing) if existing.content_hash != *hash => diff.modified.push(path.clone()),
                Some(_) => {}
            }
        }

        for existing_key in guard.keys() {
            if existing_key.0 != project_id.as_str() {
                continue;
            }
            if !current.contains_key(&existing_key.1) {
                diff.removed.push(existing_key.1.clone());
            }
        }

        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexcore_protocol::FileState;

    fn record(project_id: &ProjectId, path: &str, hash: &str) -> FileRecord {
        FileRecord {
            project_id: project_id.clone(),
            relative_path: path.to_string(),
            content_hash: hash.to_string(),
            size: 10,
            mtime: 0,
            language: Some("rust".to_string()),
            last_indexed: Some(1),
            state: FileState::Indexed,
        }
    }

    #[tokio::test]
    async fn diff_classifies_added_modified_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashStore::load(dir.path()).await.unwrap();
        let project_id = ProjectId::from_path(Path::new("/tmp/proj-diff"));

        store
            .batch_put(vec![
                record(&project_id, "a.rs", "hash-a"),
                record(&project_id, "b.rs", "hash-b"),
            ])
            .await
            .unwrap();

        let mut current = HashMap::new();
        current.insert("a.rs".to_string(), "hash-a".to_string());
        current.insert("b.rs".to_string(), "hash-b-changed".to_string());
        current.insert("c.rs".to_string(), "hash-c".to_string());

        let diff = store.diff(&project_id, &current).await;
        assert_eq!(diff.added, vec!["c.rs".to_string()]);
        assert_eq!(diff.modified, vec!["b.rs".to_string()]);
        assert!(diff.removed.is_empty());

        current.remove("a.rs");
        let diff = store.diff(&project_id, &current).await;
        assert_eq!(diff.removed, vec!["a.rs".to_string()]);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashStore::load(dir.path()).await.unwrap();
        let project_id = ProjectId::from_path(Path::new("/tmp/proj-put"));

        store.put(record(&project_id, "a.rs", "hash-a")).await.unwrap();
        let got = store.get(&project_id, "a.rs").await.unwrap();
        assert_eq!(got.content_hash, "hash-a");
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = HashStore::load(dir.path()).await.unwrap();
        let project_id = ProjectId::from_path(Path::new("/tmp/proj-del"));

        store.put(record(&project_id, "a.rs", "hash-a")).await.unwrap();
        store.delete(&project_id, "a.rs").await.unwrap();
        assert!(store.get(&project_id, "a.rs").await.is_none());
    }
}
