//! C7: the index coordinator — the heart of the system. Owns the state machine that turns a
//! registered project into populated vector and graph stores, and keeps the two in sync as
//! files change. Grounded on `openai-codex`'s `indexing-coordinator.rs`: a per-project epoch
//! counter detects superseded jobs (a newer `start_indexing` call should win over a slow older
//! one rather than racing it to completion), and a `CancellationToken` makes `stop_indexing`
//! cooperative instead of forceful.
//!
//! Consistency between the vector and graph stores is maintained by compensating delete, not
//! two-phase commit: if the graph half of a file's update fails after its vector half
//! succeeded, the coordinator deletes the vector points it just wrote and reports that file as
//! failed, rather than leaving the stores disagreeing about whether the file is indexed.

use crate::health::{append_failure_reason, write_health_snapshot};
use crate::ignore_matcher::IgnoreMatcher;
use crate::registry::ProjectRegistry;
use crate::scanner::{FileScanner, DEFAULT_WALK_CHANNEL_CAPACITY};
use crate::stats::IndexStats;
use crate::{hash_store::HashStore, embedder_pool::EmbedderPool};
use dashmap::DashMap;
use indexcore_chunker::{Chunker, ChunkerConfig, CodeChunk};
use indexcore_graph::{GraphBuilder, GraphLanguage, GraphStore, SpaceConfig};
use indexcore_protocol::{
    content_hash, vector_point_id, FileRecord, FileState, IndexError, ProjectId, ProjectState,
    Result, SubsystemState, VectorPoint,
};
use indexcore_vector_store::adapter::{Distance, ScrollFilter, VectorStoreAdapter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn graph_language_for(path: &str) -> Option<GraphLanguage> {
    let ext = Path::new(path).extension()?.to_str()?;
    match ext {
        "rs" => Some(GraphLanguage::Rust),
        "py" => Some(GraphLanguage::Python),
        "js" | "jsx" | "mjs" => Some(GraphLanguage::JavaScript),
        "ts" | "tsx" => Some(GraphLanguage::TypeScript),
        _ => None,
    }
}

/// What subsystems a job should (re)populate. `start_indexing` does both; `index_vectors_only`
/// and `index_graph_only` narrow it to one so a caller can repair one store without touching
/// the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScope {
    Both,
    VectorsOnly,
    GraphOnly,
}

/// Per-project bookkeeping for in-flight jobs: the epoch a running job captured at start
/// (used to detect supersession), and the token that cancels it.
struct ProjectJob {
    epoch: AtomicI64,
    cancel: Mutex<CancellationToken>,
    /// Held for the duration of a running job. `try_lock_owned` at the `spawn_job` call site is
    /// what makes `AlreadyIndexing` detection race-free: two concurrent callers can't both
    /// observe "no job running" and both proceed.
    guard: Arc<Mutex<()>>,
}

impl ProjectJob {
    fn new() -> Self {
        Self {
            epoch: AtomicI64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
            guard: Arc::new(Mutex::new(())),
        }
    }
}

pub struct IndexCoordinator {
    registry: Arc<ProjectRegistry>,
    hash_store: Arc<HashStore>,
    embedder_pool: Arc<EmbedderPool>,
    vector_store: Arc<dyn VectorStoreAdapter>,
    graph_store: Arc<dyn GraphStore>,
    ignore_matchers: DashMap<ProjectId, Arc<IgnoreMatcher>>,
    jobs: DashMap<ProjectId, Arc<ProjectJob>>,
    embedding_dimension: usize,
    max_concurrent_projects: Arc<tokio::sync::Semaphore>,
}

impl IndexCoordinator {
    #[must_use]
    pub fn new(
        registry: Arc<ProjectRegistry>,
        hash_store: Arc<HashStore>,
        embedder_pool: Arc<EmbedderPool>,
        vector_store: Arc<dyn VectorStoreAdapter>,
        graph_store: Arc<dyn GraphStore>,
        embedding_dimension: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            hash_store,
            embedder_pool,
            vector_store,
            graph_store,
            ignore_matchers: DashMap::new(),
            jobs: DashMap::new(),
            embedding_dimension,
            max_concurrent_projects: Arc::new(tokio::sync::Semaphore::new(10)),
        })
    }

    fn job_for(&self, id: &ProjectId) -> Arc<ProjectJob> {
        self.jobs
            .entry(id.clone())
            .or_insert_with(|| Arc::new(ProjectJob::new()))
            .clone()
    }

    fn ignore_matcher_for(&self, id: &ProjectId, root: &Path) -> Arc<IgnoreMatcher> {
        self.ignore_matchers
            .entry(id.clone())
            .or_insert_with(|| IgnoreMatcher::new(root))
            .clone()
    }

    /// Registers `root` if needed and kicks off a full (vectors + graph) indexing pass in the
    /// background. Returns as soon as the project is registered; callers poll [`Self::status`]
    /// for progress.
    ///
    /// If a job is already running for this project, `allow_reindex` decides what happens:
    /// `false` returns [`IndexError::AlreadyIndexing`] immediately and leaves the running job
    /// alone; `true` cancels it and waits for it to yield before starting the new pass, so the
    /// newer call always wins without racing the older one to completion.
    pub async fn start_indexing(self: &Arc<Self>, root: &Path, allow_reindex: bool) -> Result<ProjectId> {
        let state = self.registry.register_or_get(root).await?;
        self.spawn_job(state.id.clone(), root.to_path_buf(), IndexScope::Both, allow_reindex)
            .await
    }

    pub async fn index_vectors_only(self: &Arc<Self>, id: &ProjectId, allow_reindex: bool) -> Result<()> {
        let path = self.registry.path_of(id).await?;
        self.spawn_job(id.clone(), path, IndexScope::VectorsOnly, allow_reindex).await?;
        Ok(())
    }

    pub async fn index_graph_only(self: &Arc<Self>, id: &ProjectId, allow_reindex: bool) -> Result<()> {
        let path = self.registry.path_of(id).await?;
        self.spawn_job(id.clone(), path, IndexScope::GraphOnly, allow_reindex).await?;
        Ok(())
    }

    async fn spawn_job(
        self: &Arc<Self>,
        id: ProjectId,
        root: PathBuf,
        scope: IndexScope,
        allow_reindex: bool,
    ) -> Result<ProjectId> {
        let job = self.job_for(&id);

        // Try to claim the guard synchronously. Success means no job is currently running;
        // failure means one is, and `allow_reindex` decides whether we wait for it to yield or
        // bail out with `AlreadyIndexing` right here before spawning anything.
        let owned_guard = match Arc::clone(&job.guard).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) if !allow_reindex => {
                return Err(IndexError::AlreadyIndexing { project_id: id.as_str().to_string() });
            }
            Err(_) => {
                job.cancel.lock().await.cancel();
                Arc::clone(&job.guard).lock_owned().await
            }
        };

        let epoch = job.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        *job.cancel.lock().await = cancel.clone();

        let coordinator = Arc::clone(self);
        let id_for_task = id.clone();
        tokio::spawn(async move {
            let _permit = coordinator.max_concurrent_projects.acquire().await;
            let _guard: OwnedMutexGuard<()> = owned_guard;
            if let Err(err) = coordinator
                .run_pipeline(&id_for_task, &root, scope, epoch, &cancel)
                .await
            {
                log::error!("indexing job for {id_for_task} failed: {err}");
                let _ = append_failure_reason(&root, "pipeline_error", &err.to_string(), None).await;
            }
        });

        Ok(id)
    }

    /// Cooperatively cancels the currently running job for `id`, if any. The job notices at
    /// its next per-file checkpoint; in-flight embedding/upsert calls for the current file are
    /// not interrupted mid-flight.
    pub async fn stop_indexing(&self, id: &ProjectId) -> Result<()> {
        if let Some(job) = self.jobs.get(id) {
            job.cancel.lock().await.cancel();
        }
        Ok(())
    }

    pub async fn status(&self, id: &ProjectId) -> Result<ProjectState> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| IndexError::NotFound { message: format!("unknown project: {id}") })
    }

    /// Drops both stores' data for the project and removes it from the registry. Irreversible.
    pub async fn remove_project(&self, id: &ProjectId) -> Result<()> {
        if let Some(job) = self.jobs.get(id) {
            job.cancel.lock().await.cancel();
        }
        let _ = self.vector_store.drop_collection(&id.collection_name()).await;
        let _ = self.graph_store.drop_space(&id.space_name()).await;
        self.ignore_matchers.remove(id);
        self.jobs.remove(id);
        self.registry.remove(id).await
    }

    /// Incremental entry point for the file watcher: reindexes exactly the given paths without
    /// re-walking the whole tree. Deleted paths should be included; their absence on disk is
    /// what triggers their removal from both stores.
    pub async fn on_file_change(self: &Arc<Self>, id: &ProjectId, changed_paths: Vec<PathBuf>) -> Result<()> {
        let root = self.registry.path_of(id).await?;
        let job = self.job_for(id);
        let epoch = job.epoch.load(Ordering::SeqCst);
        let cancel = job.cancel.lock().await.clone();
        let _guard = job.guard.lock().await;

        self.vector_store
            .ensure_collection(&id.collection_name(), self.embedding_dimension, Distance::Cosine)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        self.graph_store
            .ensure_space(&id.space_name(), SpaceConfig::default())
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;

        let mut stats = IndexStats::new();
        for path in changed_paths {
            if cancel.is_cancelled() {
                break;
            }
            let relative_path = path
                .strip_prefix(&root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            self.process_file(id, &root, &relative_path, IndexScope::Both, &mut stats)
                .await;
        }

        self.registry
            .update(id, |state| {
                state.last_indexed_at = Some(unix_now_ms());
                state.recompute_status();
            })
            .await?;
        let _ = write_health_snapshot(&root, &stats, "fs_event", None, None).await;
        Ok(())
    }

    /// The state machine: `idle -> enumerating -> processing -> (partial | completed | error)`.
    /// `ProjectState` is updated at each transition so `status()` reflects progress mid-run.
    async fn run_pipeline(
        self: &Arc<Self>,
        id: &ProjectId,
        root: &Path,
        scope: IndexScope,
        epoch: i64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if matches!(scope, IndexScope::Both | IndexScope::VectorsOnly) {
            self.embedder_pool.validate(None).await?;
        }

        self.vector_store
            .ensure_collection(&id.collection_name(), self.embedding_dimension, Distance::Cosine)
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;
        self.graph_store
            .ensure_space(&id.space_name(), SpaceConfig::default())
            .await
            .map_err(|e| IndexError::Fatal { message: e.to_string() })?;

        self.registry
            .update(id, |state| {
                state.vector_status.state = SubsystemState::Indexing;
                state.graph_status.state = SubsystemState::Indexing;
            })
            .await?;

        // Enumerating: stream the tree through a bounded channel rather than collecting it all
        // upfront, diffing against the hash store so unchanged files are never re-embedded or
        // re-parsed.
        let matcher = self.ignore_matcher_for(id, root);
        let mut walk_rx = FileScanner::new(root).spawn_walk(DEFAULT_WALK_CHANNEL_CAPACITY);

        let mut current_hashes = HashMap::new();
        while let Some(path) = walk_rx.recv().await {
            let relative_path = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().into_owned();
            if matcher.is_ignored(&relative_path, false).await {
                continue;
            }
            if let Ok(bytes) = tokio::fs::read(&path).await {
                current_hashes.insert(relative_path, content_hash(&bytes));
            }
        }

        let diff = self.hash_store.diff(id, &current_hashes).await;
        self.registry
            .update(id, |state| {
                state.total_files = (diff.added.len() + diff.modified.len()) as u64;
            })
            .await?;

        if diff.is_empty() {
            self.registry
                .update(id, |state| {
                    state.vector_status.state = SubsystemState::Completed;
                    state.graph_status.state = SubsystemState::Completed;
                    state.last_indexed_at = Some(unix_now_ms());
                    state.recompute_status();
                })
                .await?;
            return Ok(());
        }

        // Processing: embed/parse every added or modified file, then retire files that
        // disappeared from disk.
        let mut stats = IndexStats::new();
        let mut superseded = false;
        for relative_path in diff.added.iter().chain(diff.modified.iter()) {
            if cancel.is_cancelled() {
                break;
            }
            if self.job_for(id).epoch.load(Ordering::SeqCst) != epoch {
                superseded = true;
                break;
            }
            self.process_file(id, root, relative_path, scope, &mut stats).await;
            let processed = stats.files as u64;
            self.registry
                .update(id, |state| {
                    state.indexed_files = processed;
                    state.recompute_status();
                })
                .await?;
        }

        for relative_path in &diff.removed {
            self.retract_file(id, relative_path, scope).await;
            self.hash_store.delete(id, relative_path).await?;
        }

        if superseded {
            log::info!("indexing job for {id} superseded by a newer start_indexing call");
            return Ok(());
        }

        let final_state = if cancel.is_cancelled() {
            SubsystemState::Partial
        } else if stats.error_count() > 0 {
            SubsystemState::Partial
        } else {
            SubsystemState::Completed
        };

        self.registry
            .update(id, |state| {
                state.vector_status.state = final_state;
                state.graph_status.state = final_state;
                state.failed_files = stats.error_count() as u64;
                state.last_indexed_at = Some(unix_now_ms());
                state.recompute_status();
            })
            .await?;
        let _ = write_health_snapshot(root, &stats, "indexing_pass", None, None).await;
        Ok(())
    }

    /// Chunks, embeds, and upserts one file into the scoped subsystems. Failures are recorded
    /// on `stats` rather than aborting the whole pass — one bad file shouldn't block the rest.
    async fn process_file(
        &self,
        id: &ProjectId,
        root: &Path,
        relative_path: &str,
        scope: IndexScope,
        stats: &mut IndexStats,
    ) {
        let full_path = root.join(relative_path);
        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => {
                stats.add_error(format!("{relative_path}: read failed: {e}"));
                return;
            }
        };

        let chunker = Chunker::new(ChunkerConfig::for_embeddings());
        let chunks = match chunker.chunk_str(&content, Some(relative_path)) {
            Ok(c) => c,
            Err(e) => {
                stats.add_error(format!("{relative_path}: chunking failed: {e}"));
                return;
            }
        };

        let file_hash = content_hash(content.as_bytes());
        let language = chunks
            .first()
            .and_then(|c| c.metadata.language.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let vector_ok = if matches!(scope, IndexScope::Both | IndexScope::VectorsOnly) {
            self.upsert_vectors(id, relative_path, &file_hash, &chunks).await
        } else {
            true
        };

        let graph_ok = if matches!(scope, IndexScope::Both | IndexScope::GraphOnly) {
            self.upsert_graph(id, &chunks).await
        } else {
            true
        };

        if vector_ok && !graph_ok && matches!(scope, IndexScope::Both) {
            // Compensating delete: don't leave the vector store ahead of the graph store for
            // this file.
            let _ = self
                .vector_store
                .delete_by_filter(&id.collection_name(), ScrollFilter::for_file(id.as_str(), relative_path))
                .await;
            stats.add_error(format!("{relative_path}: graph upsert failed, vector write rolled back"));
            return;
        }

        if !vector_ok {
            stats.add_error(format!("{relative_path}: vector upsert failed"));
            return;
        }

        stats.add_file(&language, content.lines().count());
        stats.add_chunks(chunks.len());

        let record = FileRecord {
            project_id: id.clone(),
            relative_path: relative_path.to_string(),
            content_hash: file_hash,
            size: content.len() as u64,
            mtime: unix_now_ms(),
            language: Some(language),
            last_indexed: Some(unix_now_ms()),
            state: FileState::Indexed,
        };
        if let Err(e) = self.hash_store.put(record).await {
            stats.add_error(format!("{relative_path}: failed to record hash: {e}"));
        }
    }

    async fn upsert_vectors(&self, id: &ProjectId, relative_path: &str, file_hash: &str, chunks: &[CodeChunk]) -> bool {
        if chunks.is_empty() {
            return true;
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = match self.embedder_pool.embed(None, &texts).await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("embedding failed for {relative_path}: {e}");
                return false;
            }
        };

        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(vectors.into_iter())
            .enumerate()
            .map(|(idx, (chunk, vector))| VectorPoint {
                id: vector_point_id(id, relative_path, idx, file_hash),
                vector,
                payload: serde_json::json!({
                    "projectId": id.as_str(),
                    "relativePath": relative_path,
                    "chunkIndex": idx,
                    "startLine": chunk.start_line,
                    "endLine": chunk.end_line,
                    "symbolName": chunk.metadata.symbol_name,
                }),
            })
            .collect();

        match self.vector_store.upsert_batch(&id.collection_name(), points).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("vector upsert failed for {relative_path}: {e}");
                false
            }
        }
    }

    async fn upsert_graph(&self, id: &ProjectId, chunks: &[CodeChunk]) -> bool {
        let Some(first) = chunks.first() else { return true };
        let Some(language) = graph_language_for(&first.file_path) else {
            // No grammar for this language; graph coverage is best-effort, not a failure.
            return true;
        };
        let mut builder = match GraphBuilder::new(language) {
            Ok(b) => b,
            Err(_) => return true,
        };
        let graph = match builder.build(chunks) {
            Ok(g) => g,
            Err(e) => {
                log::warn!("graph build failed for {}: {e}", first.file_path);
                return false;
            }
        };

        let nodes: Vec<indexcore_protocol::GraphNode> = graph
            .nodes()
            .map(|(idx, node)| indexcore_protocol::GraphNode {
                id: format!("{}:{}", id.as_str(), node.chunk_id),
                label: node.symbol.name.clone(),
                properties: serde_json::json!({
                    "projectId": id.as_str(),
                    "nodeIndex": idx.index(),
                    "filePath": node.symbol.file_path,
                    "startLine": node.symbol.start_line,
                    "endLine": node.symbol.end_line,
                    "qualifiedName": node.symbol.qualified_name,
                }),
            })
            .collect();

        let edges: Vec<indexcore_protocol::GraphEdge> = graph
            .edges()
            .filter_map(|(source, target, edge)| {
                let source_node = graph.get_node(source)?;
                let target_node = graph.get_node(target)?;
                Some(indexcore_protocol::GraphEdge {
                    id: format!(
                        "{}:{}:{}:{}",
                        id.as_str(),
                        source_node.chunk_id,
                        target_node.chunk_id,
                        source.index()
                    ),
                    source: format!("{}:{}", id.as_str(), source_node.chunk_id),
                    target: format!("{}:{}", id.as_str(), target_node.chunk_id),
                    label: format!("{:?}", edge.relationship),
                    properties: serde_json::json!({
                        "weight": edge.weight,
                        "projectId": id.as_str(),
                        "filePath": first.file_path,
                    }),
                })
            })
            .collect();

        let nodes_ok = self.graph_store.upsert_nodes(&id.space_name(), nodes).await.is_ok();
        let edges_ok = self.graph_store.upsert_edges(&id.space_name(), edges).await.is_ok();
        nodes_ok && edges_ok
    }

    async fn retract_file(&self, id: &ProjectId, relative_path: &str, scope: IndexScope) {
        if matches!(scope, IndexScope::Both | IndexScope::VectorsOnly) {
            let _ = self
                .vector_store
                .delete_by_filter(&id.collection_name(), ScrollFilter::for_file(id.as_str(), relative_path))
                .await;
        }
        if matches!(scope, IndexScope::Both | IndexScope::GraphOnly) {
            let _ = self
                .graph_store
                .delete_by_file(&id.space_name(), id.as_str(), relative_path)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder_pool::{EmbedderBackend, EmbedderPool};
    use async_trait::async_trait;
    use indexcore_graph::LocalGraphStore;
    use indexcore_protocol::EmbedderProvider;
    use indexcore_vector_store::adapter::LocalVectorStoreAdapter;
    use std::fs;

    struct FakeEmbedder;

    #[async_trait]
    impl EmbedderBackend for FakeEmbedder {
        fn info(&self) -> EmbedderProvider {
            EmbedderProvider {
                name: "fake".to_string(),
                available: true,
                model: "fake".to_string(),
                dimensions: 4,
                max_batch_size: 64,
                requires_api_key: false,
            }
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3, 0.4]).collect())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    async fn build_coordinator() -> Arc<IndexCoordinator> {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::load(dir.path().join("registry")).await.unwrap();
        let hash_store = HashStore::load(dir.path().join("hashes")).await.unwrap();
        let embedder_pool = Arc::new(EmbedderPool::new());
        embedder_pool.register("fake", Arc::new(FakeEmbedder)).await;
        let vector_store = LocalVectorStoreAdapter::new();
        let graph_store = LocalGraphStore::new();
        IndexCoordinator::new(registry, hash_store, embedder_pool, vector_store, graph_store, 4)
    }

    #[tokio::test]
    async fn start_indexing_populates_both_stores() {
        let coordinator = build_coordinator().await;
        let project_dir = tempfile::tempdir().unwrap();
        fs::write(project_dir.path().join("main.rs"), "fn main() {\n    println!(\"hi\");\n}\n").unwrap();

        let id = coordinator.start_indexing(project_dir.path(), false).await.unwrap();

        let mut state = coordinator.status(&id).await.unwrap();
        for _ in 0..50 {
            if !matches!(state.vector_status.state, SubsystemState::Indexing) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            state = coordinator.status(&id).await.unwrap();
        }

        assert!(matches!(
            state.vector_status.state,
            SubsystemState::Completed | SubsystemState::Partial
        ));
        let info = coordinator
            .vector_store
            .collection_info(&id.collection_name())
            .await
            .unwrap();
        assert!(info.point_count > 0);
    }

    #[tokio::test]
    async fn remove_project_drops_both_stores() {
        let coordinator = build_coordinator().await;
        let project_dir = tempfile::tempdir().unwrap();
        fs::write(project_dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let id = coordinator.start_indexing(project_dir.path(), false).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        coordinator.remove_project(&id).await.unwrap();
        assert!(coordinator.status(&id).await.is_err());
        assert!(coordinator
            .vector_store
            .collection_info(&id.collection_name())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unchanged_tree_is_a_no_op_second_pass() {
        let coordinator = build_coordinator().await;
        let project_dir = tempfile::tempdir().unwrap();
        fs::write(project_dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let id = coordinator.start_indexing(project_dir.path(), false).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        let before = coordinator
            .vector_store
            .collection_info(&id.collection_name())
            .await
            .unwrap()
            .point_count;

        coordinator.start_indexing(project_dir.path(), false).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        let after = coordinator
            .vector_store
            .collection_info(&id.collection_name())
            .await
            .unwrap()
            .point_count;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn concurrent_start_without_allow_reindex_is_rejected() {
        let coordinator = build_coordinator().await;
        let project_dir = tempfile::tempdir().unwrap();
        fs::write(project_dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let id = coordinator.start_indexing(project_dir.path(), false).await.unwrap();
        let err = coordinator
            .start_indexing(project_dir.path(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::AlreadyIndexing { .. }));

        // The original job is left alone and still completes.
        let mut state = coordinator.status(&id).await.unwrap();
        for _ in 0..50 {
            if !matches!(state.vector_status.state, SubsystemState::Indexing) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            state = coordinator.status(&id).await.unwrap();
        }
        assert!(matches!(
            state.vector_status.state,
            SubsystemState::Completed | SubsystemState::Partial
        ));
    }

    #[tokio::test]
    async fn concurrent_start_with_allow_reindex_supersedes_the_running_job() {
        let coordinator = build_coordinator().await;
        let project_dir = tempfile::tempdir().unwrap();
        fs::write(project_dir.path().join("main.rs"), "fn main() {}\n").unwrap();

        let id = coordinator.start_indexing(project_dir.path(), false).await.unwrap();
        let id2 = coordinator.start_indexing(project_dir.path(), true).await.unwrap();
        assert_eq!(id, id2);

        let mut state = coordinator.status(&id).await.unwrap();
        for _ in 0..50 {
            if !matches!(state.vector_status.state, SubsystemState::Indexing) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            state = coordinator.status(&id).await.unwrap();
        }
        assert!(matches!(
            state.vector_status.state,
            SubsystemState::Completed | SubsystemState::Partial
        ));
    }
}
