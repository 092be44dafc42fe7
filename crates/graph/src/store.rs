//! The durable `GraphStore` backend adapter (spec §4.6), distinct from [`crate::CodeGraph`]
//! which is the in-process extractor that turns chunks into nodes/edges.
//!
//! The default backend is local and in-memory, backing every project's space with its own
//! [`indexcore_graph::CodeGraph`]-shaped node/edge table behind a `DashMap`. Real deployments
//! swap in a remote graph database by implementing [`GraphStore`] against the same contract;
//! the polling-readiness and session-reaping machinery here is written so that swap doesn't
//! change coordinator code.

use async_trait::async_trait;
use dashmap::DashMap;
use indexcore_protocol::{GraphEdge, GraphNode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum GraphStoreError {
    #[error("invalid space name {0:?}: must match [A-Za-z0-9_]+")]
    InvalidSpaceName(String),

    #[error("space not found: {0}")]
    SpaceNotFound(String),

    #[error("space creation did not become ready within the retry budget: {0}")]
    SpaceNotReady(String),

    #[error("query failed: {0}")]
    QueryFailed(String),
}

pub type Result<T> = std::result::Result<T, GraphStoreError>;

fn validate_space_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GraphStoreError::InvalidSpaceName(name.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpaceConfig {
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SpaceInfo {
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub ready: bool,
}

/// Readiness-poll tuning for `ensure_space`. Defaults match spec §4.6 (30 retries, 1s apart).
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

/// A held session against a space. Sign-out happens explicitly via [`GraphSession::close`]
/// or implicitly when the background reaper notices the session outlived its lease.
pub struct GraphSession {
    id: u64,
    space: String,
    registry: Arc<DashMap<u64, SessionRecord>>,
}

struct SessionRecord {
    #[allow(dead_code)]
    space: String,
    last_touched: Instant,
}

impl GraphSession {
    #[must_use]
    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn close(self) {
        self.registry.remove(&self.id);
    }
}

impl Drop for GraphSession {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

struct Space {
    nodes: RwLock<std::collections::HashMap<String, GraphNode>>,
    edges: RwLock<std::collections::HashMap<String, GraphEdge>>,
}

impl Space {
    fn new() -> Self {
        Self {
            nodes: RwLock::new(std::collections::HashMap::new()),
            edges: RwLock::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn ensure_space(&self, name: &str, config: SpaceConfig) -> Result<()>;
    async fn drop_space(&self, name: &str) -> Result<()>;
    async fn use_space(&self, name: &str) -> Result<GraphSession>;
    async fn upsert_nodes(&self, name: &str, nodes: Vec<GraphNode>) -> Result<()>;
    async fn upsert_edges(&self, name: &str, edges: Vec<GraphEdge>) -> Result<()>;
    async fn delete_by_project(&self, name: &str, project_id: &str) -> Result<()>;
    /// Deletes only the nodes/edges belonging to one file within a project, leaving the rest
    /// of the project's graph untouched. Matches on the `filePath` property nodes/edges carry
    /// alongside `projectId`.
    async fn delete_by_file(&self, name: &str, project_id: &str, relative_path: &str) -> Result<()>;
    async fn query(&self, name: &str, expression: &str) -> Result<serde_json::Value>;
    async fn space_info(&self, name: &str) -> Result<SpaceInfo>;
}

/// Local in-memory `GraphStore`. Space creation is synchronous here but still exercises the
/// readiness-poll loop so a remote implementation can be substituted without coordinator changes.
pub struct LocalGraphStore {
    spaces: DashMap<String, Arc<Space>>,
    sessions: Arc<DashMap<u64, SessionRecord>>,
    next_session_id: AtomicU64,
    readiness: ReadinessPolicy,
    reap_interval: Duration,
}

impl LocalGraphStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_policy(ReadinessPolicy::default(), Duration::from_secs(30))
    }

    #[must_use]
    pub fn with_policy(readiness: ReadinessPolicy, reap_interval: Duration) -> Arc<Self> {
        let store = Arc::new(Self {
            spaces: DashMap::new(),
            sessions: Arc::new(DashMap::new()),
            next_session_id: AtomicU64::new(1),
            readiness,
            reap_interval,
        });
        store.clone().spawn_zombie_reaper();
        store
    }

    /// Background monitor that reaps sessions nobody has touched recently. Mirrors a
    /// session-per-query model where forgotten sessions must eventually be cleaned up even if
    /// the caller never calls `close()` explicitly (crash, panic, leaked handle).
    fn spawn_zombie_reaper(self: Arc<Self>) {
        let sessions = self.sessions.clone();
        let interval = self.reap_interval;
        tokio::spawn(async move {
            loop {
                sleep(interval).await;
                let cutoff = Instant::now() - interval * 3;
                sessions.retain(|_, record| record.last_touched > cutoff);
            }
        });
    }

    async fn is_ready(&self, name: &str) -> bool {
        self.spaces.contains_key(name)
    }
}

impl Default for LocalGraphStore {
    fn default() -> Self {
        panic!("use LocalGraphStore::new() to get the Arc-wrapped, reaper-backed store");
    }
}

#[async_trait]
impl GraphStore for LocalGraphStore {
    async fn ensure_space(&self, name: &str, _config: SpaceConfig) -> Result<()> {
        validate_space_name(name)?;
        self.spaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Space::new()));

        for _ in 0..self.readiness.max_attempts {
            if self.is_ready(name).await {
                return Ok(());
            }
            sleep(self.readiness.interval).await;
        }
        Err(GraphStoreError::SpaceNotReady(name.to_string()))
    }

    async fn drop_space(&self, name: &str) -> Result<()> {
        validate_space_name(name)?;
        self.spaces.remove(name);
        Ok(())
    }

    async fn use_space(&self, name: &str) -> Result<GraphSession> {
        validate_space_name(name)?;
        if !self.spaces.contains_key(name) {
            return Err(GraphStoreError::SpaceNotFound(name.to_string()));
        }
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        self.sessions.insert(
            id,
            SessionRecord {
                space: name.to_string(),
                last_touched: Instant::now(),
            },
        );
        Ok(GraphSession {
            id,
            space: name.to_string(),
            registry: self.sessions.clone(),
        })
    }

    async fn upsert_nodes(&self, name: &str, nodes: Vec<GraphNode>) -> Result<()> {
        let space = self
            .spaces
            .get(name)
            .ok_or_else(|| GraphStoreError::SpaceNotFound(name.to_string()))?
            .clone();
        let mut table = space.nodes.write().await;
        for node in nodes {
            table.insert(node.id.clone(), node);
        }
        Ok(())
    }

    async fn upsert_edges(&self, name: &str, edges: Vec<GraphEdge>) -> Result<()> {
        let space = self
            .spaces
            .get(name)
            .ok_or_else(|| GraphStoreError::SpaceNotFound(name.to_string()))?
            .clone();
        let mut table = space.edges.write().await;
        for edge in edges {
            table.insert(edge.id.clone(), edge);
        }
        Ok(())
    }

    async fn delete_by_project(&self, name: &str, project_id: &str) -> Result<()> {
        let space = self
            .spaces
            .get(name)
            .ok_or_else(|| GraphStoreError::SpaceNotFound(name.to_string()))?
            .clone();
        let mut nodes = space.nodes.write().await;
        nodes.retain(|_, n| {
            n.properties
                .get("projectId")
                .and_then(|v| v.as_str())
                != Some(project_id)
        });
        let mut edges = space.edges.write().await;
        edges.retain(|_, e| {
            e.properties
                .get("projectId")
                .and_then(|v| v.as_str())
                != Some(project_id)
        });
        Ok(())
    }

    async fn delete_by_file(&self, name: &str, project_id: &str, relative_path: &str) -> Result<()> {
        let space = self
            .spaces
            .get(name)
            .ok_or_else(|| GraphStoreError::SpaceNotFound(name.to_string()))?
            .clone();
        let belongs_to_file = |properties: &serde_json::Value| -> bool {
            properties.get("projectId").and_then(|v| v.as_str()) == Some(project_id)
                && properties.get("filePath").and_then(|v| v.as_str()) == Some(relative_path)
        };
        let mut nodes = space.nodes.write().await;
        nodes.retain(|_, n| !belongs_to_file(&n.properties));
        let mut edges = space.edges.write().await;
        edges.retain(|_, e| !belongs_to_file(&e.properties));
        Ok(())
    }

    async fn query(&self, name: &str, expression: &str) -> Result<serde_json::Value> {
        let space = self
            .spaces
            .get(name)
            .ok_or_else(|| GraphStoreError::SpaceNotFound(name.to_string()))?
            .clone();
        // The local backend supports a minimal expression language: "nodes" / "edges" dumps
        // the whole space. Anything else is a caller error surfaced, not a crash, since a real
        // backend would reject unsupported query syntax the same way.
        match expression {
            "nodes" => {
                let nodes = space.nodes.read().await;
                Ok(serde_json::to_value(nodes.values().collect::<Vec<_>>())
                    .map_err(|e| GraphStoreError::QueryFailed(e.to_string()))?)
            }
            "edges" => {
                let edges = space.edges.read().await;
                Ok(serde_json::to_value(edges.values().collect::<Vec<_>>())
                    .map_err(|e| GraphStoreError::QueryFailed(e.to_string()))?)
            }
            other => Err(GraphStoreError::QueryFailed(format!(
                "unsupported query expression: {other}"
            ))),
        }
    }

    async fn space_info(&self, name: &str) -> Result<SpaceInfo> {
        let space = self
            .spaces
            .get(name)
            .ok_or_else(|| GraphStoreError::SpaceNotFound(name.to_string()))?
            .clone();
        let node_count = space.nodes.read().await.len();
        let edge_count = space.edges.read().await.len();
        Ok(SpaceInfo {
            name: name.to_string(),
            node_count,
            edge_count,
            ready: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, project_id: &str) -> GraphNode {
        node_in_file(id, project_id, "a.rs")
    }

    fn node_in_file(id: &str, project_id: &str, file_path: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            label: "Function".to_string(),
            properties: json!({ "projectId": project_id, "filePath": file_path }),
        }
    }

    #[tokio::test]
    async fn rejects_invalid_space_names() {
        let store = LocalGraphStore::new();
        let err = store
            .ensure_space("bad name!", SpaceConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphStoreError::InvalidSpaceName(_)));
    }

    #[tokio::test]
    async fn upsert_and_delete_by_project_is_scoped() {
        let store = LocalGraphStore::new();
        store
            .ensure_space("project_abc", SpaceConfig::default())
            .await
            .unwrap();
        store
            .upsert_nodes(
                "project_abc",
                vec![node("n1", "abc"), node("n2", "other")],
            )
            .await
            .unwrap();

        let info = store.space_info("project_abc").await.unwrap();
        assert_eq!(info.node_count, 2);

        store.delete_by_project("project_abc", "abc").await.unwrap();
        let info = store.space_info("project_abc").await.unwrap();
        assert_eq!(info.node_count, 1);
    }

    #[tokio::test]
    async fn delete_by_file_leaves_other_files_in_the_project_untouched() {
        let store = LocalGraphStore::new();
        store
            .ensure_space("project_abc", SpaceConfig::default())
            .await
            .unwrap();
        store
            .upsert_nodes(
                "project_abc",
                vec![
                    node_in_file("n1", "abc", "x.py"),
                    node_in_file("n2", "abc", "y.py"),
                    node_in_file("n3", "abc", "z.py"),
                ],
            )
            .await
            .unwrap();

        store.delete_by_file("project_abc", "abc", "z.py").await.unwrap();
        let info = store.space_info("project_abc").await.unwrap();
        assert_eq!(info.node_count, 2);
    }

    #[tokio::test]
    async fn use_space_requires_existing_space() {
        let store = LocalGraphStore::new();
        assert!(store.use_space("nope").await.is_err());
        store
            .ensure_space("project_x", SpaceConfig::default())
            .await
            .unwrap();
        let session = store.use_space("project_x").await.unwrap();
        assert_eq!(session.space(), "project_x");
        session.close();
    }
}
