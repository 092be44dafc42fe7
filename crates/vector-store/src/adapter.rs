//! The durable `VectorStore` backend adapter (spec §4.6), distinct from [`crate::VectorStore`]
//! which is the per-project/per-model embedding index used by search. This trait is the
//! coordinator-facing capability: collections keyed by name, points addressed by id, filtered
//! deletes and scrolls. The default backend is local and in-memory, mirroring how
//! `indexcore_graph::LocalGraphStore` backs `GraphStore`.

use async_trait::async_trait;
use dashmap::DashMap;
use indexcore_protocol::VectorPoint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum VectorAdapterError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("dimension mismatch in collection {collection}: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("query failed: {0}")]
    QueryFailed(String),
}

pub type Result<T> = std::result::Result<T, VectorAdapterError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Dot,
    Euclidean,
}

#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
    pub point_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollFilter {
    pub project_id: Option<String>,
    /// Narrows the filter to one file within the project. Leaving this `None` matches every
    /// file in `project_id` — callers that mean to touch a single file must set it, since a
    /// project-wide delete will wipe every other file's points too.
    pub relative_path: Option<String>,
}

impl ScrollFilter {
    #[must_use]
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            relative_path: None,
        }
    }

    #[must_use]
    pub fn for_file(project_id: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            relative_path: Some(relative_path.into()),
        }
    }

    fn matches(&self, point: &VectorPoint) -> bool {
        if let Some(id) = &self.project_id {
            if point.payload.get("projectId").and_then(|v| v.as_str()) != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(path) = &self.relative_path {
            if point.payload.get("relativePath").and_then(|v| v.as_str()) != Some(path.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub points: Vec<VectorPoint>,
    pub next_offset: Option<usize>,
}

#[async_trait]
pub trait VectorStoreAdapter: Send + Sync {
    async fn ensure_collection(&self, name: &str, dimension: usize, distance: Distance) -> Result<()>;
    async fn drop_collection(&self, name: &str) -> Result<()>;
    async fn upsert_batch(&self, name: &str, points: Vec<VectorPoint>) -> Result<()>;
    async fn delete_by_filter(&self, name: &str, filter: ScrollFilter) -> Result<usize>;
    async fn scroll(&self, name: &str, filter: ScrollFilter, limit: usize, offset: usize) -> Result<ScrollPage>;
    async fn collection_info(&self, name: &str) -> Result<CollectionInfo>;
}

struct Collection {
    dimension: usize,
    distance: Distance,
    points: RwLock<Vec<VectorPoint>>,
}

/// Local in-memory `VectorStoreAdapter`. One collection per project (spec §4.1's
/// `collectionOf(id)`), points kept as a flat `Vec` since the local backend has no index
/// structure to delegate similarity search to — search itself happens through [`crate::VectorStore`].
pub struct LocalVectorStoreAdapter {
    collections: DashMap<String, Arc<Collection>>,
}

impl LocalVectorStoreAdapter {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            collections: DashMap::new(),
        })
    }
}

impl Default for LocalVectorStoreAdapter {
    fn default() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }
}

#[async_trait]
impl VectorStoreAdapter for LocalVectorStoreAdapter {
    async fn ensure_collection(&self, name: &str, dimension: usize, distance: Distance) -> Result<()> {
        self.collections.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Collection {
                dimension,
                distance,
                points: RwLock::new(Vec::new()),
            })
        });
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.collections.remove(name);
        Ok(())
    }

    async fn upsert_batch(&self, name: &str, points: Vec<VectorPoint>) -> Result<()> {
        let collection = self
            .collections
            .get(name)
            .ok_or_else(|| VectorAdapterError::CollectionNotFound(name.to_string()))?
            .clone();

        for point in &points {
            if point.vector.len() != collection.dimension {
                return Err(VectorAdapterError::DimensionMismatch {
                    collection: name.to_string(),
                    expected: collection.dimension,
                    actual: point.vector.len(),
                });
            }
        }

        let mut table = collection.points.write().await;
        for point in points {
            if let Some(existing) = table.iter_mut().find(|p| p.id == point.id) {
                *existing = point;
            } else {
                table.push(point);
            }
        }
        Ok(())
    }

    async fn delete_by_filter(&self, name: &str, filter: ScrollFilter) -> Result<usize> {
        let collection = self
            .collections
            .get(name)
            .ok_or_else(|| VectorAdapterError::CollectionNotFound(name.to_string()))?
            .clone();
        let mut table = collection.points.write().await;
        let before = table.len();
        table.retain(|p| !filter.matches(p));
        Ok(before - table.len())
    }

    async fn scroll(&self, name: &str, filter: ScrollFilter, limit: usize, offset: usize) -> Result<ScrollPage> {
        let collection = self
            .collections
            .get(name)
            .ok_or_else(|| VectorAdapterError::CollectionNotFound(name.to_string()))?
            .clone();
        let table = collection.points.read().await;
        let matching: Vec<VectorPoint> = table.iter().filter(|p| filter.matches(p)).cloned().collect();
        let page: Vec<VectorPoint> = matching.iter().skip(offset).take(limit).cloned().collect();
        let next_offset = if offset + page.len() < matching.len() {
            Some(offset + page.len())
        } else {
            None
        };
        Ok(ScrollPage {
            points: page,
            next_offset,
        })
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let collection = self
            .collections
            .get(name)
            .ok_or_else(|| VectorAdapterError::CollectionNotFound(name.to_string()))?
            .clone();
        let point_count = collection.points.read().await.len();
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension: collection.dimension,
            distance: collection.distance,
            point_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: &str, project_id: &str) -> VectorPoint {
        point_in_file(id, project_id, "a.rs")
    }

    fn point_in_file(id: &str, project_id: &str, relative_path: &str) -> VectorPoint {
        VectorPoint {
            id: id.to_string(),
            vector: vec![0.1, 0.2],
            payload: json!({ "projectId": project_id, "relativePath": relative_path }),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let store = LocalVectorStoreAdapter::new();
        store.ensure_collection("c1", 2, Distance::Cosine).await.unwrap();
        store.upsert_batch("c1", vec![point("p1", "proj-a")]).await.unwrap();
        store.upsert_batch("c1", vec![point("p1", "proj-a")]).await.unwrap();

        let info = store.collection_info("c1").await.unwrap();
        assert_eq!(info.point_count, 1);
    }

    #[tokio::test]
    async fn delete_by_filter_is_project_scoped() {
        let store = LocalVectorStoreAdapter::new();
        store.ensure_collection("c1", 2, Distance::Cosine).await.unwrap();
        store
            .upsert_batch("c1", vec![point("p1", "proj-a"), point("p2", "proj-b")])
            .await
            .unwrap();

        let removed = store
            .delete_by_filter("c1", ScrollFilter::for_project("proj-a"))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let info = store.collection_info("c1").await.unwrap();
        assert_eq!(info.point_count, 1);
    }

    #[tokio::test]
    async fn delete_by_filter_can_be_scoped_to_one_file() {
        let store = LocalVectorStoreAdapter::new();
        store.ensure_collection("c1", 2, Distance::Cosine).await.unwrap();
        store
            .upsert_batch(
                "c1",
                vec![
                    point_in_file("p1", "proj-a", "x.py"),
                    point_in_file("p2", "proj-a", "y.py"),
                    point_in_file("p3", "proj-a", "z.py"),
                ],
            )
            .await
            .unwrap();

        let removed = store
            .delete_by_filter("c1", ScrollFilter::for_file("proj-a", "z.py"))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let info = store.collection_info("c1").await.unwrap();
        assert_eq!(info.point_count, 2);
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let store = LocalVectorStoreAdapter::new();
        store.ensure_collection("c1", 4, Distance::Cosine).await.unwrap();
        let err = store
            .upsert_batch("c1", vec![point("p1", "proj-a")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorAdapterError::DimensionMismatch { .. }));
    }
}
