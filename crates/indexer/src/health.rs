use crate::stats::IndexStats;
use crate::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const HEALTH_FILE_NAME: &str = "health.json";

/// Persisted twin of `IndexerHealth` (watcher.rs), written after every indexing cycle so the
/// doctor tool and other short-lived processes can read the last known state without attaching
/// to a running watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub updated_at_unix_ms: u64,
    pub reason: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_events: Option<usize>,
}

#[must_use]
pub fn health_file_path(root: &Path) -> PathBuf {
    root.join(".indexcore").join(HEALTH_FILE_NAME)
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

async fn write_snapshot(root: &Path, snapshot: &HealthSnapshot) -> Result<()> {
    let path = health_file_path(root);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, &path).await?;
    Ok(())
}

pub async fn write_health_snapshot(
    root: &Path,
    stats: &IndexStats,
    reason: &str,
    p95_duration_ms: Option<u64>,
    pending_events: Option<usize>,
) -> Result<()> {
    let snapshot = HealthSnapshot {
        updated_at_unix_ms: unix_now_ms(),
        reason: reason.to_string(),
        success: true,
        error: None,
        stats: Some(stats.clone()),
        p95_duration_ms,
        pending_events,
    };
    write_snapshot(root, &snapshot).await
}

pub async fn append_failure_reason(
    root: &Path,
    reason: &str,
    error: &str,
    p95_duration_ms: Option<u64>,
) -> Result<()> {
    let snapshot = HealthSnapshot {
        updated_at_unix_ms: unix_now_ms(),
        reason: reason.to_string(),
        success: false,
        error: Some(error.to_string()),
        stats: None,
        p95_duration_ms,
        pending_events: None,
    };
    write_snapshot(root, &snapshot).await
}

pub async fn read_health_snapshot(root: &Path) -> Result<Option<HealthSnapshot>> {
    let path = health_file_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = tokio::fs::read(&path).await?;
    let snapshot: HealthSnapshot = serde_json::from_slice(&bytes)
        .map_err(|e| IndexerError::Other(format!("corrupt health snapshot: {e}")))?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let stats = IndexStats::new();
        write_health_snapshot(dir.path(), &stats, "fs_event", Some(120), Some(0))
            .await
            .unwrap();

        let snapshot = read_health_snapshot(dir.path()).await.unwrap().unwrap();
        assert!(snapshot.success);
        assert_eq!(snapshot.reason, "fs_event");
    }

    #[tokio::test]
    async fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_health_snapshot(dir.path()).await.unwrap().is_none());
    }
}
