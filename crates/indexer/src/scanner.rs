use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Bounded capacity for the walk-to-process channel (spec default). A producer thread blocks
/// on `send` once the coordinator falls behind rather than buffering the whole tree in memory.
pub const DEFAULT_WALK_CHANNEL_CAPACITY: usize = 256;

/// Walks a project directory honoring `.gitignore`/`.ignore`/global git excludes, yielding the
/// set of files the chunker should consider. Hidden files are skipped by default since most
/// source trees keep their interesting content outside dotfiles/dotdirs.
pub struct FileScanner {
    root: PathBuf,
    max_depth: Option<usize>,
}

impl FileScanner {
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_depth: None,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    fn build_walker(&self) -> WalkBuilder {
        let mut walker = WalkBuilder::new(&self.root);
        walker
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true);
        if let Some(max_depth) = self.max_depth {
            walker.max_depth(Some(max_depth));
        }
        walker
    }

    /// Walks the tree on a blocking thread and streams matching files back through a bounded
    /// channel, so a caller never has to hold the whole file list in memory: once the channel
    /// is full the walker blocks until the consumer catches up.
    #[must_use]
    pub fn spawn_walk(&self, capacity: usize) -> mpsc::Receiver<PathBuf> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let walker = self.build_walker().build();
        tokio::task::spawn_blocking(move || {
            for entry in walker.filter_map(Result::ok) {
                if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                    continue;
                }
                if tx.blocking_send(entry.into_path()).is_err() {
                    break;
                }
            }
        });
        rx
    }

    /// Convenience for callers that genuinely need the full set (small trees, tests, watermark
    /// computation). Prefer [`Self::spawn_walk`] on the indexing hot path.
    #[must_use]
    pub fn scan(&self) -> Vec<PathBuf> {
        self.build_walker()
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.rs\n").unwrap();
        fs::write(dir.path().join("kept.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("ignored.rs"), "fn main() {}").unwrap();

        let files = FileScanner::new(dir.path()).scan();
        let names: Vec<String> = files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();

        assert!(names.contains(&"kept.rs".to_string()));
        assert!(!names.contains(&"ignored.rs".to_string()));
    }

    #[test]
    fn scan_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".hidden").join("secret.rs"), "x").unwrap();
        fs::write(dir.path().join("visible.rs"), "x").unwrap();

        let files = FileScanner::new(dir.path()).scan();
        assert!(files.iter().any(|p| p.ends_with("visible.rs")));
        assert!(!files.iter().any(|p| p.ends_with("secret.rs")));
    }

    #[tokio::test]
    async fn spawn_walk_streams_without_collecting_everything_upfront() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "a").unwrap();
        fs::write(dir.path().join("b.rs"), "b").unwrap();

        let mut rx = FileScanner::new(dir.path()).spawn_walk(1);
        let mut seen = Vec::new();
        while let Some(path) = rx.recv().await {
            seen.push(path);
        }
        assert_eq!(seen.len(), 2);
    }
}
