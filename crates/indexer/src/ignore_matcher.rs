//! C3: per-project ignore matching. Wraps an [`ignore::gitignore::Gitignore`] built from a
//! project's `.gitignore` and `.indexignore` (in that precedence order, `.indexignore` wins
//! when both exclude/include the same path) plus a small set of built-in excludes every
//! project gets regardless of its own ignore files. Swappable at runtime via [`Self::reload`]
//! so the coordinator's watcher can pick up edits to either file without restarting.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const BUILTIN_IGNORES: &[&str] = &[
    ".git/",
    ".indexcore/",
    "node_modules/",
    "target/",
    "dist/",
    "build/",
    ".venv/",
    "__pycache__/",
];

const INDEXIGNORE_FILE_NAME: &str = ".indexignore";
const GITIGNORE_FILE_NAME: &str = ".gitignore";

fn build_matcher(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in BUILTIN_IGNORES {
        // Built-in patterns are a fixed, known-valid set; a build error here would be a
        // programming mistake, not a runtime condition to propagate.
        let _ = builder.add_line(None, pattern);
    }
    // `.indexignore` is added after `.gitignore` so its rules take precedence: the `ignore`
    // crate's `Gitignore` matches the last rule that applies to a path.
    let _ = builder.add(root.join(GITIGNORE_FILE_NAME));
    let _ = builder.add(root.join(INDEXIGNORE_FILE_NAME));
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Live-reloadable ignore matcher for one project root.
pub struct IgnoreMatcher {
    root: PathBuf,
    matcher: RwLock<Gitignore>,
}

impl IgnoreMatcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        let root = root.into();
        let matcher = build_matcher(&root);
        Arc::new(Self {
            root,
            matcher: RwLock::new(matcher),
        })
    }

    /// Rebuilds the matcher from disk. Call after a file-watcher event touches
    /// `.gitignore`/`.indexignore` for this project.
    pub async fn reload(&self) {
        let fresh = build_matcher(&self.root);
        *self.matcher.write().await = fresh;
    }

    pub async fn is_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        let guard = self.matcher.read().await;
        guard
            .matched_path_or_any_parents(self.root.join(relative_path), is_dir)
            .is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn builtin_excludes_are_always_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path());
        assert!(matcher.is_ignored("node_modules/pkg/index.js", false).await);
        assert!(matcher.is_ignored(".git/HEAD", false).await);
    }

    #[tokio::test]
    async fn gitignore_rules_apply() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        let matcher = IgnoreMatcher::new(dir.path());
        assert!(matcher.is_ignored("debug.log", false).await);
        assert!(!matcher.is_ignored("main.rs", false).await);
    }

    #[tokio::test]
    async fn indexignore_overrides_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "fixtures/\n").unwrap();
        fs::write(dir.path().join(".indexignore"), "!fixtures/keep.rs\n").unwrap();
        let matcher = IgnoreMatcher::new(dir.path());
        assert!(matcher.is_ignored("fixtures/skip.rs", false).await);
        assert!(!matcher.is_ignored("fixtures/keep.rs", false).await);
    }

    #[tokio::test]
    async fn reload_picks_up_new_rules() {
        let dir = tempfile::tempdir().unwrap();
        let matcher = IgnoreMatcher::new(dir.path());
        assert!(!matcher.is_ignored("secret.env", false).await);

        fs::write(dir.path().join(".gitignore"), "*.env\n").unwrap();
        matcher.reload().await;
        assert!(matcher.is_ignored("secret.env", false).await);
    }
}
