use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate counters for one indexing pass. `Debug`-printed into the log line a cycle ends on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub files: usize,
    pub chunks: usize,
    pub lines: usize,
    pub time_ms: u64,
    pub errors: Vec<String>,
    pub files_by_language: HashMap<String, usize>,
}

impl IndexStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, language: &str, lines: usize) {
        self.files += 1;
        self.lines += lines;
        *self.files_by_language.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_chunks(&mut self, count: usize) {
        self.chunks += count;
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_files_and_chunks() {
        let mut stats = IndexStats::new();
        stats.add_file("rust", 42);
        stats.add_file("rust", 10);
        stats.add_chunks(3);
        stats.add_error("boom".to_string());

        assert_eq!(stats.files, 2);
        assert_eq!(stats.lines, 52);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.error_count(), 1);
        assert_eq!(stats.files_by_language.get("rust"), Some(&2));
    }
}
