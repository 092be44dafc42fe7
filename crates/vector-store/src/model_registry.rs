use crate::error::{Result, VectorStoreError};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default model used when nothing else is configured or persisted.
pub const DEFAULT_MODEL_ID: &str = "bge-small";

/// Reads the active model id from the environment. Returns `Err` when unset so callers can
/// fall back to `DEFAULT_MODEL_ID` via `unwrap_or_else` the way the coordinator does.
pub fn current_model_id() -> Result<String> {
    std::env::var("CONTEXT_FINDER_MODEL")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| VectorStoreError::UnknownModel("CONTEXT_FINDER_MODEL is not set".into()))
}

#[derive(Clone, Debug)]
pub struct ModelInfo {
    pub repo_id: String,
    pub dimension: usize,
}

/// Known embedding models and where to fetch their ONNX export + tokenizer from the Hub.
pub struct ModelRegistry {
    models: HashMap<String, ModelInfo>,
    cache_dir: Option<PathBuf>,
}

impl ModelRegistry {
    pub fn from_env() -> Result<Self> {
        let mut models = HashMap::new();
        models.insert(
            "bge-small".to_string(),
            ModelInfo {
                repo_id: "BAAI/bge-small-en-v1.5".to_string(),
                dimension: 384,
            },
        );
        models.insert(
            "bge-base".to_string(),
            ModelInfo {
                repo_id: "BAAI/bge-base-en-v1.5".to_string(),
                dimension: 768,
            },
        );
        models.insert(
            "minilm-l6".to_string(),
            ModelInfo {
                repo_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                dimension: 384,
            },
        );
        models.insert(
            "jina-code".to_string(),
            ModelInfo {
                repo_id: "jinaai/jina-embeddings-v2-base-code".to_string(),
                dimension: 768,
            },
        );

        let cache_dir = std::env::var_os("CONTEXT_FINDER_MODEL_DIR").map(PathBuf::from);

        Ok(Self { models, cache_dir })
    }

    pub fn dimension(&self, model_id: &str) -> Result<usize> {
        self.models
            .get(model_id)
            .map(|m| m.dimension)
            .ok_or_else(|| VectorStoreError::UnknownModel(model_id.to_string()))
    }

    pub fn repo_id(&self, model_id: &str) -> Result<&str> {
        self.models
            .get(model_id)
            .map(|m| m.repo_id.as_str())
            .ok_or_else(|| VectorStoreError::UnknownModel(model_id.to_string()))
    }

    #[must_use]
    pub fn cache_dir(&self) -> Option<&std::path::Path> {
        self.cache_dir.as_deref()
    }

    #[must_use]
    pub fn known_models(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_has_dimension() {
        let registry = ModelRegistry::from_env().unwrap();
        assert_eq!(registry.dimension("bge-small").unwrap(), 384);
    }

    #[test]
    fn unknown_model_is_rejected() {
        let registry = ModelRegistry::from_env().unwrap();
        assert!(registry.dimension("does-not-exist").is_err());
    }
}
