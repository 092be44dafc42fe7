use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    EmbeddingError(String),

    #[error("unknown model id: {0}")]
    UnknownModel(String),

    #[error("index corrupted: {0}")]
    Corrupted(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;
