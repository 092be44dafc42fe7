use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to build graph: {0}")]
    BuildError(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
