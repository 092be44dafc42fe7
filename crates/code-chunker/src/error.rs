use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to parse source with tree-sitter: {0}")]
    ParseFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChunkerError {
    #[must_use]
    pub fn unsupported_language(lang: &str) -> Self {
        Self::UnsupportedLanguage(lang.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChunkerError>;
