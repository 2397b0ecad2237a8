use thiserror::Error;

pub type Result<T> = std::result::Result<T, QagenError>;

#[derive(Error, Debug)]
pub enum QagenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("no text to chunk after trimming")]
    EmptyInput,

    #[error("vector dimension mismatch: store has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector store backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod extractor;
pub mod generation;
pub mod pipeline;
pub mod retrieval;
pub mod store;
