use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Vector index not found at {}, run `football-qa index` first", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Chunk store is empty, run `football-qa chunk` first")]
    EmptyChunkStore,

    #[error("Chunk store holds {chunks} chunks but the vector index holds {vectors} vectors")]
    Alignment { chunks: usize, vectors: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod articles;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod evaluation;
pub mod generation;
pub mod index;
pub mod indexer;
pub mod interaction_log;
pub mod retrieval;
pub mod retry;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
