// Embeddings module
// Text chunking and the embedding models that turn chunks and queries into vectors

pub mod chunking;
pub mod ollama;

pub use chunking::{
    ChunkingConfig, ChunkingOutcome, TextSplitter, chunk_articles, clean_text,
};
pub use ollama::{ModelInfo, OllamaClient};

/// A dense vector representation of a piece of text
pub type Embedding = Vec<f32>;

/// Maps text to fixed-dimension vectors.
///
/// Indexing and querying must use the same model, otherwise distances are meaningless.
pub trait Embedder: Send + Sync {
    /// Identifier recorded in the index manifest and checked at query time
    fn model_name(&self) -> &str;

    /// Embed passages for indexing, one vector per input in input order
    fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Embedding>>;

    /// Embed a single query for searching
    fn embed_query(&self, text: &str) -> crate::Result<Embedding>;
}
