// Indexer module
// Embeds the chunk store in order and rebuilds the vector index from scratch

#[cfg(test)]
mod tests;

pub mod consistency;

use indicatif::ProgressBar;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::embeddings::{Embedder, Embedding};
use crate::index::{IndexManifest, IndexRecord, VectorStore};
use crate::store::ChunkStore;
use crate::{QaError, Result};

pub use consistency::ConsistencyReport;

/// Builds the vector index for a chunk store
pub struct Indexer<'a> {
    config: &'a Config,
    embedder: &'a dyn Embedder,
    progress: ProgressBar,
}

/// Summary of a completed index build
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReport {
    pub vector_count: usize,
    pub dimension: usize,
    pub embedding_model: String,
    pub elapsed: Duration,
}

impl<'a> Indexer<'a> {
    #[inline]
    pub fn new(config: &'a Config, embedder: &'a dyn Embedder) -> Self {
        Self {
            config,
            embedder,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report embedding progress (in chunks) on the given bar
    #[inline]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Embed every chunk in store order and replace the on-disk index.
    ///
    /// Vector `i` always belongs to chunk `i`; any count mismatch aborts the build.
    #[inline]
    pub async fn build(&self, store: &ChunkStore) -> Result<IndexReport> {
        if store.is_empty() {
            return Err(QaError::EmptyChunkStore);
        }

        let started = Instant::now();
        let manifest_path = self.config.index_manifest_path();
        if manifest_path.exists() {
            // The old manifest must not vouch for a half-written index
            std::fs::remove_file(&manifest_path)?;
        }

        info!(
            "Embedding {} chunks with {}",
            store.len(),
            self.embedder.model_name()
        );
        let vectors = self.embed_store(store)?;
        let dimension = uniform_dimension(&vectors)?;

        let records: Vec<IndexRecord> = store
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(position, (chunk, vector))| IndexRecord {
                chunk_id: chunk.id.clone(),
                position,
                vector,
            })
            .collect();

        let vector_store =
            VectorStore::rebuild(&self.config.vector_database_path(), &records).await?;

        let vector_count = vector_store.count().await?;
        if vector_count != store.len() {
            return Err(QaError::Alignment {
                chunks: store.len(),
                vectors: vector_count,
            });
        }

        IndexManifest::new(self.embedder.model_name(), dimension, vector_count)
            .save(&manifest_path)?;

        let report = IndexReport {
            vector_count,
            dimension,
            embedding_model: self.embedder.model_name().to_string(),
            elapsed: started.elapsed(),
        };
        info!(
            "Indexed {} vectors of dimension {} in {:.2?}",
            report.vector_count, report.dimension, report.elapsed
        );
        Ok(report)
    }

    fn embed_store(&self, store: &ChunkStore) -> Result<Vec<Embedding>> {
        let batch_size = (self.config.ollama.batch_size as usize).max(1);
        let texts: Vec<String> = store.iter().map(|chunk| chunk.content.clone()).collect();

        self.progress.set_length(texts.len() as u64);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let embedded = self.embedder.embed_documents(batch)?;
            if embedded.len() != batch.len() {
                return Err(QaError::Alignment {
                    chunks: store.len(),
                    vectors: vectors.len() + embedded.len(),
                });
            }
            debug!("Embedded batch of {} chunks", batch.len());
            vectors.extend(embedded);
            self.progress.inc(batch.len() as u64);
        }
        self.progress.finish_and_clear();

        Ok(vectors)
    }
}

fn uniform_dimension(vectors: &[Embedding]) -> Result<usize> {
    let dimension = vectors.first().map_or(0, Vec::len);
    if dimension == 0 {
        return Err(QaError::Embedding(
            "Embedding model returned empty vectors".to_string(),
        ));
    }

    if let Some((position, vector)) = vectors
        .iter()
        .enumerate()
        .find(|(_, vector)| vector.len() != dimension)
    {
        return Err(QaError::Embedding(format!(
            "Vector {} has dimension {}, expected {}",
            position,
            vector.len(),
            dimension
        )));
    }

    Ok(dimension)
}
