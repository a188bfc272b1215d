// Retrieval module
// Embeds a question and maps its nearest index vectors back to chunk-store passages


use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::index::{IndexManifest, VectorHit, VectorStore};
use crate::store::{Chunk, ChunkStore};
use crate::{QaError, Result};

/// A chunk returned by a search, with its distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPassage {
    pub chunk_id: String,
    pub content: String,
    pub title: String,
    pub url: String,
    pub distance: f32,
}

/// Anything that can supply context passages for a question
#[async_trait]
pub trait PassageSource: Send + Sync {
    /// Up to `top_k` passage texts, best match first
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>>;
}

pub struct Retriever {
    store: ChunkStore,
    index: Option<VectorStore>,
    embedder: Box<dyn Embedder>,
}

impl Retriever {
    /// Load the chunk store and its index, failing fast when they disagree.
    ///
    /// An empty chunk store needs no index; such a retriever always returns nothing.
    #[inline]
    pub async fn open(config: &Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        let store = ChunkStore::load(&config.chunk_store_path())?;
        if store.is_empty() {
            warn!("Chunk store is empty, every retrieval will return no passages");
            return Ok(Self {
                store,
                index: None,
                embedder,
            });
        }

        let manifest = IndexManifest::load(config.index_manifest_path())?;
        manifest.ensure_model(embedder.model_name())?;

        let index = VectorStore::open(&config.vector_database_path()).await?;
        let vectors = index.count().await?;
        if vectors != store.len() {
            return Err(QaError::Alignment {
                chunks: store.len(),
                vectors,
            });
        }

        info!(
            "Retriever ready over {} chunks embedded with {}",
            store.len(),
            manifest.embedding_model
        );
        Ok(Self {
            store,
            index: Some(index),
            embedder,
        })
    }

    /// Build a retriever over an in-memory store and an already opened index
    #[inline]
    pub fn from_parts(
        store: ChunkStore,
        index: Option<VectorStore>,
        embedder: Box<dyn Embedder>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
        }
    }

    #[inline]
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Nearest passages to `query`, ordered by non-decreasing distance
    #[inline]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let Some(index) = &self.index else {
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query)?;
        let hits = index.search(&query_vector, top_k).await?;
        debug!("Index returned {} hits for top_k={}", hits.len(), top_k);

        let passages: Vec<RetrievedPassage> = hits
            .iter()
            .filter_map(|hit| {
                let resolved = self.resolve(hit);
                if resolved.is_none() {
                    warn!(
                        "Skipping hit for chunk {} at position {}: not found in chunk store",
                        hit.chunk_id, hit.position
                    );
                }
                resolved.map(|chunk| RetrievedPassage {
                    chunk_id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    title: chunk.title.clone(),
                    url: chunk.url.clone(),
                    distance: hit.distance,
                })
            })
            .collect();

        if passages.len() < hits.len() {
            warn!(
                "Retrieval under-filled: {} of {} hits resolved",
                passages.len(),
                hits.len()
            );
        }
        Ok(passages)
    }

    fn resolve(&self, hit: &VectorHit) -> Option<&Chunk> {
        match self.store.get(hit.position) {
            Some(chunk) if chunk.id == hit.chunk_id => Some(chunk),
            _ => self
                .store
                .position_of(&hit.chunk_id)
                .and_then(|position| self.store.get(position)),
        }
    }
}

#[async_trait]
impl PassageSource for Retriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(query, top_k)
            .await?
            .into_iter()
            .map(|passage| passage.content)
            .collect())
    }
}
