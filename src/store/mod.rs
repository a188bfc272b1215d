// Chunk store
// Ordered chunks persisted as a JSON array; each chunk carries the ID the vector index refers to


use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{QaError, Result};

pub const NO_TITLE: &str = "No Title";
pub const NO_URL: &str = "No URL";

/// A bounded passage of article text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier stored next to the chunk's vector
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_url")]
    pub url: String,
    pub content: String,
}

fn default_title() -> String {
    NO_TITLE.to_string()
}

fn default_url() -> String {
    NO_URL.to_string()
}

impl Chunk {
    /// Create a chunk without an ID; the store assigns one
    #[inline]
    pub fn new(title: &str, url: &str, content: &str) -> Self {
        Self {
            id: String::new(),
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
        }
    }
}

/// Deterministic ID for a chunk that was stored without one
#[inline]
pub fn derive_chunk_id(position: usize, content: &str) -> String {
    let name = format!("{}\u{1f}{}", position, content);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Ordered chunk sequence; position and ID both resolve to a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
}

impl ChunkStore {
    #[inline]
    pub fn new(mut chunks: Vec<Chunk>) -> Self {
        let mut positions = HashMap::with_capacity(chunks.len());
        for (position, chunk) in chunks.iter_mut().enumerate() {
            if chunk.id.trim().is_empty() {
                chunk.id = derive_chunk_id(position, &chunk.content);
            }
            positions.entry(chunk.id.clone()).or_insert(position);
        }
        Self { chunks, positions }
    }

    /// Load a persisted chunk store
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(QaError::Config(format!(
                "Chunk store not found at {}, run `football-qa chunk` first",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let chunks: Vec<Chunk> = serde_json::from_str(&content)?;
        debug!("Loaded {} chunks from {}", chunks.len(), path.display());

        Ok(Self::new(chunks))
    }

    /// Persist the full chunk sequence, replacing any previous store
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.chunks)?;
        fs::write(path, content)?;

        info!("Saved {} chunks to {}", self.chunks.len(), path.display());
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    #[inline]
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }
}
