// Index module
// Persisted vector index over the chunk store plus the manifest describing how it was built


pub mod vector_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::{QaError, Result};

pub use vector_store::{IndexRecord, VectorHit, VectorStore};

/// Describes the vectors currently on disk.
///
/// Query embeddings must come from `embedding_model`; vectors from any other
/// model live in a different space and their distances are meaningless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub vector_count: usize,
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    #[inline]
    pub fn new(embedding_model: impl Into<String>, dimension: usize, vector_count: usize) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            dimension,
            vector_count,
            built_at: Utc::now(),
        }
    }

    /// Load the manifest, treating a missing file as a missing index
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(QaError::IndexNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&content)?;
        debug!(
            "Loaded index manifest: {} vectors of dimension {} from {}",
            manifest.vector_count, manifest.dimension, manifest.embedding_model
        );
        Ok(manifest)
    }

    #[inline]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Fail when queries would be embedded with a different model than the index
    #[inline]
    pub fn ensure_model(&self, model: &str) -> Result<()> {
        if self.embedding_model == model {
            return Ok(());
        }
        Err(QaError::Config(format!(
            "Index was built with embedding model '{}' but '{}' is configured, run `football-qa index` again",
            self.embedding_model, model
        )))
    }
}
