// Consistency validation
// Compares chunk-store identities with what the vector index holds at each position


use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::Result;
use crate::index::VectorStore;
use crate::store::ChunkStore;

/// Consistency check results between the chunk store and the vector index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Number of chunks in the chunk store
    pub store_chunks: usize,
    /// Number of vectors in the index
    pub index_vectors: usize,
    /// Chunk IDs with no vector
    pub missing_in_index: Vec<String>,
    /// Indexed IDs that no chunk carries
    pub orphaned_in_index: Vec<String>,
    /// IDs indexed at a different position than they occupy in the store
    pub misplaced: Vec<String>,
    pub is_consistent: bool,
}

impl ConsistencyReport {
    /// Compare the store against `(chunk_id, position)` entries read from the index
    #[inline]
    pub fn compare(store: &ChunkStore, entries: &[(String, usize)]) -> Self {
        let store_ids: HashSet<&str> = store.iter().map(|chunk| chunk.id.as_str()).collect();
        let indexed: HashMap<&str, usize> = entries
            .iter()
            .map(|(id, position)| (id.as_str(), *position))
            .collect();

        let missing_in_index: Vec<String> = store
            .iter()
            .filter(|chunk| !indexed.contains_key(chunk.id.as_str()))
            .map(|chunk| chunk.id.clone())
            .collect();

        let orphaned_in_index: Vec<String> = entries
            .iter()
            .filter(|(id, _)| !store_ids.contains(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect();

        let misplaced: Vec<String> = entries
            .iter()
            .filter(|(id, position)| {
                store
                    .position_of(id)
                    .is_some_and(|expected| expected != *position)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let is_consistent = store.len() == entries.len()
            && missing_in_index.is_empty()
            && orphaned_in_index.is_empty()
            && misplaced.is_empty();

        Self {
            store_chunks: store.len(),
            index_vectors: entries.len(),
            missing_in_index,
            orphaned_in_index,
            misplaced,
            is_consistent,
        }
    }

    /// Read every entry from the index and compare it with the store
    #[inline]
    pub async fn check(store: &ChunkStore, vector_store: &VectorStore) -> Result<Self> {
        info!("Validating chunk store against vector index");
        let entries = vector_store.entries().await?;
        let report = Self::compare(store, &entries);

        if report.is_consistent {
            info!("Chunk store and vector index are consistent");
        } else {
            warn!("Consistency check found issues: {}", report.summary());
        }
        Ok(report)
    }

    /// Get a human-readable summary of the consistency report
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            format!(
                "Index is consistent: {} chunks, {} vectors",
                self.store_chunks, self.index_vectors
            )
        } else {
            format!(
                "Index inconsistencies found: {} chunks vs {} vectors, {} missing from index, {} orphaned in index, {} misplaced",
                self.store_chunks,
                self.index_vectors,
                self.missing_in_index.len(),
                self.orphaned_in_index.len(),
                self.misplaced.len()
            )
        }
    }

    /// Get the total number of consistency issues
    #[inline]
    pub fn total_issues(&self) -> usize {
        self.missing_in_index.len() + self.orphaned_in_index.len() + self.misplaced.len()
    }
}
