
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::embeddings::Embedding;
use crate::{QaError, Result};

const TABLE_NAME: &str = "chunk_vectors";

/// One vector to be indexed, tagged with the chunk it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub chunk_id: String,
    pub position: usize,
    pub vector: Embedding,
}

/// A nearest-neighbour hit; `distance` is the squared Euclidean distance reported by LanceDB
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub position: usize,
    pub distance: f32,
}

/// Flat L2 vector index stored as a LanceDB table.
///
/// No ANN index is ever created on the table, so every search is an exhaustive scan.
pub struct VectorStore {
    table: Table,
    dimension: usize,
}

impl VectorStore {
    /// Open an existing index, failing with `IndexNotFound` when none has been built
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(QaError::IndexNotFound(db_path.to_path_buf()));
        }

        let connection = Self::connect(db_path).await?;
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(QaError::IndexNotFound(db_path.to_path_buf()));
        }

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to open table: {}", e)))?;

        let dimension = Self::detect_vector_dimension(&table).await?;
        debug!("Opened vector index at {:?} with dimension {}", db_path, dimension);

        Ok(Self { table, dimension })
    }

    /// Drop any previous index and write `records` as the new one, in the order given
    #[inline]
    pub async fn rebuild(db_path: &Path, records: &[IndexRecord]) -> Result<Self> {
        let dimension = records
            .first()
            .map(|record| record.vector.len())
            .ok_or_else(|| QaError::Database("Cannot build an index without vectors".to_string()))?;

        if dimension == 0 {
            return Err(QaError::Embedding(
                "Embedding model returned empty vectors".to_string(),
            ));
        }

        std::fs::create_dir_all(db_path).map_err(|e| {
            QaError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let connection = Self::connect(db_path).await?;
        Self::drop_table_if_exists(&connection).await?;

        let schema = Self::create_schema(dimension);
        let table = connection
            .create_empty_table(TABLE_NAME, schema.clone())
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to create table: {}", e)))?;

        let record_batch = Self::create_record_batch(schema.clone(), dimension, records)?;
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to insert vectors: {}", e)))?;

        info!(
            "Stored {} vectors of dimension {} in {:?}",
            records.len(),
            dimension,
            db_path
        );
        Ok(Self { table, dimension })
    }

    async fn connect(db_path: &Path) -> Result<Connection> {
        let uri = db_path.to_string_lossy();
        lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to connect to LanceDB: {}", e)))
    }

    async fn drop_table_if_exists(connection: &Connection) -> Result<()> {
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to list tables for drop: {}", e)))?;

        if table_names.iter().any(|name| name == TABLE_NAME) {
            debug!("Dropping previous {} table", TABLE_NAME);
            connection
                .drop_table(TABLE_NAME)
                .await
                .map_err(|e| QaError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    async fn detect_vector_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| QaError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                QaError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("position", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    dimension as i32,
                ),
                false,
            ),
        ]))
    }

    fn create_record_batch(
        schema: Arc<Schema>,
        dimension: usize,
        records: &[IndexRecord],
    ) -> Result<RecordBatch> {
        let mut chunk_ids = Vec::with_capacity(records.len());
        let mut positions = Vec::with_capacity(records.len());
        let mut flat_values = Vec::with_capacity(records.len() * dimension);

        for record in records {
            if record.vector.len() != dimension {
                return Err(QaError::Embedding(format!(
                    "Vector for chunk {} has dimension {}, expected {}",
                    record.chunk_id,
                    record.vector.len(),
                    dimension
                )));
            }
            let position = u32::try_from(record.position).map_err(|_| {
                QaError::Database(format!("Chunk position {} out of range", record.position))
            })?;

            chunk_ids.push(record.chunk_id.as_str());
            positions.push(position);
            flat_values.extend_from_slice(&record.vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| QaError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(chunk_ids)),
            Arc::new(UInt32Array::from(positions)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| QaError::Database(format!("Failed to create record batch: {}", e)))
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors in the index
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Exact k-nearest-neighbour search, best match first.
    ///
    /// `k` is capped at the number of stored vectors; equal distances are
    /// ordered by chunk position.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimension {
            return Err(QaError::Embedding(format!(
                "Query vector has dimension {}, index expects {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let count = self.count().await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let limit = k.min(count);
        debug!("Searching {} vectors for the {} nearest", count, limit);

        // Widen the fetch while the k-th distance is shared with rows past the cut,
        // so ties at the boundary are settled by position rather than scan order.
        let mut fetch = limit;
        loop {
            let mut hits = self.nearest(query_vector, fetch).await?;
            hits.sort_by(|a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then(a.position.cmp(&b.position))
            });

            let boundary_tied = hits.len() == fetch
                && fetch < count
                && hits[limit - 1].distance.total_cmp(&hits[fetch - 1].distance).is_eq();
            if !boundary_tied {
                hits.truncate(limit);
                return Ok(hits);
            }

            fetch = fetch.saturating_mul(2).min(count);
            debug!("Distance tie at rank {}, widening search to {}", limit, fetch);
        }
    }

    async fn nearest(&self, query_vector: &[f32], fetch: usize) -> Result<Vec<VectorHit>> {
        let results = self
            .table
            .vector_search(query_vector)
            .map_err(|e| QaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .bypass_vector_index()
            .select(Select::Columns(vec![
                "chunk_id".to_string(),
                "position".to_string(),
            ]))
            .limit(fetch)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut hits = Vec::with_capacity(fetch);
        for batch in &batches {
            hits.extend(Self::parse_hits(batch)?);
        }
        Ok(hits)
    }

    /// All `(chunk_id, position)` pairs in the index, ordered by position
    #[inline]
    pub async fn entries(&self) -> Result<Vec<(String, usize)>> {
        let mut results = self
            .table
            .query()
            .select(Select::Columns(vec![
                "chunk_id".to_string(),
                "position".to_string(),
            ]))
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to list index entries: {}", e)))?;

        let mut entries = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            let (chunk_ids, positions) = Self::id_columns(&batch)?;
            for row in 0..batch.num_rows() {
                entries.push((
                    chunk_ids.value(row).to_string(),
                    positions.value(row) as usize,
                ));
            }
        }

        entries.sort_by_key(|(_, position)| *position);
        Ok(entries)
    }

    fn id_columns(batch: &RecordBatch) -> Result<(&StringArray, &UInt32Array)> {
        let chunk_ids = batch
            .column_by_name("chunk_id")
            .ok_or_else(|| QaError::Database("Missing chunk_id column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| QaError::Database("Invalid chunk_id column type".to_string()))?;

        let positions = batch
            .column_by_name("position")
            .ok_or_else(|| QaError::Database("Missing position column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| QaError::Database("Invalid position column type".to_string()))?;

        Ok((chunk_ids, positions))
    }

    fn parse_hits(batch: &RecordBatch) -> Result<Vec<VectorHit>> {
        let (chunk_ids, positions) = Self::id_columns(batch)?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| QaError::Database("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| QaError::Database("Invalid _distance column type".to_string()))?;

        Ok((0..batch.num_rows())
            .map(|row| VectorHit {
                chunk_id: chunk_ids.value(row).to_string(),
                position: positions.value(row) as usize,
                distance: if distances.is_null(row) {
                    f32::INFINITY
                } else {
                    distances.value(row)
                },
            })
            .collect())
    }
}
