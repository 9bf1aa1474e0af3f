
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{IndexEntry, RetrievalResult};
use crate::embeddings::chunking::Chunk;
use crate::{RagError, Result};

const TABLE_NAME: &str = "chunks";

/// Dimension used for the table schema when an index is built from zero
/// entries; searching such an index yields no results regardless.
const EMPTY_INDEX_DIMENSION: usize = 768;

/// Persisted vector index over chunk embeddings, backed by LanceDB.
///
/// Relevance scores are cosine similarity rescaled to `[0, 1]` via
/// `1 - cosine_distance / 2`; the same embedding model must be used for
/// index and query vectors so the scale is comparable.
pub struct VectorIndex {
    connection: Connection,
    dimension: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Build a new index at `path` from `entries`, replacing any existing
    /// index there. Entries are written into a staging directory next to
    /// `path` and swapped into place only once the write has succeeded: a
    /// failed rebuild leaves the previous index intact, and a reader never
    /// sees a partially replaced index. Handles opened before a rebuild keep
    /// reading the retired contents and must be reopened.
    #[inline]
    pub async fn create(path: &Path, entries: &[IndexEntry]) -> Result<Self> {
        let dimension = match entries.first() {
            Some(first) => first.vector.len(),
            None => EMPTY_INDEX_DIMENSION,
        };

        if let Some(entry) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(RagError::Embedding(format!(
                "Entry {} has embedding dimension {} but the index dimension is {}",
                entry.id,
                entry.vector.len(),
                dimension
            )));
        }

        debug!(
            "Building vector index at {} with {} entries ({} dimensions)",
            path.display(),
            entries.len(),
            dimension
        );

        let staging = sibling_path(path, ".staging");
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| {
                RagError::Storage(format!("Failed to clear staging directory: {}", e))
            })?;
        }
        std::fs::create_dir_all(&staging).map_err(|e| {
            RagError::Storage(format!("Failed to create staging directory: {}", e))
        })?;

        if let Err(error) = write_entries(&staging, entries, dimension).await {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(error);
        }

        swap_into_place(&staging, path)?;

        let connection = connect(path).await?;

        info!("Vector index built with {} entries", entries.len());

        Ok(Self {
            connection,
            dimension,
        })
    }

    /// Open an existing index at `path`. Fails with `NotFound` when no index
    /// has been built there.
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::NotFound(format!(
                "No index exists at {}",
                path.display()
            )));
        }

        let connection = connect(path).await?;

        let table_names = list_tables(&connection).await?;
        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(RagError::NotFound(format!(
                "No index exists at {}",
                path.display()
            )));
        }

        let dimension = detect_dimension(&connection).await?;
        debug!(
            "Opened vector index at {} ({} dimensions)",
            path.display(),
            dimension
        );

        Ok(Self {
            connection,
            dimension,
        })
    }

    /// Search for the `k` entries most similar to `query_vector`, ordered by
    /// descending relevance. Ties resolve to insertion order. An empty index
    /// yields an empty Vec. The index applies no minimum-relevance filter;
    /// that is the retriever's concern.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if query_vector.len() != self.dimension {
            return Err(RagError::Config(format!(
                "Query embedding dimension {} does not match index dimension {}; \
                 the index and query must use the same embedding model",
                query_vector.len(),
                self.dimension
            )));
        }

        debug!("Searching vector index with limit {}", k);

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to open index table: {}", e)))?;

        let mut stream = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Storage(format!("Failed to create vector search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to execute search: {}", e)))?;

        let mut ranked: Vec<(u32, RetrievalResult)> = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to read result stream: {}", e)))?
        {
            ranked.extend(parse_search_batch(&batch)?);
        }

        // LanceDB orders by distance; re-sort stably so equal scores resolve
        // to insertion order.
        ranked.sort_by(|a, b| {
            b.1.relevance_score
                .total_cmp(&a.1.relevance_score)
                .then(a.0.cmp(&b.0))
        });

        debug!("Search returned {} results", ranked.len());
        Ok(ranked.into_iter().map(|(_, result)| result).collect())
    }

    /// Number of entries currently stored in the index.
    #[inline]
    pub async fn count_entries(&self) -> Result<u64> {
        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to open index table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to count entries: {}", e)))?;

        Ok(count as u64)
    }
}

/// Write `entries` as a fresh index at `path`, which must be an empty
/// directory.
async fn write_entries(path: &Path, entries: &[IndexEntry], dimension: usize) -> Result<()> {
    let connection = connect(path).await?;

    let schema = index_schema(dimension);
    connection
        .create_empty_table(TABLE_NAME, Arc::clone(&schema))
        .execute()
        .await
        .map_err(|e| RagError::Storage(format!("Failed to create index table: {}", e)))?;

    if !entries.is_empty() {
        let record_batch = entries_to_record_batch(entries, dimension, &schema)?;
        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to open index table: {}", e)))?;

        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to write entries: {}", e)))?;
    }

    Ok(())
}

/// Move the fully written staging directory to `path`, retiring any previous
/// index there. The previous index is restored if the swap itself fails.
fn swap_into_place(staging: &Path, path: &Path) -> Result<()> {
    let retired = sibling_path(path, ".retired");
    if retired.exists() {
        std::fs::remove_dir_all(&retired).map_err(|e| {
            RagError::Storage(format!("Failed to clear retired index directory: {}", e))
        })?;
    }

    let had_previous = path.exists();
    if had_previous {
        std::fs::rename(path, &retired).map_err(|e| {
            RagError::Storage(format!("Failed to retire previous index: {}", e))
        })?;
    }

    if let Err(error) = std::fs::rename(staging, path) {
        if had_previous {
            let _ = std::fs::rename(&retired, path);
        }
        return Err(RagError::Storage(format!(
            "Failed to swap new index into place: {}",
            error
        )));
    }

    if had_previous {
        // Best effort; a leftover retired directory is cleared on the next
        // rebuild.
        let _ = std::fs::remove_dir_all(&retired);
    }

    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

async fn connect(path: &Path) -> Result<Connection> {
    let uri = format!("file://{}", path.display());
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| RagError::Storage(format!("Failed to connect to index storage: {}", e)))
}

async fn list_tables(connection: &Connection) -> Result<Vec<String>> {
    connection
        .table_names()
        .execute()
        .await
        .map_err(|e| RagError::Storage(format!("Failed to list index tables: {}", e)))
}

async fn detect_dimension(connection: &Connection) -> Result<usize> {
    let table = connection
        .open_table(TABLE_NAME)
        .execute()
        .await
        .map_err(|e| RagError::Storage(format!("Failed to open index table: {}", e)))?;

    let schema = table
        .schema()
        .await
        .map_err(|e| RagError::Storage(format!("Failed to read index schema: {}", e)))?;

    for field in schema.fields() {
        if field.name() == "vector" {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                return Ok(*size as usize);
            }
        }
    }

    Err(RagError::Storage(
        "Could not find vector column or determine dimension".to_string(),
    ))
}

fn index_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source_path", DataType::Utf8, false),
        Field::new("start_offset", DataType::UInt64, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("ordinal", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn entries_to_record_batch(
    entries: &[IndexEntry],
    dimension: usize,
    schema: &Arc<Schema>,
) -> Result<RecordBatch> {
    let len = entries.len();

    let mut ids = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut source_paths = Vec::with_capacity(len);
    let mut start_offsets = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut ordinals = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * dimension);

    for (ordinal, entry) in entries.iter().enumerate() {
        ids.push(entry.id.as_str());
        contents.push(entry.chunk.text.as_str());
        source_paths.push(entry.chunk.source_path.as_str());
        start_offsets.push(entry.chunk.start_offset as u64);
        chunk_indices.push(entry.chunk.chunk_index as u32);
        ordinals.push(ordinal as u32);
        created_ats.push(entry.created_at.as_str());
        flat_values.extend_from_slice(&entry.vector);
    }

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, dimension as i32, Arc::new(values_array), None)
            .map_err(|e| RagError::Storage(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(source_paths)),
        Arc::new(UInt64Array::from(start_offsets)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(UInt32Array::from(ordinals)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(Arc::clone(schema), arrays)
        .map_err(|e| RagError::Storage(format!("Failed to create record batch: {}", e)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<(u32, RetrievalResult)>> {
    let num_rows = batch.num_rows();
    let mut results = Vec::with_capacity(num_rows);

    let contents = string_column(batch, "content")?;
    let source_paths = string_column(batch, "source_path")?;

    let start_offsets = batch
        .column_by_name("start_offset")
        .and_then(|col| col.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| RagError::Storage("Missing start_offset column".to_string()))?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| RagError::Storage("Missing chunk_index column".to_string()))?;

    let ordinals = batch
        .column_by_name("ordinal")
        .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| RagError::Storage("Missing ordinal column".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| RagError::Storage("Missing _distance column".to_string()))?;

    for row in 0..num_rows {
        let chunk = Chunk {
            text: contents.value(row).to_string(),
            source_path: source_paths.value(row).to_string(),
            start_offset: start_offsets.value(row) as usize,
            chunk_index: chunk_indices.value(row) as usize,
        };

        if distances.is_null(row) {
            return Err(RagError::Storage(
                "Null distance in search result".to_string(),
            ));
        }
        let distance = distances.value(row);

        // Cosine distance is in [0, 2]; rescale to a [0, 1] relevance score.
        let relevance_score = (1.0 - distance / 2.0).clamp(0.0, 1.0);

        results.push((
            ordinals.value(row),
            RetrievalResult {
                chunk,
                relevance_score,
            },
        ));
    }

    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| RagError::Storage(format!("Missing {} column", name)))
}
