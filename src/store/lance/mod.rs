
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use super::{EmbeddingRecord, RetrievalResult, VectorStore};
use crate::chunking::ChunkMetadata;
use crate::extractor::DocType;
use crate::{QagenError, Result};

const TABLE_NAME: &str = "chunks";
/// Rows per Arrow record batch when inserting large ingestion batches.
const INSERT_BATCH_ROWS: usize = 512;

/// On-disk vector store backed by a LanceDB table. Distances are LanceDB's
/// native L2 metric. Data is durable as soon as an insert returns, so the
/// persist/restore hooks are no-ops.
pub struct LanceStore {
    connection: Connection,
    table_name: String,
    dimension: Option<usize>,
}

impl LanceStore {
    /// Connect to (or create) the LanceDB database at `db_path`.
    #[inline]
    pub async fn connect(db_path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                QagenError::BackendUnavailable(format!(
                    "failed to create vector database directory: {e}"
                ))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri).execute().await.map_err(|e| {
            QagenError::BackendUnavailable(format!("failed to connect to LanceDB: {e}"))
        })?;

        let mut store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            dimension: None,
        };

        if let Some(table) = store.open_table_if_exists().await? {
            store.dimension = Some(Self::detect_vector_dimension(&table).await?);
            debug!("Detected existing vector dimension: {:?}", store.dimension);
        }

        Ok(store)
    }

    async fn open_table_if_exists(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QagenError::BackendUnavailable(format!("failed to list tables: {e}")))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QagenError::BackendUnavailable(format!("failed to open table: {e}")))?;

        Ok(Some(table))
    }

    /// Read the vector dimension recorded in the table schema.
    async fn detect_vector_dimension(table: &Table) -> Result<usize> {
        let schema = table.schema().await.map_err(|e| {
            QagenError::BackendUnavailable(format!("failed to get table schema: {e}"))
        })?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(QagenError::BackendUnavailable(
            "could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("filename", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut vectors = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut filenames = Vec::with_capacity(len);
        let mut doc_types = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            vectors.push(&record.vector);
            contents.push(record.content.as_str());
            filenames.push(record.metadata.filename.as_str());
            doc_types.push(record.metadata.doc_type.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.created_at.as_str());
        }

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for vector in &vectors {
            flat_values.extend_from_slice(vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    QagenError::BackendUnavailable(format!("failed to create vector array: {e}"))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(filenames)),
            Arc::new(StringArray::from(doc_types)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays).map_err(|e| {
            QagenError::BackendUnavailable(format!("failed to create record batch: {e}"))
        })
    }

    /// Delete any rows whose ids collide with the incoming batch so that a
    /// re-insert overwrites instead of duplicating.
    async fn delete_existing_ids(&self, table: &Table, records: &[EmbeddingRecord]) -> Result<()> {
        for batch in records.chunks(INSERT_BATCH_ROWS) {
            let id_list = batch
                .iter()
                .map(|record| format!("'{}'", record.id.replace('\'', "''")))
                .join(", ");
            let predicate = format!("id IN ({id_list})");

            table.delete(&predicate).await.map_err(|e| {
                QagenError::BackendUnavailable(format!("failed to delete existing ids: {e}"))
            })?;
        }

        Ok(())
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievalResult>> {
        let num_rows = batch.num_rows();
        let mut results = Vec::with_capacity(num_rows);

        let contents = string_column(batch, "content")?;
        let filenames = string_column(batch, "filename")?;
        let doc_types = string_column(batch, "doc_type")?;

        let chunk_indices = batch
            .column_by_name("chunk_index")
            .ok_or_else(|| QagenError::BackendUnavailable("missing chunk_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| {
                QagenError::BackendUnavailable("invalid chunk_index column type".to_string())
            })?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        for row in 0..num_rows {
            let doc_type_raw = doc_types.value(row);
            let doc_type = DocType::from_str(doc_type_raw).map_err(|_| {
                QagenError::BackendUnavailable(format!(
                    "unknown doc_type '{doc_type_raw}' in vector store"
                ))
            })?;

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            results.push(RetrievalResult {
                content: contents.value(row).to_string(),
                metadata: ChunkMetadata {
                    filename: filenames.value(row).to_string(),
                    doc_type,
                    chunk_index: chunk_indices.value(row),
                },
                distance,
            });
        }

        Ok(results)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| QagenError::BackendUnavailable(format!("missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| QagenError::BackendUnavailable(format!("invalid {name} column type")))
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn insert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No records to insert");
            return Ok(());
        }

        // Validate the whole batch before creating or mutating the table.
        let established = self.dimension.unwrap_or_else(|| records[0].vector.len());
        for record in &records {
            if record.vector.len() != established {
                return Err(QagenError::DimensionMismatch {
                    expected: established,
                    actual: record.vector.len(),
                });
            }
        }

        let table = match self.open_table_if_exists().await? {
            Some(table) => {
                self.delete_existing_ids(&table, &records).await?;
                table
            }
            None => {
                debug!("Creating table with vector dimension {}", established);
                self.connection
                    .create_empty_table(&self.table_name, Self::create_schema(established))
                    .execute()
                    .await
                    .map_err(|e| {
                        QagenError::BackendUnavailable(format!("failed to create table: {e}"))
                    })?
            }
        };
        self.dimension = Some(established);

        let batches: Vec<_> = records
            .chunks(INSERT_BATCH_ROWS)
            .map(|batch| Self::create_record_batch(batch, established))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(Ok)
            .collect();

        let reader = RecordBatchIterator::new(batches, Self::create_schema(established));
        table.add(reader).execute().await.map_err(|e| {
            QagenError::BackendUnavailable(format!("failed to insert records: {e}"))
        })?;

        info!("Stored {} records", records.len());
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        let Some(table) = self.open_table_if_exists().await? else {
            return Ok(Vec::new());
        };

        if let Some(expected) = self.dimension {
            if query_vector.len() != expected {
                return Err(QagenError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let query = table
            .vector_search(query_vector)
            .map_err(|e| {
                QagenError::BackendUnavailable(format!("failed to create vector search: {e}"))
            })?
            .column("vector")
            .limit(top_k);

        let mut stream = query.execute().await.map_err(|e| {
            QagenError::BackendUnavailable(format!("failed to execute search: {e}"))
        })?;

        let mut results = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(|e| {
            QagenError::BackendUnavailable(format!("failed to read result stream: {e}"))
        })? {
            results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Search returned {} results", results.len());
        Ok(results)
    }

    async fn delete_all(&mut self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QagenError::BackendUnavailable(format!("failed to list tables: {e}")))?;

        if table_names.contains(&self.table_name) {
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| {
                    QagenError::BackendUnavailable(format!("failed to drop table: {e}"))
                })?;
            info!("Dropped table {}", self.table_name);
        }

        self.dimension = None;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let Some(table) = self.open_table_if_exists().await? else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| QagenError::BackendUnavailable(format!("failed to count rows: {e}")))?;

        Ok(count as u64)
    }

    async fn persist(&self, _location: &Path) -> Result<()> {
        // LanceDB writes through to disk on every insert.
        debug!("persist is a no-op for the LanceDB backend");
        Ok(())
    }

    async fn restore(&mut self, _location: &Path) -> Result<()> {
        debug!("restore is a no-op for the LanceDB backend");
        Ok(())
    }
}
