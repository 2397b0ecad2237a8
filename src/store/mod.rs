// Vector store module
// Capability trait over vector storage backends plus backend selection

pub mod lance;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;
use crate::chunking::ChunkMetadata;
use crate::config::{Config, StoreBackend};

pub use lance::LanceStore;
pub use memory::MemoryStore;

/// Record stored in a vector store backend. The store owns the record once
/// inserted; a later insert with the same id overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// RFC 3339 timestamp stamped at ingestion time.
    pub created_at: String,
}

/// One ranked hit from a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    /// Backend-defined distance; smaller is closer. The memory backend uses
    /// cosine distance, the LanceDB backend its native L2 metric.
    pub distance: f32,
}

/// Capability interface over vector storage backends.
///
/// Connectivity and storage faults surface as `BackendUnavailable` and are
/// retryable by the caller; dimension disagreements surface as
/// `DimensionMismatch` and are fatal to the calling operation.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records, overwriting any existing record with the same id.
    ///
    /// The store's vector dimension is established by the first record ever
    /// inserted; every record in the batch is validated against it before
    /// any mutation happens. Batches larger than a backend's single-call
    /// limit are chunked internally.
    async fn insert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Up to `top_k` nearest records, ordered ascending by distance. An
    /// empty store yields an empty list, never an error.
    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>>;

    /// Remove every record. Safe to call on an already-empty store.
    async fn delete_all(&mut self) -> Result<()>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64>;

    /// Write a durable snapshot to `location`. Backends that persist
    /// automatically may no-op.
    async fn persist(&self, location: &Path) -> Result<()>;

    /// Reload state from `location`, replacing current contents. Backends
    /// that persist automatically may no-op.
    async fn restore(&mut self, location: &Path) -> Result<()>;
}

/// Construct the configured store backend, restoring prior state when a
/// snapshot exists.
#[inline]
pub async fn open_store(config: &Config) -> Result<Box<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let mut store = MemoryStore::new();
            let snapshot = config.snapshot_path();
            if snapshot.exists() {
                store.restore(&snapshot).await?;
            }
            Ok(Box::new(store))
        }
        StoreBackend::Lance => {
            Ok(Box::new(LanceStore::connect(&config.vector_db_path()).await?))
        }
    }
}
