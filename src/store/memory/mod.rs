
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{EmbeddingRecord, RetrievalResult, VectorStore};
use crate::{QagenError, Result};

/// In-process vector store with cosine distance ranking and JSON snapshot
/// persistence. Suited to small knowledge bases and hermetic tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<EmbeddingRecord>,
    dimension: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    dimension: Option<usize>,
    records: Vec<EmbeddingRecord>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance (`1 - cos`); 0 means identical direction, 2 opposite.
/// Zero-magnitude vectors are treated as maximally distant from everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot = x.mul_add(*y, dot);
        norm_a = x.mul_add(*x, norm_a);
        norm_b = y.mul_add(*y, norm_b);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn insert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No records to insert");
            return Ok(());
        }

        // Validate the whole batch against the established dimension before
        // touching any state, so a failed insert leaves the store unchanged.
        let established = self.dimension.unwrap_or_else(|| records[0].vector.len());
        for record in &records {
            if record.vector.len() != established {
                return Err(QagenError::DimensionMismatch {
                    expected: established,
                    actual: record.vector.len(),
                });
            }
        }
        self.dimension = Some(established);

        let inserted = records.len();
        for record in records {
            if let Some(existing) = self.records.iter_mut().find(|r| r.id == record.id) {
                *existing = record;
            } else {
                self.records.push(record);
            }
        }

        debug!(
            "Inserted {} records, store now holds {}",
            inserted,
            self.records.len()
        );
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        if self.records.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.dimension {
            if query_vector.len() != expected {
                return Err(QagenError::DimensionMismatch {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        let mut hits: Vec<RetrievalResult> = self
            .records
            .iter()
            .map(|record| RetrievalResult {
                content: record.content.clone(),
                metadata: record.metadata.clone(),
                distance: cosine_distance(&record.vector, query_vector),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn delete_all(&mut self) -> Result<()> {
        self.records.clear();
        self.dimension = None;
        debug!("Cleared all records from memory store");
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    async fn persist(&self, location: &Path) -> Result<()> {
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                QagenError::BackendUnavailable(format!(
                    "failed to create snapshot directory: {e}"
                ))
            })?;
        }

        let snapshot = Snapshot {
            dimension: self.dimension,
            records: self.records.clone(),
        };
        let payload = serde_json::to_string(&snapshot).map_err(|e| {
            QagenError::BackendUnavailable(format!("failed to serialize snapshot: {e}"))
        })?;

        fs::write(location, payload).map_err(|e| {
            QagenError::BackendUnavailable(format!(
                "failed to write snapshot {}: {e}",
                location.display()
            ))
        })?;

        info!(
            "Persisted {} records to {}",
            self.records.len(),
            location.display()
        );
        Ok(())
    }

    async fn restore(&mut self, location: &Path) -> Result<()> {
        let payload = fs::read_to_string(location).map_err(|e| {
            QagenError::BackendUnavailable(format!(
                "failed to read snapshot {}: {e}",
                location.display()
            ))
        })?;

        let snapshot: Snapshot = serde_json::from_str(&payload).map_err(|e| {
            QagenError::BackendUnavailable(format!(
                "failed to parse snapshot {}: {e}",
                location.display()
            ))
        })?;

        self.dimension = snapshot.dimension;
        self.records = snapshot.records;

        info!(
            "Restored {} records from {}",
            self.records.len(),
            location.display()
        );
        Ok(())
    }
}
