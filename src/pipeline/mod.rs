// Ingestion pipeline module
// Orchestrates chunk -> embed -> insert for a batch of documents


use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::QagenError;
use crate::chunking::{Chunk, Chunker};
use crate::embeddings::Embedder;
use crate::extractor::ExtractedDocument;
use crate::store::{EmbeddingRecord, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Success,
    Error,
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one ingestion batch. Counts are informational; callers branch
/// on `status` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub status: IngestionStatus,
    pub document_count: usize,
    pub chunk_count: usize,
    pub message: String,
}

impl IngestionReport {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: IngestionStatus::Error,
            document_count: 0,
            chunk_count: 0,
            message: message.into(),
        }
    }
}

/// Orchestrates chunking, embedding, and storage for document batches.
///
/// A batch is all-or-nothing: chunks from every document are embedded in one
/// pass and inserted in one call, and any stage failure aborts the batch
/// before anything reaches the store. Repeated ingestion does not
/// deduplicate; the expected pattern is clear-then-build.
pub struct IngestionPipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>) -> Self {
        Self { chunker, embedder }
    }

    /// Ingest a batch of extracted documents into `store`.
    ///
    /// Documents that produce no chunks are skipped (per-document failure);
    /// embedding or storage failures abort the whole batch with the store
    /// untouched. Every outcome is reported through the returned
    /// `IngestionReport` rather than an error.
    #[inline]
    pub async fn ingest(
        &self,
        store: &mut dyn VectorStore,
        documents: &[ExtractedDocument],
    ) -> IngestionReport {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut document_count = 0usize;

        for document in documents {
            match self
                .chunker
                .chunk(&document.text, &document.filename, document.doc_type)
            {
                Ok(document_chunks) => {
                    document_count += 1;
                    chunks.extend(document_chunks);
                }
                Err(QagenError::EmptyInput) => {
                    warn!("Skipping {}: no text after trimming", document.filename);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", document.filename, e);
                }
            }
        }

        if chunks.is_empty() {
            return IngestionReport::error("no valid documents to process");
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = match self.embedder.embed(&texts) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Embedding failed, aborting batch: {}", e);
                return IngestionReport::error(e.to_string());
            }
        };

        if vectors.len() != chunks.len() {
            return IngestionReport::error(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            ));
        }

        let created_at = Utc::now().to_rfc3339();
        let records: Vec<EmbeddingRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord {
                id: chunk.id,
                vector,
                content: chunk.content,
                metadata: chunk.metadata,
                created_at: created_at.clone(),
            })
            .collect();
        let chunk_count = records.len();

        if let Err(e) = store.insert(records).await {
            if matches!(e, QagenError::DimensionMismatch { .. }) {
                error!("Dimension mismatch during insert, aborting batch: {}", e);
            } else {
                warn!("Store insert failed, aborting batch: {}", e);
            }
            return IngestionReport::error(e.to_string());
        }

        info!(
            "Ingested {} documents into {} chunks",
            document_count, chunk_count
        );

        IngestionReport {
            status: IngestionStatus::Success,
            document_count,
            chunk_count,
            message: format!(
                "successfully ingested {document_count} documents with {chunk_count} chunks"
            ),
        }
    }
}
