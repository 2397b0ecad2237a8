// Embeddings module
// Maps text batches to fixed-dimension vectors via an embedding server

pub mod client;

pub use client::EmbeddingClient;

use crate::Result;

/// Maps batches of text to fixed-dimension vectors.
///
/// Implementations must preserve index alignment: output vector `i`
/// corresponds to input text `i`, with no reordering, and must be
/// deterministic for a fixed model and input.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model producing the vectors. Vectors from different
    /// models live in different spaces; after a model change the knowledge
    /// base must be rebuilt.
    fn model_id(&self) -> &str;
}
