// Text chunking module
// Splits extracted document text into overlapping bounded-length chunks


use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extractor::DocType;
use crate::{QagenError, Result};

/// Separator ladder tried in order when a segment exceeds the chunk size.
/// Coarser boundaries are preferred so splits do not sever words when a
/// paragraph, line, or sentence boundary is available.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Configuration for text chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Metadata carried by every chunk of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub doc_type: DocType,
    /// Position of this chunk within its source document, contiguous from 0.
    pub chunk_index: u32,
}

/// A retrievable unit of text with identity and provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `{filename}_{chunk_index}`
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Splits document text into chunks of at most `chunk_size` characters with
/// `chunk_overlap` characters shared between consecutive chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(QagenError::Config(
                "chunk_size must be at least 1".to_string(),
            ));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(QagenError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        })
    }

    /// Split `text` into chunks, attaching identity and source metadata.
    ///
    /// Fails with `EmptyInput` only when `text` trims to nothing; any other
    /// input yields at least one chunk. Re-chunking identical input with the
    /// same configuration yields identical output.
    #[inline]
    pub fn chunk(&self, text: &str, filename: &str, doc_type: DocType) -> Result<Vec<Chunk>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(QagenError::EmptyInput);
        }

        let pieces = self.split_pieces(trimmed);
        let contents = self.merge_pieces(pieces);

        debug!(
            "Chunked {} ({} chars) into {} chunks",
            filename,
            trimmed.chars().count(),
            contents.len()
        );

        Ok(contents
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk {
                id: format!("{filename}_{index}"),
                content,
                metadata: ChunkMetadata {
                    filename: filename.to_string(),
                    doc_type,
                    chunk_index: index as u32,
                },
            })
            .collect())
    }

    /// Break `text` into ordered pieces of at most `chunk_size` characters,
    /// trying each separator in the ladder before splitting a segment with
    /// the next finer one. Runs on an explicit worklist so inputs without any
    /// separator (one giant word) cannot exhaust the call stack.
    fn split_pieces(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut pending = vec![(text.to_string(), 0usize)];

        while let Some((segment, ladder)) = pending.pop() {
            if char_len(&segment) <= self.chunk_size {
                pieces.push(segment);
                continue;
            }

            match SEPARATORS.get(ladder) {
                Some(sep) if segment.contains(sep) => {
                    for part in split_keeping_separator(&segment, sep).into_iter().rev() {
                        pending.push((part, ladder + 1));
                    }
                }
                Some(_) => pending.push((segment, ladder + 1)),
                // Last resort: hard split on character boundaries.
                None => pieces.extend(split_every(&segment, self.chunk_size)),
            }
        }

        pieces
    }

    /// Greedily merge pieces into chunks up to `chunk_size`, carrying the
    /// last `chunk_overlap` characters of each finished chunk into the next.
    /// The carried overlap is shrunk from the front whenever keeping it whole
    /// would push the next chunk past the size limit.
    fn merge_pieces(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for piece in pieces {
            if !current.is_empty() && char_len(&current) + char_len(&piece) > self.chunk_size {
                if !current.trim().is_empty() {
                    chunks.push(current.trim().to_string());
                }

                let mut carried = tail_chars(&current, self.chunk_overlap);
                let piece_len = char_len(&piece);
                while !carried.is_empty() && char_len(&carried) + piece_len > self.chunk_size {
                    carried = skip_first_char(&carried);
                }
                current = carried;
            }

            current.push_str(&piece);
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split by `sep`, keeping the separator attached to the preceding part so no
/// characters are dropped. Empty leading parts collapse into the separator.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    let raw: Vec<&str> = text.split(sep).collect();
    let last = raw.len() - 1;

    let mut parts = Vec::with_capacity(raw.len());
    for (i, piece) in raw.iter().enumerate() {
        let mut owned = (*piece).to_string();
        if i < last {
            owned.push_str(sep);
        }
        if !owned.is_empty() {
            parts.push(owned);
        }
    }
    parts
}

/// Split into windows of exactly `size` characters (last one may be shorter).
fn split_every(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|window| window.iter().collect())
        .collect()
}

fn tail_chars(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let len = char_len(text);
    text.chars().skip(len.saturating_sub(count)).collect()
}

fn skip_first_char(text: &str) -> String {
    let mut chars = text.chars();
    chars.next();
    chars.as_str().to_string()
}
