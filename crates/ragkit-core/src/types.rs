//! Domain types shared by the embedder, index, store, and pipeline crates.

use serde::{Deserialize, Serialize};

/// Caller-assigned document identifier. Unique per corpus.
pub type DocId = String;

/// Fixed-length vector produced by an [`Embedder`](crate::traits::Embedder).
pub type Embedding = Vec<f32>;

/// A unit of ingested text.
///
/// - `id`: caller-assigned identity; re-ingesting the same id overwrites the text
/// - `text`: raw content as posted or loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// One stored vector and the document it was derived from.
///
/// Every entry's `id` must resolve in the corpus store once both
/// containers are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: DocId,
    pub embedding: Embedding,
}

/// A single nearest-neighbor hit. `distance` is squared L2; lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: DocId,
    pub distance: f32,
}

/// Hits ordered by non-decreasing distance, at most `k` long.
pub type SearchResult = Vec<Neighbor>;

/// A retrieved passage with the text resolved from the corpus store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: DocId,
    pub distance: f32,
    pub text: String,
}

/// Answer to a single query plus the evidence shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEnvelope {
    pub answer: String,
    pub sources: Vec<String>,
}
