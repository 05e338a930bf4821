//! Seams between the pipeline and its collaborators.
//!
//! Every trait is object safe; the pipeline holds `Arc<dyn Embedder>`,
//! `Box<dyn VectorIndex>`, `Box<dyn CorpusStore>` and `Arc<dyn Generator>`.

use crate::error::Result;
use crate::types::{DocId, Embedding, SearchResult};

pub trait Embedder: Send + Sync {
    /// Dimensionality of every vector this embedder returns.
    fn dim(&self) -> usize;

    /// Embed one text. Empty input must not fail; it may yield a zero vector.
    fn embed(&self, text: &str) -> Result<Embedding>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

pub trait VectorIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one entry. Never deduplicates.
    fn add(&mut self, embedding: Embedding, id: DocId) -> Result<()>;

    /// The `k` closest entries by squared L2, ties broken by insertion order.
    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult>;

    /// Write the index to its backing file, if it has one.
    fn save(&self) -> Result<()>;
}

pub trait CorpusStore: Send + Sync {
    /// Insert or overwrite the text for `id`.
    fn put(&mut self, id: DocId, text: String) -> Result<()>;

    /// Returns [`Error::NotFound`](crate::error::Error::NotFound) on a miss.
    fn get(&self, id: &str) -> Result<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the store to its backing file, if it has one. Never implicit.
    fn save(&self) -> Result<()>;
}

pub trait Generator: Send + Sync {
    /// Short label for logs, e.g. `remote:gpt-4o-mini` or `local:t5`.
    fn name(&self) -> &str;

    fn generate(&self, query: &str, context: &[String]) -> Result<String>;
}
