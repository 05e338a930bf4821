//! Retrieval-augmented answering over an embedder, a vector index, a corpus
//! store, and a generator.

pub mod envelope;
pub mod pipeline;
pub mod retriever;

pub use envelope::{ChatResponse, PostId, PostRequest, PostResponse, PostStatus, QueryRequest};
pub use pipeline::{preview, Pipeline};
pub use retriever::{Corpus, Retriever, SharedCorpus};
