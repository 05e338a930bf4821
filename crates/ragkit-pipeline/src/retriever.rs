use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use ragkit_core::traits::{CorpusStore, Embedder, VectorIndex};
use ragkit_core::types::Passage;
use ragkit_core::{Error, Result};

/// The index and the store it refers to. Mutated together under one lock
/// so a reader never sees an index entry whose text has not been put yet.
pub struct Corpus {
    pub index: Box<dyn VectorIndex>,
    pub store: Box<dyn CorpusStore>,
}

pub type SharedCorpus = Arc<RwLock<Corpus>>;

pub(crate) fn read(corpus: &SharedCorpus) -> Result<RwLockReadGuard<'_, Corpus>> {
    corpus.read().map_err(|_| Error::Operation("corpus lock poisoned".to_string()))
}

pub(crate) fn write(corpus: &SharedCorpus) -> Result<RwLockWriteGuard<'_, Corpus>> {
    corpus.write().map_err(|_| Error::Operation("corpus lock poisoned".to_string()))
}

/// Query text → closest stored passages.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    corpus: SharedCorpus,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, corpus: SharedCorpus) -> Self {
        Self { embedder, corpus }
    }

    /// Up to `k` passage texts, closest first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self.retrieve_passages(query, k)?.into_iter().map(|p| p.text).collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps ids and distances. Ids
    /// missing from the store are skipped, so fewer than `k` may come back.
    pub fn retrieve_passages(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let embedding = self.embedder.embed(query)?;
        let corpus = read(&self.corpus)?;
        let hits = corpus.index.search(&embedding, k)?;

        let mut passages = Vec::with_capacity(hits.len());
        for hit in hits {
            match corpus.store.get(&hit.id) {
                Ok(text) => passages.push(Passage { id: hit.id, distance: hit.distance, text }),
                Err(Error::NotFound(id)) => warn!(id = %id, "index entry has no stored text; skipping"),
                Err(e) => return Err(e),
            }
        }
        debug!(k, returned = passages.len(), "retrieved passages");
        Ok(passages)
    }
}
