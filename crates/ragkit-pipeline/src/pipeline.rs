use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, info};

use ragkit_core::config::{RetrievalSettings, Settings};
use ragkit_core::splitter::TextSplitter;
use ragkit_core::traits::{CorpusStore, Embedder, Generator, VectorIndex};
use ragkit_core::types::{AnswerEnvelope, DocId, Passage};
use ragkit_core::{Error, Result};
use ragkit_embed::embedder_from_settings;
use ragkit_generate::generator_from_settings;
use ragkit_vector::{DataLayout, FlatL2Index, JsonCorpusStore};

use crate::retriever::{read, write, Corpus, Retriever, SharedCorpus};

/// Ingest and answer over one corpus.
///
/// Ingests are not durable until [`persist`](Self::persist) is called.
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    corpus: SharedCorpus,
    retriever: Retriever,
    generator: Option<Arc<dyn Generator>>,
    layout: Option<DataLayout>,
    retrieval: RetrievalSettings,
}

impl Pipeline {
    pub fn from_parts(
        embedder: Arc<dyn Embedder>,
        index: Box<dyn VectorIndex>,
        store: Box<dyn CorpusStore>,
        layout: Option<DataLayout>,
    ) -> Self {
        let corpus = Arc::new(RwLock::new(Corpus { index, store }));
        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&corpus));
        Self { embedder, corpus, retriever, generator: None, layout, retrieval: RetrievalSettings::default() }
    }

    /// Empty corpus held in memory only.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        let index = Box::new(FlatL2Index::new(embedder.dim()));
        Self::from_parts(embedder, index, Box::new(JsonCorpusStore::new()), None)
    }

    /// Embedder plus the index and corpus files under `settings.data_dir`.
    /// No generator is built; see [`open_with_generator`](Self::open_with_generator).
    pub fn open(settings: &Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(embedder_from_settings(&settings.embedder)?);
        let layout = DataLayout::open(settings.data_dir())?;
        let index = FlatL2Index::open(layout.index_path(), embedder.dim())?;
        let store = JsonCorpusStore::open(layout.corpus_path())?;
        info!(data_dir = %layout.root().display(), entries = index.len(), docs = store.len(), "pipeline opened");
        Ok(Self::from_parts(embedder, Box::new(index), Box::new(store), Some(layout)).with_retrieval(settings.retrieval.clone()))
    }

    /// Like [`open`](Self::open) but never reads the existing files: writes
    /// an empty index and corpus over whatever `settings.data_dir` holds.
    pub fn create(settings: &Settings) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(embedder_from_settings(&settings.embedder)?);
        let layout = DataLayout::open(settings.data_dir())?;
        let dim = embedder.dim();
        let index = FlatL2Index::create(layout.index_path(), dim);
        let store = JsonCorpusStore::create(layout.corpus_path());
        let pipeline = Self::from_parts(embedder, Box::new(index), Box::new(store), Some(layout))
            .with_retrieval(settings.retrieval.clone());
        pipeline.persist()?;
        info!(dim, "created empty corpus");
        Ok(pipeline)
    }

    pub fn open_with_generator(settings: &Settings) -> Result<Self> {
        let generator: Arc<dyn Generator> = Arc::from(generator_from_settings(&settings.generator)?);
        Ok(Self::open(settings)?.with_generator(generator))
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalSettings) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn layout(&self) -> Option<&DataLayout> {
        self.layout.as_ref()
    }

    pub fn default_k(&self) -> usize {
        self.retrieval.top_k
    }

    /// Number of index entries.
    pub fn len(&self) -> Result<usize> {
        Ok(read(&self.corpus)?.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Embed `text` and store it under `id`. Re-ingesting an id overwrites
    /// its text and appends another index entry.
    pub fn ingest(&self, id: impl Into<DocId>, text: impl Into<String>) -> Result<()> {
        let (id, text) = (id.into(), text.into());
        let embedding = self.embedder.embed(&text)?;

        let mut corpus = write(&self.corpus)?;
        corpus.index.add(embedding, id.clone())?;
        corpus.store.put(id.clone(), text)?;
        debug!(id = %id, entries = corpus.index.len(), "ingested document");
        Ok(())
    }

    /// Split `text` and ingest each chunk as `{id}:{n}`. Returns the number of chunks.
    pub fn ingest_chunked(&self, id: &str, text: &str, splitter: &TextSplitter) -> Result<usize> {
        let chunks = splitter.split(text);
        let embeddings = self.embedder.embed_batch(&chunks)?;

        let mut corpus = write(&self.corpus)?;
        // Check every vector before touching the index so a bad batch adds nothing.
        let dim = corpus.index.dim();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
        }
        let n = chunks.len();
        for (i, (chunk, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let chunk_id = format!("{id}:{i}");
            corpus.index.add(embedding, chunk_id.clone())?;
            corpus.store.put(chunk_id, chunk)?;
        }
        debug!(id, chunks = n, "ingested chunked document");
        Ok(n)
    }

    /// Save the corpus store, then the index.
    pub fn persist(&self) -> Result<()> {
        let corpus = read(&self.corpus)?;
        corpus.store.save()?;
        corpus.index.save()?;
        info!(entries = corpus.index.len(), docs = corpus.store.len(), "persisted corpus");
        Ok(())
    }

    /// Replace the index and store with empty ones and persist them.
    pub fn reset(&self) -> Result<()> {
        let dim = self.embedder.dim();
        let (index, store): (Box<dyn VectorIndex>, Box<dyn CorpusStore>) = match &self.layout {
            Some(layout) => (
                Box::new(FlatL2Index::create(layout.index_path(), dim)),
                Box::new(JsonCorpusStore::create(layout.corpus_path())),
            ),
            None => (Box::new(FlatL2Index::new(dim)), Box::new(JsonCorpusStore::new())),
        };
        let mut corpus = write(&self.corpus)?;
        *corpus = Corpus { index, store };
        corpus.store.save()?;
        corpus.index.save()?;
        info!(dim, "reset corpus");
        Ok(())
    }

    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        self.retriever.retrieve_passages(query, k)
    }

    /// Retrieve up to `k` passages, generate an answer from them, and
    /// return it with a short preview of each passage.
    pub fn answer(&self, query: &str, k: usize) -> Result<AnswerEnvelope> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no generator configured".to_string()))?;

        let start = Instant::now();
        let passages = self.retriever.retrieve(query, k)?;
        let answer = generator.generate(query, &passages)?;
        let sources = passages
            .iter()
            .map(|p| preview(p, self.retrieval.preview_chars, &self.retrieval.preview_suffix))
            .collect();
        info!(
            generator = generator.name(),
            k,
            passages = passages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "answered query"
        );
        Ok(AnswerEnvelope { answer, sources })
    }
}

/// First `chars` characters of `text` followed by `suffix`.
pub fn preview(text: &str, chars: usize, suffix: &str) -> String {
    let mut out: String = text.chars().take(chars).collect();
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::preview;

    #[test]
    fn preview_counts_characters() {
        assert_eq!(preview("héllo wörld", 5, "..."), "héllo...");
        assert_eq!(preview("short", 200, "..."), "short...");
        assert_eq!(preview("", 10, "…"), "…");
    }
}
