use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use ragkit_core::traits::CorpusStore;
use ragkit_core::types::DocId;
use ragkit_core::{Error, Result};

use crate::layout::write_atomic;

/// Id → text map. Keys are kept sorted so the same contents always
/// serialize to the same bytes.
#[derive(Debug, Default)]
pub struct JsonCorpusStore {
    docs: BTreeMap<DocId, String>,
    path: Option<PathBuf>,
}

impl JsonCorpusStore {
    /// In-memory store; `save` is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` if it exists, otherwise start empty. `save` writes back to `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let docs = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<BTreeMap<DocId, String>>(&bytes)
                .map_err(|e| Error::corrupt(&path, e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::persistence(&path, e)),
        };
        info!(path = %path.display(), docs = docs.len(), "opened corpus store");
        Ok(Self { docs, path: Some(path) })
    }

    /// Empty store that saves to `path`, ignoring any existing file.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self { docs: BTreeMap::new(), path: Some(path.into()) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.docs).map_err(|e| Error::Operation(format!("failed to serialize corpus: {e}")))
    }
}

impl CorpusStore for JsonCorpusStore {
    fn put(&mut self, id: DocId, text: String) -> Result<()> {
        self.docs.insert(id, text);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<String> {
        self.docs.get(id).cloned().ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn len(&self) -> usize {
        self.docs.len()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        write_atomic(path, &self.to_json()?)?;
        debug!(path = %path.display(), docs = self.docs.len(), "saved corpus store");
        Ok(())
    }
}
