use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use ragkit_core::{Error, Result};

pub const INDEX_FILE: &str = "index.flat";
pub const CORPUS_FILE: &str = "corpus.json";

/// File names under a data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Creates `root` if it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| Error::persistence(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn corpus_path(&self) -> PathBuf {
        self.root.join(CORPUS_FILE)
    }
}

/// Replace `path` with `bytes` via a synced temp file in the same
/// directory, so readers see either the old or the new contents.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::persistence(path, e))?;
    tmp.write_all(bytes).map_err(|e| Error::persistence(path, e))?;
    tmp.as_file().sync_all().map_err(|e| Error::persistence(path, e))?;
    tmp.persist(path).map_err(|e| Error::persistence(path, e.error))?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}
