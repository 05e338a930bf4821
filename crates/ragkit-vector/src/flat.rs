//! Brute-force squared-L2 index.
//!
//! `index.flat` is a bincode (standard config) encoding of `StoredIndex`:
//! an 8-byte magic, the dimension, the ids in insertion order and the
//! row-major vectors.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bincode::config::standard as bincode_config;
use bincode::{decode_from_slice, encode_to_vec, Decode, Encode};
use tracing::{debug, info};

use ragkit_core::traits::VectorIndex;
use ragkit_core::types::{DocId, Embedding, IndexEntry, Neighbor, SearchResult};
use ragkit_core::{Error, Result};

use crate::layout::write_atomic;

const MAGIC: &[u8; 8] = b"RKFLAT01";

#[derive(Debug)]
pub struct FlatL2Index {
    dim: usize,
    ids: Vec<DocId>,
    /// Row-major, `ids.len() * dim` values.
    vectors: Vec<f32>,
    path: Option<PathBuf>,
}

impl FlatL2Index {
    /// In-memory index; `save` is a no-op.
    pub fn new(dim: usize) -> Self {
        Self { dim, ids: Vec::new(), vectors: Vec::new(), path: None }
    }

    /// Load `path` if it exists, otherwise start empty. A stored dimension
    /// different from `dim` is a `DimensionMismatch`.
    pub fn open(path: impl Into<PathBuf>, dim: usize) -> Result<Self> {
        let path = path.into();
        let mut index = match fs::read(&path) {
            Ok(bytes) => Self::decode(&bytes, &path)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::new(dim),
            Err(e) => return Err(Error::persistence(&path, e)),
        };
        if index.dim != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: index.dim });
        }
        info!(path = %path.display(), dim, entries = index.len(), "opened vector index");
        index.path = Some(path);
        Ok(index)
    }

    /// Empty index that saves to `path`, ignoring any existing file.
    pub fn create(path: impl Into<PathBuf>, dim: usize) -> Self {
        Self { path: Some(path.into()), ..Self::new(dim) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        self.ids.iter().zip(self.vectors.chunks_exact(self.dim.max(1))).map(|(id, v)| IndexEntry {
            id: id.clone(),
            embedding: v.to_vec(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let stored = StoredIndex {
            magic: *MAGIC,
            dim: self.dim as u32,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
        };
        encode_to_vec(&stored, bincode_config())
            .map_err(|e| Error::Operation(format!("failed to encode vector index: {e}")))
    }

    /// Parse the on-disk format. `path` is only used in error messages.
    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        let (stored, read): (StoredIndex, usize) =
            decode_from_slice(bytes, bincode_config()).map_err(|e| Error::corrupt(path, e.to_string()))?;
        if stored.magic != *MAGIC {
            return Err(Error::corrupt(path, "bad magic"));
        }
        if read != bytes.len() {
            return Err(Error::corrupt(path, format!("{} trailing bytes", bytes.len() - read)));
        }
        let dim = stored.dim as usize;
        if stored.ids.len().checked_mul(dim) != Some(stored.vectors.len()) {
            return Err(Error::corrupt(
                path,
                format!("{} ids but {} values at dim {dim}", stored.ids.len(), stored.vectors.len()),
            ));
        }
        Ok(Self { dim, ids: stored.ids, vectors: stored.vectors, path: None })
    }
}

/// On-disk shape of `index.flat`.
#[derive(Encode, Decode)]
struct StoredIndex {
    magic: [u8; 8],
    dim: u32,
    ids: Vec<DocId>,
    /// Row-major, `ids.len() * dim` values.
    vectors: Vec<f32>,
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorIndex for FlatL2Index {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn add(&mut self, embedding: Embedding, id: DocId) -> Result<()> {
        if embedding.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: embedding.len() });
        }
        self.vectors.extend_from_slice(&embedding);
        self.ids.push(id);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dim.max(1))
            .map(|v| squared_l2(query, v))
            .enumerate()
            .collect();
        // Stable: equal distances keep insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(i, distance)| Neighbor { id: self.ids[i].clone(), distance })
            .collect())
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else { return Ok(()) };
        write_atomic(path, &self.encode()?)?;
        debug!(path = %path.display(), entries = self.ids.len(), "saved vector index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_truncated_file() {
        let mut index = FlatL2Index::new(2);
        index.add(vec![1.0, 2.0], "a".into()).unwrap();
        let bytes = index.encode().unwrap();
        let err = FlatL2Index::decode(&bytes[..bytes.len() - 3], Path::new("x")).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut bytes = FlatL2Index::new(2).encode().unwrap();
        bytes[0] = b'X';
        let err = FlatL2Index::decode(&bytes, Path::new("x")).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn decode_rejects_vectors_that_do_not_fill_the_rows() {
        let stored = StoredIndex { magic: *MAGIC, dim: 3, ids: vec!["a".into(), "b".into()], vectors: vec![0.0; 4] };
        let bytes = encode_to_vec(&stored, bincode_config()).unwrap();
        let err = FlatL2Index::decode(&bytes, Path::new("x")).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }), "got {err:?}");
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = FlatL2Index::new(2).encode().unwrap();
        bytes.push(0);
        let err = FlatL2Index::decode(&bytes, Path::new("x")).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn encoded_index_keeps_order_and_dimension() {
        let mut index = FlatL2Index::new(3);
        index.add(vec![0.0, 0.5, 1.0], "doc".into()).unwrap();
        index.add(vec![2.0, 2.5, 3.0], "other".into()).unwrap();
        let bytes = index.encode().unwrap();
        assert_eq!(&bytes[..8], MAGIC);

        let back = FlatL2Index::decode(&bytes, Path::new("x")).unwrap();
        assert_eq!(back.dim(), 3);
        let entries: Vec<_> = back.entries().collect();
        assert_eq!(entries[0].id, "doc");
        assert_eq!(entries[1].embedding, vec![2.0, 2.5, 3.0]);
    }
}
