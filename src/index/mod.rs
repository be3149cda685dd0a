//! Flat exact k-NN vector index with binary persistence.
//!
//! Vectors are stored row-major in one `Vec<f32>`; row `i` belongs to corpus
//! item `i`. Search is a linear scan under squared Euclidean distance.

pub mod builder;
pub mod format;

use std::collections::BinaryHeap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::error::{DraftError, Result};
use format::{IndexHeader, HEADER_SIZE, MAGIC, VERSION};

/// One search hit: corpus position and squared Euclidean distance.
pub type Neighbor = (usize, f32);

/// In-memory flat vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
    fingerprint: [u8; 32],
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` floats.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            fingerprint: [0; 32],
        }
    }

    /// Build a fresh index over `vectors`. Distance metric and dimension are
    /// fixed from here on.
    pub fn build(dimension: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new(dimension);
        index.add(vectors)?;
        Ok(index)
    }

    /// Append vectors. Existing rows keep their positions.
    ///
    /// Either all vectors are added or, on a dimension mismatch, none are.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(DraftError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        self.data.reserve(vectors.len() * self.dimension);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        Ok(())
    }

    /// Return up to `k` nearest rows, ascending by distance.
    ///
    /// Ties are broken by lower position, so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(DraftError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        // Max-heap of the best k so far; the worst candidate sits on top.
        let mut heap: BinaryHeap<(OrderedFloat<f32>, usize)> = BinaryHeap::with_capacity(k + 1);
        for (pos, row) in self.rows().enumerate() {
            let candidate = (OrderedFloat(squared_l2(query, row)), pos);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|(d, pos)| (pos, d.into_inner()))
            .collect())
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.max(1)
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Vector dimension fixed at construction.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The stored vector at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.rows().nth(position)
    }

    /// Fingerprint of the corpus the vectors were computed from.
    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint
    }

    /// Record the corpus fingerprint that gets persisted with the vectors.
    pub fn set_fingerprint(&mut self, fingerprint: [u8; 32]) {
        self.fingerprint = fingerprint;
    }

    fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// Write the index to `path` (via a temporary file, then rename).
    pub fn persist(&self, path: &Path) -> Result<()> {
        let header = IndexHeader {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            dimension: self.dimension as u64,
            vector_count: self.len() as u64,
            corpus_fingerprint: self.fingerprint,
        };

        let invalid = |reason: String| DraftError::InvalidIndex {
            path: path.to_path_buf(),
            reason,
        };
        let header_bytes =
            bincode::serialize(&header).map_err(|e| invalid(format!("Header encoding: {e}")))?;
        let vector_bytes =
            bincode::serialize(&self.data).map_err(|e| invalid(format!("Vector encoding: {e}")))?;

        // Pad header to HEADER_SIZE
        let mut padded_header = vec![0u8; HEADER_SIZE];
        let copy_len = header_bytes.len().min(HEADER_SIZE);
        padded_header[..copy_len].copy_from_slice(&header_bytes[..copy_len]);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DraftError::io(parent, e))?;
        }

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path).map_err(|e| DraftError::io(&tmp_path, e))?;
            file.write_all(&padded_header)
                .map_err(|e| DraftError::io(&tmp_path, e))?;
            file.write_all(&vector_bytes)
                .map_err(|e| DraftError::io(&tmp_path, e))?;
            file.flush().map_err(|e| DraftError::io(&tmp_path, e))?;
        }
        std::fs::rename(&tmp_path, path).map_err(|e| DraftError::io(path, e))?;

        debug!(
            path = %path.display(),
            vectors = self.len(),
            dimension = self.dimension,
            "Vector index written"
        );
        Ok(())
    }

    /// Load an index from `path`.
    ///
    /// Returns `Ok(None)` when the file is missing or not a current-version
    /// index. A valid header followed by an undecodable payload is an
    /// [`DraftError::InvalidIndex`].
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DraftError::io(path, e)),
        };

        if data.len() < HEADER_SIZE {
            debug!("Index file too small");
            return Ok(None);
        }

        let header: IndexHeader =
            bincode::deserialize(&data[..HEADER_SIZE]).map_err(|e| DraftError::InvalidIndex {
                path: path.to_path_buf(),
                reason: format!("Header deserialization failed: {e}"),
            })?;

        if let Err(reason) = header.validate() {
            debug!(reason = %reason, "Index header invalid");
            return Ok(None);
        }

        let vectors: Vec<f32> =
            bincode::deserialize(&data[HEADER_SIZE..]).map_err(|e| DraftError::InvalidIndex {
                path: path.to_path_buf(),
                reason: format!("Vector deserialization failed: {e}"),
            })?;

        let dimension = header.dimension as usize;
        let expected_floats = header
            .vector_count
            .checked_mul(header.dimension)
            .ok_or_else(|| DraftError::InvalidIndex {
                path: path.to_path_buf(),
                reason: format!(
                    "Header claims {} vectors of dimension {}",
                    header.vector_count, header.dimension
                ),
            })?;
        if vectors.len() as u64 != expected_floats {
            return Err(DraftError::InvalidIndex {
                path: path.to_path_buf(),
                reason: format!(
                    "Expected {} vectors of dimension {dimension}, found {} floats",
                    header.vector_count,
                    vectors.len()
                ),
            });
        }

        Ok(Some(Self {
            dimension,
            data: vectors,
            fingerprint: header.corpus_fingerprint,
        }))
    }
}

/// Squared Euclidean distance between two equal-length slices.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
