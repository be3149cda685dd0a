//! Binary vector index file format.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ HEADER (128 bytes, fixed)            │
//! │  magic: [u8; 8] = b"RDRAFTVI"        │
//! │  version: u32                        │
//! │  flags: u32                          │
//! │  dimension: u64                      │
//! │  vector_count: u64                   │
//! │  corpus_fingerprint: [u8; 32]        │
//! │  (padding to 128 bytes)              │
//! ├──────────────────────────────────────┤
//! │ VECTORS (variable)                   │
//! │  bincode-serialized flat Vec<f32>    │
//! │  (vector_count * dimension floats)   │
//! └──────────────────────────────────────┘
//! ```

/// Magic bytes identifying a replydraft vector index file.
pub const MAGIC: &[u8; 8] = b"RDRAFTVI";

/// Current index format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 128;

/// Serializable index header.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct IndexHeader {
    /// Magic bytes (must equal [`MAGIC`]).
    pub magic: [u8; 8],
    /// Format version (must equal [`VERSION`]).
    pub version: u32,
    /// Reserved flags (currently unused).
    pub flags: u32,
    /// Length of every stored vector.
    pub dimension: u64,
    /// Number of stored vectors.
    pub vector_count: u64,
    /// SHA-256 over the embedder identity and the corpus items the vectors
    /// were computed from.
    pub corpus_fingerprint: [u8; 32],
}

impl IndexHeader {
    /// Validate that the header is well-formed and matches the current format.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.magic != *MAGIC {
            return Err("Invalid magic bytes".into());
        }
        if self.version != VERSION {
            return Err(format!(
                "Incompatible version: expected {VERSION}, found {}",
                self.version
            ));
        }
        if self.dimension == 0 {
            return Err("Zero dimension".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fits_in_fixed_size() {
        let header = IndexHeader {
            magic: *MAGIC,
            version: VERSION,
            flags: 0,
            dimension: 384,
            vector_count: u64::MAX,
            corpus_fingerprint: [0xff; 32],
        };
        let bytes = bincode::serialize(&header).unwrap();
        assert!(bytes.len() <= HEADER_SIZE);
    }

    #[test]
    fn test_validate_rejects_bad_magic() {
        let header = IndexHeader {
            magic: *b"MBOXTUI\0",
            version: VERSION,
            flags: 0,
            dimension: 8,
            vector_count: 0,
            corpus_fingerprint: [0; 32],
        };
        assert!(header.validate().is_err());
    }
}
