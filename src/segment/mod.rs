//! On-disk segment layer.
//!
//! A segment is an immutable, sorted run of key-value records stored inside
//! the shared append-only segment file, laid out as:
//!
//! ```text
//! [ u32 idLen | idBytes ]
//! [ u32 minKeyLen | minKeyBytes ]
//! [ u32 maxKeyLen | maxKeyBytes ]
//! [ u8 posture ]                  0 = tiered, 1 = leveled
//! [ u64 recordCount ]
//! ---- data region ----           dataStartOffset
//! [ u32 keyLen | u32 valueLen | u8 tombstone | keyBytes | valueBytes ]*
//! ---- sparse index region ----   sparseIndexOffset
//! [ u32 sampledKeyLen | sampledKeyBytes | u64 sampledOffset ]*
//! ---- footer ----
//! [ u64 sparseIndexOffset ]
//! ```
//!
//! All integers are big-endian. Sparse-index offsets are relative to the
//! data region; the two boundary offsets are relative to the segment start,
//! so a segment's encoding is independent of where it lands in the shared
//! file.

pub mod file;
pub mod index;
pub mod meta;
pub mod reader;
pub mod writer;

pub use file::SegmentFile;
pub use index::{SparseIndex, DEFAULT_STRIDE};
pub use meta::{unix_now, Posture, SegmentMeta};
pub use reader::{Probe, SegmentReader};
pub use writer::SegmentWriter;

/// One logical record. A `None` value is a tombstone: it suppresses older
/// writes of the same key during merges and reads as absent. An empty
/// `Some(vec![])` value is a present, zero-length value and round-trips as
/// such.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KVEntry {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

impl KVEntry {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}
