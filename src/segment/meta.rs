use crate::corrupt;
use crate::error::Result;
use crate::segment::index::SparseIndex;

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// How a segment participates in compaction.
///
/// Tiered segments tolerate key-range overlap with their neighbors and favor
/// cheap writes; leveled segments are rewritten so that their range overlaps
/// no other live leveled segment, favoring reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Tiered,
    Leveled,
}

impl Posture {
    pub fn as_byte(self) -> u8 {
        match self {
            Posture::Tiered => 0,
            Posture::Leveled => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Posture::Tiered),
            1 => Ok(Posture::Leveled),
            b => Err(corrupt!("unknown posture byte {b}")),
        }
    }
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Posture::Tiered => write!(f, "tiered"),
            Posture::Leveled => write!(f, "leveled"),
        }
    }
}

/// In-memory descriptor of one on-disk segment.
///
/// A segment is immutable once registered with the tracker; only the traffic
/// counters and the obsolete flag change afterwards, and those mutations
/// happen on the tracker's authoritative copy.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMeta {
    /// Globally unique id, UUID v4 textual form.
    pub id: String,

    /// Byte placement of this segment within the shared segment file.
    pub offset: u64,
    pub length: u64,

    /// Closed key range covered by this segment (lex order on raw bytes).
    pub min_key: Vec<u8>,
    pub max_key: Vec<u8>,

    pub posture: Posture,

    /// Point lookups that scanned this segment (hit or miss).
    pub read_count: u64,
    /// External churn charged against this segment.
    pub write_count: u64,
    /// Live segments intersecting this one's range at registration time.
    /// Point-in-time estimate; never retroactively updated.
    pub overlap_count: u64,

    /// Unix-second timestamps, equal at creation.
    pub created_at: i64,
    pub last_rewrite_at: i64,

    /// Terminal flag; once set, never cleared.
    pub obsolete: bool,

    pub sparse_index: Arc<SparseIndex>,

    /// Region boundaries, measured from the start of the segment.
    pub data_start_offset: u64,
    pub sparse_index_offset: u64,
}

impl SegmentMeta {
    /// On-disk size in bytes, as used by compaction decisions.
    pub fn size(&self) -> u64 {
        self.length
    }

    /// Reads per write; when the segment has no writes the read count itself
    /// is the ratio.
    pub fn read_write_ratio(&self) -> f64 {
        if self.write_count == 0 {
            return self.read_count as f64;
        }
        self.read_count as f64 / self.write_count as f64
    }

    /// True once `min_interval` seconds have passed since the last rewrite.
    pub fn cooldown_expired(&self, now: i64, min_interval: i64) -> bool {
        now - self.last_rewrite_at >= min_interval
    }

    /// Closed-interval intersection of the two key ranges.
    pub fn overlaps(&self, other: &SegmentMeta) -> bool {
        !(self.max_key < other.min_key || self.min_key > other.max_key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.min_key.as_slice() <= key && key <= self.max_key.as_slice()
    }
}

/// Current wall-clock time in unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_meta(min_key: &[u8], max_key: &[u8]) -> SegmentMeta {
        SegmentMeta {
            id: "test-segment".to_string(),
            offset: 0,
            length: 8192,
            min_key: min_key.to_vec(),
            max_key: max_key.to_vec(),
            posture: Posture::Tiered,
            read_count: 0,
            write_count: 0,
            overlap_count: 0,
            created_at: 1000,
            last_rewrite_at: 1000,
            obsolete: false,
            sparse_index: Arc::new(SparseIndex::default()),
            data_start_offset: 0,
            sparse_index_offset: 0,
        }
    }

    #[test]
    fn test_posture_byte_roundtrip() {
        assert_eq!(Posture::from_byte(Posture::Tiered.as_byte()).unwrap(), Posture::Tiered);
        assert_eq!(Posture::from_byte(Posture::Leveled.as_byte()).unwrap(), Posture::Leveled);
        assert!(Posture::from_byte(2).is_err());
    }

    #[test]
    fn test_read_write_ratio() {
        let mut meta = test_meta(b"a", b"z");
        meta.read_count = 20;
        meta.write_count = 5;
        assert_eq!(meta.read_write_ratio(), 4.0);

        meta.write_count = 0;
        assert_eq!(meta.read_write_ratio(), 20.0);
    }

    #[test]
    fn test_cooldown() {
        let meta = test_meta(b"a", b"z");
        assert!(!meta.cooldown_expired(1000, 1));
        assert!(meta.cooldown_expired(1001, 1));
        assert!(meta.cooldown_expired(1000, 0));
    }

    #[test]
    fn test_overlaps() {
        let a = test_meta(b"c", b"m");
        assert!(a.overlaps(&test_meta(b"a", b"d")));
        assert!(a.overlaps(&test_meta(b"m", b"z")));
        assert!(a.overlaps(&test_meta(b"e", b"g")));
        assert!(a.overlaps(&test_meta(b"a", b"z")));
        assert!(!a.overlaps(&test_meta(b"a", b"b")));
        assert!(!a.overlaps(&test_meta(b"n", b"z")));
    }

    #[test]
    fn test_contains_key() {
        let meta = test_meta(b"c", b"m");
        assert!(meta.contains_key(b"c"));
        assert!(meta.contains_key(b"h"));
        assert!(meta.contains_key(b"m"));
        assert!(!meta.contains_key(b"b"));
        assert!(!meta.contains_key(b"n"));
    }
}
