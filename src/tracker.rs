use crate::error::{Error, Result};
use crate::segment::SegmentMeta;

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Authoritative catalog of live segments.
///
/// The tracker owns the canonical copy of every registered [`SegmentMeta`];
/// queries hand out clones, so a caller's snapshot stays self-consistent
/// while the catalog moves on underneath it. Only the traffic counters and
/// the obsolete flag mutate after registration.
pub struct Tracker {
    inner: RwLock<Inner>,
}

struct Inner {
    by_id: HashMap<String, SegmentMeta>,
    /// Live-first list in newest-first insertion order.
    ordered: VecDeque<String>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_id: HashMap::new(),
                ordered: VecDeque::new(),
            }),
        }
    }

    /// Registers a segment, computing its overlap count against the segments
    /// live at this moment. Returns the stored copy.
    ///
    /// Overlap counts of previously registered segments are not retroactively
    /// updated; they are point-in-time estimates.
    pub fn register_segment(&self, mut meta: SegmentMeta) -> SegmentMeta {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());

        meta.overlap_count = inner
            .by_id
            .values()
            .filter(|other| !other.obsolete && other.overlaps(&meta))
            .count() as u64;

        inner.ordered.push_front(meta.id.clone());
        inner.by_id.insert(meta.id.clone(), meta.clone());

        tracing::debug!(
            segment = %meta.id,
            posture = %meta.posture,
            overlaps = meta.overlap_count,
            "registered segment"
        );
        meta
    }

    /// Newest-first snapshot of all non-obsolete segments.
    pub fn all_segments(&self) -> Vec<SegmentMeta> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .ordered
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|meta| !meta.obsolete)
            .cloned()
            .collect()
    }

    /// Newest-first non-obsolete segments whose range contains `key`.
    pub fn segments_for_key(&self, key: &[u8]) -> Vec<SegmentMeta> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .ordered
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|meta| !meta.obsolete && meta.contains_key(key))
            .cloned()
            .collect()
    }

    /// Non-obsolete segments, other than `target` itself, whose range
    /// intersects the target's.
    pub fn overlapping_segments(&self, target: &SegmentMeta) -> Vec<SegmentMeta> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .ordered
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|meta| !meta.obsolete && meta.id != target.id && meta.overlaps(target))
            .cloned()
            .collect()
    }

    /// Marks a segment obsolete. Idempotent; unknown ids are ignored.
    pub fn mark_obsolete(&self, id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(meta) = inner.by_id.get_mut(id) {
            meta.obsolete = true;
        }
    }

    /// Adds to a segment's traffic counters. Unknown or obsolete ids are
    /// silent no-ops.
    pub fn update_stats(&self, id: &str, reads: u64, writes: u64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(meta) = inner.by_id.get_mut(id) {
            if meta.obsolete {
                return;
            }
            meta.read_count = meta.read_count.saturating_add(reads);
            meta.write_count = meta.write_count.saturating_add(writes);
        }
    }

    /// Snapshot of one segment by id, obsolete or not.
    pub fn get(&self, id: &str) -> Result<SegmentMeta> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownSegment(id.to_string()))
    }

    /// Number of live (non-obsolete) segments.
    pub fn live_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_id.values().filter(|meta| !meta.obsolete).count()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Posture, SparseIndex};
    use std::sync::Arc;

    fn meta(id: &str, min_key: &[u8], max_key: &[u8]) -> SegmentMeta {
        SegmentMeta {
            id: id.to_string(),
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
    fn test_register_counts_live_overlaps() {
        let tracker = Tracker::new();

        let a = tracker.register_segment(meta("a", b"a", b"m"));
        assert_eq!(a.overlap_count, 0);

        let b = tracker.register_segment(meta("b", b"k", b"z"));
        assert_eq!(b.overlap_count, 1);

        // Disjoint from both? No: "n".."p" overlaps b only.
        let c = tracker.register_segment(meta("c", b"n", b"p"));
        assert_eq!(c.overlap_count, 1);

        // Earlier counts are not retroactively updated.
        assert_eq!(tracker.get("a").unwrap().overlap_count, 0);
    }

    #[test]
    fn test_register_ignores_obsolete_for_overlap() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("a", b"a", b"z"));
        tracker.mark_obsolete("a");

        let b = tracker.register_segment(meta("b", b"a", b"z"));
        assert_eq!(b.overlap_count, 0);
    }

    #[test]
    fn test_all_segments_newest_first() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("first", b"a", b"b"));
        tracker.register_segment(meta("second", b"c", b"d"));
        tracker.register_segment(meta("third", b"e", b"f"));

        let ids: Vec<_> = tracker.all_segments().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_all_segments_skips_obsolete() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("a", b"a", b"b"));
        tracker.register_segment(meta("b", b"c", b"d"));
        tracker.mark_obsolete("a");

        let ids: Vec<_> = tracker.all_segments().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(tracker.live_count(), 1);
    }

    #[test]
    fn test_segments_for_key() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("low", b"a", b"m"));
        tracker.register_segment(meta("high", b"n", b"z"));
        tracker.register_segment(meta("wide", b"a", b"z"));

        let ids: Vec<_> = tracker
            .segments_for_key(b"c")
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["wide", "low"]);
    }

    #[test]
    fn test_overlapping_segments_excludes_target_and_obsolete() {
        let tracker = Tracker::new();
        let target = tracker.register_segment(meta("target", b"f", b"p"));
        tracker.register_segment(meta("left", b"a", b"g"));
        tracker.register_segment(meta("right", b"o", b"z"));
        tracker.register_segment(meta("outside", b"q", b"z"));
        tracker.register_segment(meta("dead", b"a", b"z"));
        tracker.mark_obsolete("dead");

        let mut ids: Vec<_> = tracker
            .overlapping_segments(&target)
            .into_iter()
            .map(|m| m.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["left", "right"]);
    }

    #[test]
    fn test_mark_obsolete_idempotent() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("a", b"a", b"b"));

        tracker.mark_obsolete("a");
        tracker.mark_obsolete("a");
        tracker.mark_obsolete("missing");

        assert!(tracker.get("a").unwrap().obsolete);
    }

    #[test]
    fn test_update_stats_accumulates() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("a", b"a", b"b"));

        tracker.update_stats("a", 3, 1);
        tracker.update_stats("a", 2, 0);

        let got = tracker.get("a").unwrap();
        assert_eq!(got.read_count, 5);
        assert_eq!(got.write_count, 1);
    }

    #[test]
    fn test_update_stats_unknown_or_obsolete_is_noop() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("a", b"a", b"b"));
        tracker.mark_obsolete("a");

        tracker.update_stats("missing", 1, 1);
        tracker.update_stats("a", 1, 1);

        let got = tracker.get("a").unwrap();
        assert_eq!(got.read_count, 0);
        assert_eq!(got.write_count, 0);
    }

    #[test]
    fn test_get_unknown_segment() {
        let tracker = Tracker::new();
        assert_eq!(
            tracker.get("nope"),
            Err(Error::UnknownSegment("nope".to_string()))
        );
    }

    #[test]
    fn test_snapshots_are_stable() {
        let tracker = Tracker::new();
        tracker.register_segment(meta("a", b"a", b"b"));

        let snapshot = tracker.all_segments();
        tracker.mark_obsolete("a");

        // The already-taken snapshot still sees the segment; a fresh query
        // does not.
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].obsolete);
        assert!(tracker.all_segments().is_empty());
    }
}
