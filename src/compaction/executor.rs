use super::Plan;
use crate::error::Result;
use crate::segment::{KVEntry, SegmentMeta, SegmentReader, SegmentWriter};
use crate::tracker::Tracker;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Merges a plan's input segments into one new segment and swaps it into the
/// catalog.
pub struct Executor {
    tracker: Arc<Tracker>,
    reader: SegmentReader,
    writer: SegmentWriter,
}

impl Executor {
    pub fn new(tracker: Arc<Tracker>, reader: SegmentReader, writer: SegmentWriter) -> Self {
        Self {
            tracker,
            reader,
            writer,
        }
    }

    /// Executes one plan: scan every input in plan order into an accumulator
    /// where later inputs override earlier ones (last write wins by plan
    /// order), emit the merged run under the plan's posture, register it, and
    /// only then mark the inputs obsolete.
    ///
    /// Tombstones are preserved through the merge. Any scan or write error
    /// aborts before obsolescence is recorded, leaving every input live.
    pub fn execute(&self, plan: &Plan) -> Result<SegmentMeta> {
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for input in &plan.inputs {
            for entry in self.reader.scan(input)? {
                merged.insert(entry.key, entry.value);
            }
        }

        let entries: Vec<KVEntry> = merged
            .into_iter()
            .map(|(key, value)| KVEntry { key, value })
            .collect();

        let meta = self.writer.write_segment(&entries, plan.output_posture)?;
        let meta = self.tracker.register_segment(meta);

        for input in &plan.inputs {
            self.tracker.mark_obsolete(&input.id);
        }

        tracing::info!(
            inputs = plan.inputs.len(),
            new_segment = %meta.id,
            posture = %meta.posture,
            size = meta.length,
            reason = %plan.reason,
            "compaction complete"
        );

        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Posture, SegmentFile};
    use tempfile::TempDir;

    struct Harness {
        tracker: Arc<Tracker>,
        writer: SegmentWriter,
        reader: SegmentReader,
        executor: Executor,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let file =
            Arc::new(SegmentFile::open(dir.path().join("segments.data")).expect("open failed"));
        let tracker = Arc::new(Tracker::new());
        Harness {
            tracker: Arc::clone(&tracker),
            writer: SegmentWriter::new(Arc::clone(&file), 16),
            reader: SegmentReader::new(Arc::clone(&file)),
            executor: Executor::new(
                tracker,
                SegmentReader::new(Arc::clone(&file)),
                SegmentWriter::new(Arc::clone(&file), 16),
            ),
            _dir: dir,
        }
    }

    fn write_and_register(h: &Harness, entries: &[KVEntry], posture: Posture) -> SegmentMeta {
        let meta = h.writer.write_segment(entries, posture).unwrap();
        h.tracker.register_segment(meta)
    }

    #[test]
    fn test_single_input_rewrite_preserves_content() {
        let h = harness();
        let entries: Vec<KVEntry> = (0..500)
            .map(|i| KVEntry::put(format!("key-{i:06}"), format!("value-{i:06}")))
            .collect();
        let input = write_and_register(&h, &entries, Posture::Tiered);

        let plan = Plan {
            inputs: vec![input.clone()],
            output_posture: Posture::Leveled,
            reason: "test".to_string(),
        };
        let merged = h.executor.execute(&plan).unwrap();

        assert_eq!(merged.posture, Posture::Leveled);
        assert_eq!(h.reader.scan(&merged).unwrap(), entries);
        assert!(h.tracker.get(&input.id).unwrap().obsolete);
        assert_eq!(h.tracker.live_count(), 1);
    }

    #[test]
    fn test_last_write_wins_by_plan_order() {
        let h = harness();
        let old = write_and_register(
            &h,
            &[KVEntry::put("k", "old"), KVEntry::put("only-old", "x")],
            Posture::Tiered,
        );
        let new = write_and_register(&h, &[KVEntry::put("k", "new")], Posture::Tiered);

        let plan = Plan {
            inputs: vec![old, new],
            output_posture: Posture::Tiered,
            reason: "test".to_string(),
        };
        let merged = h.executor.execute(&plan).unwrap();

        assert_eq!(h.reader.get(&merged, b"k").unwrap(), Some(b"new".to_vec()));
        assert_eq!(
            h.reader.get(&merged, b"only-old").unwrap(),
            Some(b"x".to_vec())
        );
    }

    #[test]
    fn test_tombstone_survives_merge() {
        let h = harness();
        let old = write_and_register(&h, &[KVEntry::put("k", "v")], Posture::Tiered);
        let new = write_and_register(&h, &[KVEntry::tombstone("k")], Posture::Tiered);

        let plan = Plan {
            inputs: vec![old, new],
            output_posture: Posture::Leveled,
            reason: "test".to_string(),
        };
        let merged = h.executor.execute(&plan).unwrap();

        // The tombstone is carried, not dropped: the merged segment still
        // records the deletion explicitly.
        assert_eq!(
            h.reader.scan(&merged).unwrap(),
            vec![KVEntry::tombstone("k")]
        );
        assert_eq!(h.reader.get(&merged, b"k").unwrap(), None);
    }

    #[test]
    fn test_merged_output_is_sorted_and_ranged() {
        let h = harness();
        let a = write_and_register(
            &h,
            &[KVEntry::put("banana", "1"), KVEntry::put("date", "2")],
            Posture::Tiered,
        );
        let b = write_and_register(
            &h,
            &[KVEntry::put("apple", "3"), KVEntry::put("cherry", "4")],
            Posture::Tiered,
        );

        let plan = Plan {
            inputs: vec![a, b],
            output_posture: Posture::Leveled,
            reason: "test".to_string(),
        };
        let merged = h.executor.execute(&plan).unwrap();

        let scanned = h.reader.scan(&merged).unwrap();
        assert!(scanned.windows(2).all(|w| w[0].key < w[1].key));
        assert_eq!(merged.min_key, b"apple".to_vec());
        assert_eq!(merged.max_key, b"date".to_vec());
        assert_eq!(scanned.len(), 4);
    }

    #[test]
    fn test_overlap_closure_collapses_to_one_live_segment() {
        let h = harness();
        let mut inputs = Vec::new();
        for i in 0..8 {
            inputs.push(write_and_register(
                &h,
                &[
                    KVEntry::put("a", format!("v{i}")),
                    KVEntry::put("z", format!("w{i}")),
                ],
                Posture::Tiered,
            ));
        }
        assert_eq!(h.tracker.live_count(), 8);

        let plan = Plan {
            inputs, // registration order == oldest first here
            output_posture: Posture::Leveled,
            reason: "test".to_string(),
        };
        let merged = h.executor.execute(&plan).unwrap();

        assert_eq!(h.tracker.live_count(), 1);
        // Newest input wrote v7/w7; it must win.
        assert_eq!(h.reader.get(&merged, b"a").unwrap(), Some(b"v7".to_vec()));
        assert_eq!(h.reader.get(&merged, b"z").unwrap(), Some(b"w7".to_vec()));
        // The survivor overlaps nothing live.
        assert!(h.tracker.overlapping_segments(&merged).is_empty());
    }

    #[test]
    fn test_failed_plan_leaves_inputs_live() {
        let h = harness();
        let real = write_and_register(&h, &[KVEntry::put("k", "v")], Posture::Tiered);

        // A phantom input whose extent lies beyond the file: the scan fails
        // and nothing may change.
        let mut phantom = real.clone();
        phantom.id = "phantom".to_string();
        phantom.offset = real.length * 10;
        let phantom = h.tracker.register_segment(phantom);

        let plan = Plan {
            inputs: vec![real.clone(), phantom],
            output_posture: Posture::Leveled,
            reason: "test".to_string(),
        };
        assert!(h.executor.execute(&plan).is_err());

        assert!(!h.tracker.get(&real.id).unwrap().obsolete);
        assert_eq!(h.tracker.live_count(), 2);
    }
}
