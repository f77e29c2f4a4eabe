use super::{Controller, Rewrite};
use crate::segment::{Posture, SegmentMeta};

/// Static tiered policy used as a benchmark baseline: segments stay tiered
/// and are merged only once write churn passes a fixed threshold.
pub struct StaticTieredController {
    pub write_count_threshold: u64,
    pub min_rewrite_interval_secs: i64,
}

impl Default for StaticTieredController {
    fn default() -> Self {
        Self {
            write_count_threshold: 50,
            min_rewrite_interval_secs: 1,
        }
    }
}

impl Controller for StaticTieredController {
    fn should_rewrite(&self, meta: &SegmentMeta, now: i64) -> Option<Rewrite> {
        if !meta.cooldown_expired(now, self.min_rewrite_interval_secs) {
            return None;
        }
        if meta.write_count > self.write_count_threshold {
            return Some(Rewrite {
                target: Posture::Tiered,
                reason: "baseline: static tiered merge".to_string(),
            });
        }
        None
    }
}

/// Static leveled policy used as a benchmark baseline: any fragmentation
/// (overlap at registration time, or a trickle of reads) triggers a leveled
/// merge.
pub struct StaticLeveledController {
    pub read_count_threshold: u64,
    pub min_rewrite_interval_secs: i64,
}

impl Default for StaticLeveledController {
    fn default() -> Self {
        Self {
            read_count_threshold: 10,
            min_rewrite_interval_secs: 1,
        }
    }
}

impl Controller for StaticLeveledController {
    fn should_rewrite(&self, meta: &SegmentMeta, now: i64) -> Option<Rewrite> {
        if !meta.cooldown_expired(now, self.min_rewrite_interval_secs) {
            return None;
        }
        if meta.overlap_count > 0 || meta.read_count > self.read_count_threshold {
            return Some(Rewrite {
                target: Posture::Leveled,
                reason: "baseline: static leveled merge".to_string(),
            });
        }
        None
    }
}
