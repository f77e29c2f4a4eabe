use super::Plan;
use crate::adaptive::Controller;
use crate::segment::{unix_now, Posture, SegmentMeta};
use crate::tracker::Tracker;

use std::collections::HashSet;
use std::sync::Arc;

/// Scans live segments and plans at most one rewrite per invocation.
pub struct Director {
    tracker: Arc<Tracker>,
    controller: Arc<dyn Controller>,
}

impl Director {
    pub fn new(tracker: Arc<Tracker>, controller: Arc<dyn Controller>) -> Self {
        Self {
            tracker,
            controller,
        }
    }

    /// Walks the catalog newest-first and returns a plan for the first
    /// segment the controller elects, or `None` when nothing qualifies.
    ///
    /// For a leveled target the plan's inputs are the victim's overlap
    /// closure, so the merged segment's range will intersect no surviving
    /// live segment. For a tiered target the victim is rewritten alone.
    pub fn maybe_plan(&self) -> Option<Plan> {
        let now = unix_now();

        for victim in self.tracker.all_segments() {
            let Some(rewrite) = self.controller.should_rewrite(&victim, now) else {
                continue;
            };

            tracing::debug!(
                victim = %victim.id,
                target = %rewrite.target,
                reason = %rewrite.reason,
                "director elected rewrite victim"
            );

            let inputs = match rewrite.target {
                Posture::Leveled => self.overlap_closure(victim),
                Posture::Tiered => vec![victim],
            };

            return Some(Plan {
                inputs,
                output_posture: rewrite.target,
                reason: rewrite.reason,
            });
        }

        None
    }

    /// Expands `{victim}` by repeatedly pulling in live segments that overlap
    /// any current member, to a fixed point. The result is ordered oldest to
    /// newest so the executor's in-order overwrite keeps the newest value for
    /// every key.
    fn overlap_closure(&self, victim: SegmentMeta) -> Vec<SegmentMeta> {
        let mut members: HashSet<String> = HashSet::new();
        members.insert(victim.id.clone());

        let mut frontier = vec![victim];
        while let Some(segment) = frontier.pop() {
            for other in self.tracker.overlapping_segments(&segment) {
                if members.insert(other.id.clone()) {
                    frontier.push(other);
                }
            }
        }

        let mut inputs: Vec<SegmentMeta> = self
            .tracker
            .all_segments()
            .into_iter()
            .filter(|segment| members.contains(&segment.id))
            .collect();
        inputs.reverse();
        inputs
    }
}
