//! Compaction planning and execution.
//!
//! The director selects at most one rewrite victim per invocation and
//! assembles the full input set for it; the executor merges those inputs
//! into one new segment and swaps it into the catalog. Both are synchronous:
//! the host decides when to tick, and ticks are expected to be serialized.

pub mod director;
pub mod executor;

pub use director::Director;
pub use executor::Executor;

use crate::segment::{Posture, SegmentMeta};

/// One planned rewrite.
///
/// `inputs` are ordered oldest to newest; the executor overwrites in plan
/// order, so the newest occurrence of a key (or its tombstone) survives the
/// merge.
#[derive(Debug, Clone)]
pub struct Plan {
    pub inputs: Vec<SegmentMeta>,
    pub output_posture: Posture,
    pub reason: String,
}
