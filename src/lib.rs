//! Amethyst: an embedded ordered key-value store with adaptive per-segment
//! compaction.
//!
//! Amethyst is a Log-Structured Merge tree whose on-disk segments each carry
//! their own compaction *posture*. A segment is either **tiered**
//! (append-friendly, tolerates key-range overlap with its neighbors) or
//! **leveled** (read-friendly, rewritten so its range overlaps no other live
//! segment), and a per-segment controller moves it between the two based on
//! the traffic it actually observes.
//!
//! # Architecture
//!
//! ```text
//!  Put/Delete          Get
//!      |                |
//!      v                v
//!  +-------+       +----------+        +---------------+
//!  |  WAL  |------>| Memtable |        |    Tracker    |  segment catalog,
//!  +-------+       +----------+        |  (newest-first|  traffic counters
//!                       | flush        +---------------+
//!                       v                 ^          |
//!                 +-----------+  register |          | elect victim
//!                 |  Segment  |-----------+          v
//!                 |  Writer   |               +------------+
//!                 +-----------+               | Controller |  pure policy
//!                       |                     +------------+
//!                       v                            |
//!              +----------------+   plan    +--------+-------+
//!              | Segment file   |<----------| Director  ->   |
//!              | (shared, mmap) |  execute  |      Executor  |
//!              +----------------+           +----------------+
//! ```
//!
//! All segments live back-to-back in one shared append-only file; each is a
//! sorted, immutable run with an in-segment sparse index. The director runs
//! synchronously when the host ticks it: it asks the controller about every
//! live segment, and for the first one elected it assembles the full input
//! set (the transitive overlap closure when the target posture is leveled).
//! The executor merges the inputs with last-write-wins semantics, emits one
//! new segment, and atomically swaps it into the catalog.
//!
//! # Recovery
//!
//! Write durability comes from the WAL: startup replays it into the
//! memtable. The segment catalog itself is in-memory only; rebuilding it
//! from the (self-describing) segment file is future work.

pub mod adaptive;
pub mod compaction;
pub mod config;
pub mod engine;
pub mod error;
pub mod flock;
pub mod memtable;
pub mod segment;
pub mod tracker;
pub mod wal;

pub use config::{AdaptiveConfig, Config};
pub use engine::Engine;
pub use error::{Error, Result};
pub use segment::{KVEntry, Posture, SegmentMeta};
pub use tracker::Tracker;
