use crate::adaptive::{Controller, FsmController};
use crate::compaction::{Director, Executor};
use crate::config::Config;
use crate::error::Result;
use crate::flock::DirLock;
use crate::memtable::Memtable;
use crate::segment::{Posture, Probe, SegmentFile, SegmentMeta, SegmentReader, SegmentWriter};
use crate::tracker::Tracker;
use crate::wal::Wal;

use std::fs;
use std::sync::{Arc, Mutex};

const WAL_FILE: &str = "amethyst.wal";
const SEGMENT_FILE: &str = "segments.data";

/// The host engine: WAL-backed writes into the memtable, reads through the
/// memtable and the segment catalog, memtable flushes into tiered segments,
/// and a synchronous compaction tick.
///
/// Startup replays the WAL into a fresh memtable. Segments already present
/// in the data file are not rediscovered (there is no manifest); the WAL
/// covers everything that had not been flushed, which is the crate's
/// recovery contract.
pub struct Engine {
    config: Config,
    _lock: DirLock,
    wal: Mutex<Wal>,
    memtable: Memtable,
    tracker: Arc<Tracker>,
    writer: SegmentWriter,
    reader: SegmentReader,
    director: Director,
    executor: Executor,
}

impl Engine {
    /// Opens (or creates) a store in `config.dir`.
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.dir)?;
        let lock = DirLock::acquire(&config.dir)?;

        let wal = Wal::open(config.dir.join(WAL_FILE))?;
        let memtable = Memtable::new(config.max_memtable_size);
        let replayed = wal.read_all()?;
        let replay_count = replayed.len();
        for entry in replayed {
            match entry.value {
                Some(value) => memtable.put(entry.key, value),
                None => memtable.delete(entry.key),
            }
        }

        let file = Arc::new(SegmentFile::open(config.dir.join(SEGMENT_FILE))?);
        let tracker = Arc::new(Tracker::new());
        let controller: Arc<dyn Controller> =
            Arc::new(FsmController::new(config.adaptive.clone()));

        let writer = SegmentWriter::new(Arc::clone(&file), config.sparse_index_stride);
        let reader = SegmentReader::new(Arc::clone(&file));
        let director = Director::new(Arc::clone(&tracker), controller);
        let executor = Executor::new(
            Arc::clone(&tracker),
            SegmentReader::new(Arc::clone(&file)),
            SegmentWriter::new(Arc::clone(&file), config.sparse_index_stride),
        );

        tracing::info!(dir = ?config.dir, replayed = replay_count, "opened store");

        Ok(Self {
            config,
            _lock: lock,
            wal: Mutex::new(wal),
            memtable,
            tracker,
            writer,
            reader,
            director,
            executor,
        })
    }

    /// Writes a key-value pair: WAL first, then the memtable. Flushes when
    /// the memtable crosses its size threshold.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.wal.lock()?.log_put(key, value)?;
        self.memtable.put(key.to_vec(), value.to_vec());

        if self.memtable.should_flush() {
            self.flush()?;
        }
        Ok(())
    }

    /// Deletes a key by writing a tombstone.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.wal.lock()?.log_delete(key)?;
        self.memtable.delete(key.to_vec());

        if self.memtable.should_flush() {
            self.flush()?;
        }
        Ok(())
    }

    /// Reads a key: memtable first, then segments newest to oldest. Every
    /// segment consulted is charged one read, hit or miss. A tombstone in a
    /// newer source shadows older segments.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.memtable.get(key) {
            return Ok(value);
        }

        for segment in self.tracker.segments_for_key(key) {
            let probe = self.reader.probe(&segment, key)?;
            self.tracker.update_stats(&segment.id, 1, 0);

            match probe {
                Probe::Value(value) => return Ok(Some(value)),
                Probe::Tombstone => return Ok(None),
                Probe::Missing => continue,
            }
        }
        Ok(None)
    }

    /// Flushes the memtable into a new tiered segment and truncates the WAL.
    /// Returns `Ok(None)` when there was nothing to flush.
    pub fn flush(&self) -> Result<Option<SegmentMeta>> {
        let entries = self.memtable.drain_sorted();
        if entries.is_empty() {
            return Ok(None);
        }

        // Fresh flushes start tiered; the controller promotes them later if
        // their traffic warrants it.
        let meta = self.writer.write_segment(&entries, Posture::Tiered)?;
        let meta = self.tracker.register_segment(meta);

        self.wal.lock()?.truncate()?;

        tracing::info!(
            segment = %meta.id,
            entries = entries.len(),
            size = meta.length,
            "flushed memtable to segment"
        );
        Ok(Some(meta))
    }

    /// One synchronous compaction round: ask the director for a plan and, if
    /// it produced one, execute it. The host decides the cadence and is
    /// expected to serialize calls.
    pub fn compact_tick(&self) -> Result<Option<SegmentMeta>> {
        let Some(plan) = self.director.maybe_plan() else {
            return Ok(None);
        };

        match self.executor.execute(&plan) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    reason = %plan.reason,
                    "compaction failed; inputs stay live for the next tick"
                );
                Err(e)
            }
        }
    }

    /// The segment catalog, for hosts that charge external churn or inspect
    /// live segments.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
