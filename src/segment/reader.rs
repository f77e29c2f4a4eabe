use crate::corrupt;
use crate::error::Result;
use crate::segment::file::SegmentFile;
use crate::segment::meta::SegmentMeta;
use crate::segment::KVEntry;

use std::cmp::Ordering;
use std::sync::Arc;

/// Outcome of a point lookup against one segment.
///
/// A tombstone is distinct from plain absence: it shadows older segments'
/// values for the same key, so a multi-segment read path must stop at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Missing,
    Tombstone,
    Value(Vec<u8>),
}

/// Point-lookup and full-scan access to segments through the shared mmap
/// view.
///
/// The reader does not touch traffic counters; callers charge one read per
/// consulted segment against the tracker, whether or not the key was found.
pub struct SegmentReader {
    file: Arc<SegmentFile>,
}

impl SegmentReader {
    pub fn new(file: Arc<SegmentFile>) -> Self {
        Self { file }
    }

    /// Looks up `key` in the given segment.
    ///
    /// Returns `Ok(None)` for a key that is outside the segment's range, not
    /// present, or tombstoned. Callers walking multiple segments should use
    /// [`SegmentReader::probe`] instead, which keeps the tombstone case
    /// apart.
    pub fn get(&self, meta: &SegmentMeta, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.probe(meta, key)? {
            Probe::Value(value) => Ok(Some(value)),
            Probe::Missing | Probe::Tombstone => Ok(None),
        }
    }

    /// Three-way point lookup.
    ///
    /// Returns `Probe::Missing` when the key is outside the segment's range,
    /// not present, or when a record fails to parse mid-scan (the scan stops
    /// at the damage). Only a failure to acquire the mmap view is an `Err`.
    pub fn probe(&self, meta: &SegmentMeta, key: &[u8]) -> Result<Probe> {
        if !meta.contains_key(key) {
            return Ok(Probe::Missing);
        }

        let view = self.file.mmap()?;
        let data = data_region(&view, meta)?;

        let mut pos = meta.sparse_index.seek(key) as usize;
        while pos < data.len() {
            let Some(record) = parse_record(data, pos) else {
                // Damaged record; sorted order past this point is unknowable.
                return Ok(Probe::Missing);
            };

            match record.key.cmp(key) {
                Ordering::Less => pos = record.next,
                Ordering::Equal => {
                    if record.tombstone {
                        return Ok(Probe::Tombstone);
                    }
                    return Ok(Probe::Value(record.value.to_vec()));
                }
                // Keys are sorted; the target cannot appear further on.
                Ordering::Greater => return Ok(Probe::Missing),
            }
        }

        Ok(Probe::Missing)
    }

    /// Reads the entire data region in stored order, tombstones included.
    ///
    /// Unlike point lookups, a torn record here is a hard error: scans feed
    /// compaction, which must not silently drop the tail of a segment.
    pub fn scan(&self, meta: &SegmentMeta) -> Result<Vec<KVEntry>> {
        let view = self.file.mmap()?;
        let data = data_region(&view, meta)?;

        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let record = parse_record(data, pos).ok_or_else(|| {
                corrupt!(
                    "segment {}: truncated record at data offset {pos}",
                    meta.id
                )
            })?;

            entries.push(KVEntry {
                key: record.key.to_vec(),
                value: if record.tombstone {
                    None
                } else {
                    Some(record.value.to_vec())
                },
            });
            pos = record.next;
        }

        Ok(entries)
    }
}

/// Borrows the segment's data region out of the mmap view.
fn data_region<'a>(view: &'a [u8], meta: &SegmentMeta) -> Result<&'a [u8]> {
    let end = meta.offset + meta.length;
    if end > view.len() as u64 {
        return Err(corrupt!(
            "segment {} extends to {end} but file view is {} bytes",
            meta.id,
            view.len()
        ));
    }
    if meta.data_start_offset > meta.sparse_index_offset || meta.sparse_index_offset > meta.length {
        return Err(corrupt!(
            "segment {}: inconsistent region offsets {}..{}",
            meta.id,
            meta.data_start_offset,
            meta.sparse_index_offset
        ));
    }

    let segment = &view[meta.offset as usize..end as usize];
    Ok(&segment[meta.data_start_offset as usize..meta.sparse_index_offset as usize])
}

struct Record<'a> {
    key: &'a [u8],
    value: &'a [u8],
    tombstone: bool,
    next: usize,
}

/// Parses one record at `pos`; `None` if the record would run past the
/// region end.
fn parse_record(data: &[u8], pos: usize) -> Option<Record<'_>> {
    let header = data.get(pos..pos + 9)?;
    let key_len = u32::from_be_bytes(header[0..4].try_into().unwrap()) as usize;
    let value_len = u32::from_be_bytes(header[4..8].try_into().unwrap()) as usize;
    let tombstone = header[8] == 1;

    let key_start = pos + 9;
    let value_start = key_start + key_len;
    let next = value_start + value_len;

    let key = data.get(key_start..value_start)?;
    let value = data.get(value_start..next)?;

    Some(Record {
        key,
        value,
        tombstone,
        next,
    })
}
