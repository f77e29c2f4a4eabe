use crate::error::{Error, Result};
use crate::segment::file::SegmentFile;
use crate::segment::index::SparseIndex;
use crate::segment::meta::{unix_now, Posture, SegmentMeta};
use crate::segment::KVEntry;

use byteorder::{BigEndian, WriteBytesExt};
use uuid::Uuid;

use std::sync::Arc;

/// Serializes sorted entry runs into self-describing segments.
pub struct SegmentWriter {
    file: Arc<SegmentFile>,
    stride: usize,
}

impl SegmentWriter {
    pub fn new(file: Arc<SegmentFile>, stride: usize) -> Self {
        Self { file, stride }
    }

    /// Writes `entries` as one segment under the given posture and returns
    /// its metadata. The input must be strictly ascending by key with no
    /// duplicates; an empty input writes nothing and fails with
    /// [`Error::EmptyInput`].
    ///
    /// The whole segment is serialized into one buffer and appended in a
    /// single call, so a segment is either fully present in the file or not
    /// at all.
    pub fn write_segment(&self, entries: &[KVEntry], posture: Posture) -> Result<SegmentMeta> {
        if entries.is_empty() {
            return Err(Error::EmptyInput);
        }
        debug_assert!(
            entries.windows(2).all(|w| w[0].key < w[1].key),
            "segment writer input must be strictly ascending"
        );

        let id = Uuid::new_v4().to_string();
        let min_key = entries[0].key.clone();
        let max_key = entries[entries.len() - 1].key.clone();

        let mut buf = Vec::new();
        write_len_prefixed(&mut buf, id.as_bytes());
        write_len_prefixed(&mut buf, &min_key);
        write_len_prefixed(&mut buf, &max_key);
        buf.push(posture.as_byte());
        buf.write_u64::<BigEndian>(entries.len() as u64).unwrap();

        let data_start_offset = buf.len() as u64;

        // Data region, collecting per-record offsets for the sparse index.
        let mut keys = Vec::with_capacity(entries.len());
        let mut offsets = Vec::with_capacity(entries.len());
        for entry in entries {
            offsets.push(buf.len() as u64 - data_start_offset);
            keys.push(entry.key.clone());

            let value = entry.value.as_deref().unwrap_or(&[]);
            buf.write_u32::<BigEndian>(entry.key.len() as u32).unwrap();
            buf.write_u32::<BigEndian>(value.len() as u32).unwrap();
            buf.push(entry.is_tombstone() as u8);
            buf.extend_from_slice(&entry.key);
            buf.extend_from_slice(value);
        }

        let sparse_index_offset = buf.len() as u64;
        let sparse_index = SparseIndex::build(&keys, &offsets, self.stride);
        sparse_index.encode_into(&mut buf);

        buf.write_u64::<BigEndian>(sparse_index_offset).unwrap();

        let (offset, length) = self.file.append(&buf)?;
        let now = unix_now();

        Ok(SegmentMeta {
            id,
            offset,
            length,
            min_key,
            max_key,
            posture,
            read_count: 0,
            write_count: 0,
            overlap_count: 0,
            created_at: now,
            last_rewrite_at: now,
            obsolete: false,
            sparse_index: Arc::new(sparse_index),
            data_start_offset,
            sparse_index_offset,
        })
    }
}

fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.write_u32::<BigEndian>(bytes.len() as u32).unwrap();
    buf.extend_from_slice(bytes);
}
