use crate::corrupt;
use crate::error::Result;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use std::io::{Cursor, Read};

/// Default record-count interval between index samples.
pub const DEFAULT_STRIDE: usize = 16;

/// Sparse in-segment index: every stride-th key of a sorted run, paired with
/// that record's offset relative to the segment's data region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseIndex {
    entries: Vec<(Vec<u8>, u64)>,
}

impl SparseIndex {
    /// Builds an index by sampling every `stride`-th entry of a sorted key
    /// run. A stride of 0 falls back to [`DEFAULT_STRIDE`].
    pub fn build(keys: &[Vec<u8>], offsets: &[u64], stride: usize) -> Self {
        debug_assert_eq!(keys.len(), offsets.len());
        let stride = if stride == 0 { DEFAULT_STRIDE } else { stride };

        let mut entries = Vec::with_capacity(keys.len() / stride + 1);
        let mut i = 0;
        while i < keys.len() {
            entries.push((keys[i].clone(), offsets[i]));
            i += stride;
        }
        Self { entries }
    }

    /// Returns the data-region offset of the greatest sampled key <= `target`,
    /// or 0 if `target` precedes every sample. A target equal to a sampled
    /// key gets that key's own offset.
    pub fn seek(&self, target: &[u8]) -> u64 {
        let i = self
            .entries
            .partition_point(|(key, _)| key.as_slice() <= target);
        if i == 0 {
            return 0;
        }
        self.entries[i - 1].1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the index region: `u32 keyLen | keyBytes | u64 offset` per
    /// sample, big-endian.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        for (key, offset) in &self.entries {
            buf.write_u32::<BigEndian>(key.len() as u32).unwrap();
            buf.extend_from_slice(key);
            buf.write_u64::<BigEndian>(*offset).unwrap();
        }
    }

    /// Parses an index region, consuming `buf` to exhaustion.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        let mut entries = Vec::new();

        while (cursor.position() as usize) < buf.len() {
            let key_len = cursor
                .read_u32::<BigEndian>()
                .map_err(|_| corrupt!("sparse index: truncated key length"))?
                as usize;

            let remaining = buf.len() - cursor.position() as usize;
            if key_len > remaining {
                return Err(corrupt!(
                    "sparse index: key length {key_len} exceeds remaining {remaining} bytes"
                ));
            }

            let mut key = vec![0u8; key_len];
            cursor
                .read_exact(&mut key)
                .map_err(|_| corrupt!("sparse index: truncated key"))?;

            let offset = cursor
                .read_u64::<BigEndian>()
                .map_err(|_| corrupt!("sparse index: truncated offset"))?;

            entries.push((key, offset));
        }

        Ok(Self { entries })
    }
}
