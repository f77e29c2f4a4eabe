use crate::corrupt_wal;
use crate::error::{Error, Result};
use crate::segment::KVEntry;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc::Crc;

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MAGIC: u32 = 0x4157_414C; // "AWAL"
const VERSION: u16 = 1;

/// magic(4) + version(2) + entry_count(8) + checksum(8)
pub const HEADER_SIZE: usize = 22;

const CRC64: Crc<u64> = Crc::<u64>::new(&crc::CRC_64_ECMA_182);

/// Folds one record frame into the running log checksum by seeding a fresh
/// digest with the previous value. The chaining makes the checksum sensitive
/// to record order, so replays must fold frames in log order; it is not the
/// same value as a single-pass CRC over the whole record stream.
fn fold_frame(checksum: u64, frame: &[u8]) -> u64 {
    let mut digest = CRC64.digest_with_initial(checksum);
    digest.update(frame);
    digest.finalize()
}

/// Serializes one record exactly as it is laid out in the log:
/// `u32 keyLen | u32 valueLen | u8 tombstone | key | value`, big-endian.
/// The same bytes are appended and checksummed.
fn encode_frame(key: &[u8], value: Option<&[u8]>) -> Vec<u8> {
    let value_bytes = value.unwrap_or(&[]);
    let mut frame = Vec::with_capacity(9 + key.len() + value_bytes.len());
    frame.write_u32::<BigEndian>(key.len() as u32).unwrap();
    frame
        .write_u32::<BigEndian>(value_bytes.len() as u32)
        .unwrap();
    frame.push(value.is_none() as u8);
    frame.extend_from_slice(key);
    frame.extend_from_slice(value_bytes);
    frame
}

/// Write-ahead log for memtable durability.
///
/// Records share the segment data region's framing (see [`encode_frame`])
/// and are appended behind a fixed header. Every append is flushed and
/// fsynced; [`Wal::sync`] additionally rewrites the header with the current
/// entry count and chained CRC-64 checksum, so [`Wal::validate_checksum`]
/// only holds against a cleanly synced log.
pub struct Wal {
    file: File,
    writer: BufWriter<File>,
    checksum: u64,
    entry_count: u64,
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Header {
    entry_count: u64,
    checksum: u64,
}

impl Header {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.write_u32::<BigEndian>(MAGIC).unwrap();
        buf.write_u16::<BigEndian>(VERSION).unwrap();
        buf.write_u64::<BigEndian>(self.entry_count).unwrap();
        buf.write_u64::<BigEndian>(self.checksum).unwrap();
        buf
    }

    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader
            .read_u32::<BigEndian>()
            .map_err(|_| corrupt_wal!("truncated header"))?;
        if magic != MAGIC {
            return Err(corrupt_wal!("bad magic {magic:#010x}"));
        }
        let version = reader
            .read_u16::<BigEndian>()
            .map_err(|_| corrupt_wal!("truncated header"))?;
        if version != VERSION {
            return Err(corrupt_wal!("unsupported version {version}"));
        }
        let entry_count = reader
            .read_u64::<BigEndian>()
            .map_err(|_| corrupt_wal!("truncated header"))?;
        let checksum = reader
            .read_u64::<BigEndian>()
            .map_err(|_| corrupt_wal!("truncated header"))?;
        Ok(Self {
            entry_count,
            checksum,
        })
    }
}

impl Wal {
    /// Opens the log at `path`, creating an empty one if missing. Existing
    /// records are replayed once to rebuild the running checksum state.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        if file.metadata()?.len() == 0 {
            let header = Header {
                entry_count: 0,
                checksum: 0,
            };
            file.write_all(&header.encode())?;
            file.sync_all()?;
        } else {
            file.seek(SeekFrom::Start(0))?;
            Header::decode(&mut file)?;
        }

        // Independent handle for appends so header rewrites on `file` never
        // move the append cursor.
        let mut append_file = OpenOptions::new().write(true).open(&path)?;
        append_file.seek(SeekFrom::End(0))?;
        let writer = BufWriter::new(append_file);

        let mut wal = Self {
            file,
            writer,
            checksum: 0,
            entry_count: 0,
            path,
        };

        // Seed the running checksum from whatever records already exist.
        for entry in wal.read_all()? {
            let frame = encode_frame(&entry.key, entry.value.as_deref());
            wal.checksum = fold_frame(wal.checksum, &frame);
            wal.entry_count += 1;
        }

        Ok(wal)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Logs a write. Durable once this returns.
    pub fn log_put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(key, Some(value))
    }

    /// Logs a deletion tombstone. Durable once this returns.
    pub fn log_delete(&mut self, key: &[u8]) -> Result<()> {
        self.append(key, None)
    }

    fn append(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let frame = encode_frame(key, value);

        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        self.checksum = fold_frame(self.checksum, &frame);
        self.entry_count += 1;
        Ok(())
    }

    /// Replays every record in log order. EOF at a record boundary is the
    /// clean end of the log; EOF inside a record is a torn write.
    pub fn read_all(&self) -> Result<Vec<KVEntry>> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

        let mut entries = Vec::new();
        loop {
            let key_len = match reader.read_u32::<BigEndian>() {
                Ok(len) => len as usize,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(Error::from(e)),
            };
            let value_len = read_or_torn(reader.read_u32::<BigEndian>(), "value length")? as usize;
            let tombstone = read_or_torn(reader.read_u8(), "tombstone flag")? == 1;

            let mut key = vec![0u8; key_len];
            read_or_torn(reader.read_exact(&mut key), "key")?;
            let mut value = vec![0u8; value_len];
            read_or_torn(reader.read_exact(&mut value), "value")?;

            entries.push(KVEntry {
                key,
                value: if tombstone { None } else { Some(value) },
            });
        }

        Ok(entries)
    }

    /// Flushes pending appends and persists the header (entry count and
    /// running checksum).
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        let header = Header {
            entry_count: self.entry_count,
            checksum: self.checksum,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.encode())?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Refolds every record from disk and compares the result against the
    /// stored header. Only meaningful after [`Wal::sync`].
    pub fn validate_checksum(&self) -> Result<()> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(0))?;
        let header = Header::decode(&mut file)?;

        let mut checksum = 0u64;
        let mut count = 0u64;
        for entry in self.read_all()? {
            let frame = encode_frame(&entry.key, entry.value.as_deref());
            checksum = fold_frame(checksum, &frame);
            count += 1;
        }

        if count != header.entry_count || checksum != header.checksum {
            return Err(corrupt_wal!(
                "checksum mismatch: computed {checksum:#018x}/{count} entries, stored {:#018x}/{} entries",
                header.checksum,
                header.entry_count
            ));
        }
        Ok(())
    }

    /// Resets the log to empty. Called by the host after a memtable flush has
    /// made the logged entries durable in a segment.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.file.set_len(0)?;

        let header = Header {
            entry_count: 0,
            checksum: 0,
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.encode())?;
        self.file.sync_all()?;

        self.writer.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        self.checksum = 0;
        self.entry_count = 0;
        Ok(())
    }
}

fn read_or_torn<T>(result: std::io::Result<T>, what: &str) -> Result<T> {
    result.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => corrupt_wal!("torn record: unexpected EOF in {what}"),
        _ => Error::from(e),
    })
}
