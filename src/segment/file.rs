use crate::error::Result;

use memmap2::Mmap;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Append-only shared segment file.
///
/// All segments live back-to-back in this one file. The file handle and the
/// cached mmap view sit behind a single lock, so appenders (exclusive) and
/// readers (shared) order on exactly one lock and cannot deadlock against
/// each other. Appends invalidate the cached view; readers that already
/// hold an `Arc<Mmap>` keep a consistent view of the bytes that existed when
/// they acquired it, since a segment's extent is immutable once written.
pub struct SegmentFile {
    inner: RwLock<Inner>,
    path: PathBuf,
}

struct Inner {
    file: File,
    mmap: Option<Arc<Mmap>>,
}

impl SegmentFile {
    /// Opens the segment file at `path`, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            inner: RwLock::new(Inner { file, mmap: None }),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `data` at the end of the file and returns its placement as
    /// `(offset, length)`. The cached mmap view is dropped first so the next
    /// reader remaps at the new size.
    pub fn append(&self, data: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.inner.write()?;

        // Invalidate before the file grows. In-flight readers keep their Arc.
        inner.mmap.take();

        let offset = inner.file.metadata()?.len();
        inner.file.write_all(data)?;
        inner.file.sync_all()?;

        Ok((offset, data.len() as u64))
    }

    /// Positional read of exactly `length` bytes at `offset`. A short read is
    /// an error.
    pub fn read_at(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let inner = self.inner.read()?;
        let mut buf = vec![0u8; length as usize];

        #[cfg(unix)]
        inner.file.read_exact_at(&mut buf, offset)?;

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut clone = inner.file.try_clone()?;
            clone.seek(SeekFrom::Start(offset))?;
            clone.read_exact(&mut buf)?;
        }

        Ok(buf)
    }

    /// Returns the shared read-only mmap view, mapping lazily. The view
    /// covers the file as of the most recent append.
    pub fn mmap(&self) -> Result<Arc<Mmap>> {
        if let Some(view) = self.inner.read()?.mmap.as_ref() {
            return Ok(Arc::clone(view));
        }

        let mut inner = self.inner.write()?;
        // Another reader may have mapped while we waited for the write lock.
        if let Some(view) = inner.mmap.as_ref() {
            return Ok(Arc::clone(view));
        }

        if inner.file.metadata()?.len() == 0 {
            return Err(crate::error::Error::Io(format!(
                "cannot mmap empty segment file {:?}",
                self.path
            )));
        }

        let view =
            Arc::new(unsafe { Mmap::map(&inner.file) }.map_err(crate::error::Error::from)?);
        inner.mmap = Some(Arc::clone(&view));
        Ok(view)
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.inner.read()?.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
