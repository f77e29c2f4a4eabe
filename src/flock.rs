use crate::error::{Error, Result};

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

const LOCK_FILE: &str = "amethyst.lock";

/// Exclusive advisory lock on a store directory.
///
/// Acquiring creates (or reuses) `amethyst.lock` inside the directory and
/// takes an OS-level exclusive lock on it, so two engines can never open the
/// same store. The file is stamped with the holder's pid for post-mortem
/// debugging. The OS releases the lock when the handle drops; the stamp file
/// itself is left behind, since removing it would race a concurrent
/// acquirer and a stale stamp with no lock held is harmless.
pub struct DirLock {
    _file: File,
    path: PathBuf,
}

impl DirLock {
    /// Locks `dir` for this process, failing fast if another process holds
    /// it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);

        // Lock before touching the contents: truncating up front would wipe
        // the current holder's stamp on a failed acquire.
        let mut file = OpenOptions::new().create(true).write(true).open(&path)?;
        if let Err(e) = Self::try_exclusive(&file) {
            return Err(Error::Io(format!(
                "store directory {dir:?} is locked by another process: {e}"
            )));
        }

        file.set_len(0)?;
        writeln!(file, "amethyst pid={}", std::process::id())?;
        file.flush()?;

        Ok(Self { _file: file, path })
    }

    /// flock(2) with LOCK_NB: report the conflict instead of queueing behind
    /// the current holder.
    #[cfg(unix)]
    fn try_exclusive(file: &File) -> io::Result<()> {
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    // Non-unix platforms run unlocked; the store is unix-first.
    #[cfg(not(unix))]
    fn try_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
