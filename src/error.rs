use std::fmt::Display;

/// Amethyst errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// An IO error from the underlying segment or WAL file. Surfaced
    /// verbatim; there is no retry at this layer.
    Io(String),
    /// A segment's on-disk encoding failed validation: a length prefix
    /// running past the region end, an unknown posture byte, a truncated
    /// record, or a missing footer.
    CorruptSegment(String),
    /// A WAL record was torn or the stored checksum does not match the
    /// replayed contents.
    CorruptWal(String),
    /// The segment writer was invoked with zero entries. Nothing is written.
    EmptyInput,
    /// An explicit tracker lookup referenced a segment id that was never
    /// registered. Stat updates against unknown ids are silent no-ops and do
    /// not produce this error.
    UnknownSegment(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(msg) => write!(f, "io error: {msg}"),
            Error::CorruptSegment(msg) => write!(f, "corrupt segment: {msg}"),
            Error::CorruptWal(msg) => write!(f, "corrupt wal: {msg}"),
            Error::EmptyInput => write!(f, "segment writer called with no entries"),
            Error::UnknownSegment(id) => write!(f, "unknown segment: {id}"),
        }
    }
}

/// Constructs an Error::CorruptSegment for the given format string.
#[macro_export]
macro_rules! corrupt {
    ($($args:tt)*) => { $crate::error::Error::CorruptSegment(format!($($args)*)) };
}

/// Constructs an Error::CorruptWal for the given format string.
#[macro_export]
macro_rules! corrupt_wal {
    ($($args:tt)*) => { $crate::error::Error::CorruptWal(format!($($args)*)) };
}

/// An Amethyst Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::Io(err.to_string())
    }
}
