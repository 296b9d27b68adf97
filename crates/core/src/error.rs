use std::fmt::{self, Display, Formatter};
use std::io;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A transcript position doesn't exist.
    OutOfRange,
    /// The durable storage rejected a write.
    Storage,
    /// The transcript couldn't be serialized.
    Serialize,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OutOfRange => write!(f, "Out of range"),
            ErrorKind::Storage => write!(f, "Storage error"),
            ErrorKind::Serialize => write!(f, "Serialization error"),
        }
    }
}

/// Error type for transcript operations.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    reason: String,
}

impl Error {
    /// Creates a new error with the `OutOfRange` kind.
    #[inline]
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self {
            kind: ErrorKind::OutOfRange,
            reason: format!("index {index} is out of range for length {len}"),
        }
    }

    /// Creates a new error with the `Storage` kind.
    #[inline]
    pub fn storage(err: io::Error) -> Self {
        Self {
            kind: ErrorKind::Storage,
            reason: err.to_string(),
        }
    }

    #[inline]
    pub(crate) fn serialize(err: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::Serialize,
            reason: err.to_string(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

impl std::error::Error for Error {}
