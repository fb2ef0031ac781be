//! Host error types.

use std::io;
use thiserror::Error;

/// Host error type.
///
/// Content operations (`read`, `write`, `delete`, `rename`) raise these when
/// their existence or type preconditions do not hold. Structural queries
/// never produce `FileNotFound`.
#[derive(Debug, Error)]
pub enum HostError {
    /// Path does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Path denotes a directory where a file was required.
    #[error("path is a directory: {0}")]
    PathIsDirectory(String),

    /// An ancestor of the path is a file.
    #[error("path is a file: {0}")]
    PathIsFile(String),

    /// Destination already holds a file.
    #[error("file already exists: {0}")]
    FileAlreadyExists(String),

    /// Malformed path, or a path that climbs above the root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The wrapped host did not resolve within the calling poll.
    #[error("host is not synchronous: {0} did not complete immediately")]
    InvalidSyncHost(&'static str),

    /// Host is read-only.
    #[error("host is read-only")]
    ReadOnly,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl HostError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    /// Create a PathIsDirectory error.
    pub fn path_is_directory(path: impl Into<String>) -> Self {
        Self::PathIsDirectory(path.into())
    }

    /// Create a PathIsFile error.
    pub fn path_is_file(path: impl Into<String>) -> Self {
        Self::PathIsFile(path.into())
    }

    /// Create a FileAlreadyExists error.
    pub fn file_already_exists(path: impl Into<String>) -> Self {
        Self::FileAlreadyExists(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns true for `FileNotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }
}

/// Convert HostError to std::io::Error for compatibility.
impl From<HostError> for io::Error {
    fn from(e: HostError) -> Self {
        match e {
            HostError::FileNotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            HostError::PathIsDirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            HostError::PathIsFile(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            HostError::FileAlreadyExists(msg) => {
                io::Error::new(io::ErrorKind::AlreadyExists, msg)
            }
            HostError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            HostError::InvalidSyncHost(op) => io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("{op} did not complete synchronously"),
            ),
            HostError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "host is read-only")
            }
            HostError::Io(e) => e,
            HostError::Other(msg) => io::Error::other(msg),
        }
    }
}

/// Host result type.
pub type HostResult<T> = Result<T, HostError>;
