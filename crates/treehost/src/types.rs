//! Core host value types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::SystemTime;

/// Immutable file content.
///
/// Cloning is cheap: the bytes are shared, never copied. Writers replace a
/// stored buffer wholesale.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct FileBuffer(Arc<[u8]>);

impl FileBuffer {
    /// Create a buffer from raw bytes.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    /// The content as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for empty content.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the content as UTF-8.
    pub fn to_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }
}

impl Deref for FileBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for FileBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FileBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Ok(text) if text.len() <= 64 => write!(f, "FileBuffer({text:?})"),
            _ => write!(f, "FileBuffer(<{} bytes>)", self.0.len()),
        }
    }
}

impl From<Vec<u8>> for FileBuffer {
    fn from(v: Vec<u8>) -> Self {
        Self(v.into())
    }
}

impl From<&[u8]> for FileBuffer {
    fn from(v: &[u8]) -> Self {
        Self(v.into())
    }
}

impl<const N: usize> From<&[u8; N]> for FileBuffer {
    fn from(v: &[u8; N]) -> Self {
        Self(v.as_slice().into())
    }
}

impl From<&str> for FileBuffer {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().into())
    }
}

impl From<String> for FileBuffer {
    fn from(s: String) -> Self {
        Self(s.into_bytes().into())
    }
}

impl PartialEq<[u8]> for FileBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for FileBuffer {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

/// Node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory (stored or implicit).
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Metadata for a path, computed at stat time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    /// Node kind.
    pub kind: FileType,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Creation time.
    pub created: SystemTime,
    /// Last modification time.
    pub modified: SystemTime,
    /// Backend-specific fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Stats {
    /// Stats for a file.
    pub fn file(size: u64, created: SystemTime, modified: SystemTime) -> Self {
        Self {
            kind: FileType::File,
            size,
            created,
            modified,
            extra: BTreeMap::new(),
        }
    }

    /// Stats for a directory.
    pub fn directory(created: SystemTime, modified: SystemTime) -> Self {
        Self {
            kind: FileType::Directory,
            size: 0,
            created,
            modified,
            extra: BTreeMap::new(),
        }
    }

    /// Attach a backend-specific field.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// What a backend can promise about its operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Every operation resolves within the poll that starts it.
    pub synchronous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_buffer_conversions() {
        let buf = FileBuffer::from("hello");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.to_text().unwrap(), "hello");
        assert_eq!(buf, FileBuffer::from(b"hello".to_vec()));
        assert_eq!(buf.as_bytes(), b"hello");
        assert!(buf == b"hello".as_slice());
        assert!(FileBuffer::default().is_empty());
    }

    #[test]
    fn test_file_buffer_clone_shares_bytes() {
        let a = FileBuffer::from("shared");
        let b = a.clone();
        assert!(std::ptr::eq(a.as_bytes().as_ptr(), b.as_bytes().as_ptr()));
    }

    #[test]
    fn test_file_buffer_debug() {
        assert_eq!(format!("{:?}", FileBuffer::from("hi")), "FileBuffer(\"hi\")");
        let binary = FileBuffer::from(vec![0xffu8, 0xfe]);
        assert_eq!(format!("{binary:?}"), "FileBuffer(<2 bytes>)");
    }

    #[test]
    fn test_stats_constructors() {
        let now = SystemTime::now();
        let file = Stats::file(12, now, now).with_extra("backend", "memory");
        assert!(file.is_file());
        assert_eq!(file.size, 12);
        assert_eq!(file.extra.get("backend").map(String::as_str), Some("memory"));

        let dir = Stats::directory(now, now);
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
    }
}
