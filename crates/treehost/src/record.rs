//! Recording decorator.
//!
//! [`RecordingHost`] wraps any host, appends one [`HostRecord`] per
//! primitive operation, then delegates unchanged. The record is appended
//! before the call, so failed operations are logged too.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumString};

use crate::error::HostResult;
use crate::ops::Host;
use crate::path::{HostPath, PathFragment};
use crate::types::{FileBuffer, HostCapabilities, Stats};
use crate::watch::{WatchOptions, WatchStream};

/// Operation kind of a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RecordKind {
    Write,
    Read,
    Delete,
    Rename,
    List,
    Exists,
    IsDirectory,
    IsFile,
    Stat,
    Watch,
}

/// One logged operation.
///
/// Serializes as `{"kind": "write", "path": "/a"}`, or
/// `{"kind": "rename", "from": "/a", "to": "/b"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostRecord {
    Write { path: HostPath },
    Read { path: HostPath },
    Delete { path: HostPath },
    Rename { from: HostPath, to: HostPath },
    List { path: HostPath },
    Exists { path: HostPath },
    IsDirectory { path: HostPath },
    IsFile { path: HostPath },
    Stat { path: HostPath },
    Watch { path: HostPath },
}

impl HostRecord {
    /// Build a single-path record.
    ///
    /// Returns `None` for `RecordKind::Rename`, which needs two paths; use
    /// [`HostRecord::rename`] for those.
    pub fn new(kind: RecordKind, path: HostPath) -> Option<Self> {
        Some(match kind {
            RecordKind::Write => Self::Write { path },
            RecordKind::Read => Self::Read { path },
            RecordKind::Delete => Self::Delete { path },
            RecordKind::Rename => return None,
            RecordKind::List => Self::List { path },
            RecordKind::Exists => Self::Exists { path },
            RecordKind::IsDirectory => Self::IsDirectory { path },
            RecordKind::IsFile => Self::IsFile { path },
            RecordKind::Stat => Self::Stat { path },
            RecordKind::Watch => Self::Watch { path },
        })
    }

    /// Build a rename record.
    pub fn rename(from: HostPath, to: HostPath) -> Self {
        Self::Rename { from, to }
    }

    /// The operation kind.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Write { .. } => RecordKind::Write,
            Self::Read { .. } => RecordKind::Read,
            Self::Delete { .. } => RecordKind::Delete,
            Self::Rename { .. } => RecordKind::Rename,
            Self::List { .. } => RecordKind::List,
            Self::Exists { .. } => RecordKind::Exists,
            Self::IsDirectory { .. } => RecordKind::IsDirectory,
            Self::IsFile { .. } => RecordKind::IsFile,
            Self::Stat { .. } => RecordKind::Stat,
            Self::Watch { .. } => RecordKind::Watch,
        }
    }

    /// The operated path; the source path for renames.
    pub fn path(&self) -> &HostPath {
        match self {
            Self::Rename { from, .. } => from,
            Self::Write { path }
            | Self::Read { path }
            | Self::Delete { path }
            | Self::List { path }
            | Self::Exists { path }
            | Self::IsDirectory { path }
            | Self::IsFile { path }
            | Self::Stat { path }
            | Self::Watch { path } => path,
        }
    }
}

/// Host decorator that logs every primitive operation.
///
/// Works over any backend; outcomes are never altered.
pub struct RecordingHost<H: ?Sized> {
    records: Mutex<Vec<HostRecord>>,
    delegate: Arc<H>,
}

impl<H: ?Sized> std::fmt::Debug for RecordingHost<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingHost")
            .field("records", &self.records.lock().len())
            .finish_non_exhaustive()
    }
}

impl<H: Host> RecordingHost<H> {
    /// Wrap an owned host.
    pub fn new(delegate: H) -> Self {
        Self::from_arc(Arc::new(delegate))
    }
}

impl<H: Host + ?Sized> RecordingHost<H> {
    /// Wrap a shared host.
    pub fn from_arc(delegate: Arc<H>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            delegate,
        }
    }

    /// The wrapped host.
    pub fn delegate(&self) -> &Arc<H> {
        &self.delegate
    }

    /// Snapshot of the log, in invocation order.
    pub fn records(&self) -> Vec<HostRecord> {
        self.records.lock().clone()
    }

    /// Empty the log.
    pub fn clear_records(&self) {
        self.records.lock().clear();
    }

    /// Number of logged operations.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    fn record(&self, record: HostRecord) {
        tracing::trace!(kind = %record.kind(), path = %record.path(), "host op");
        self.records.lock().push(record);
    }
}

#[async_trait]
impl<H: Host + ?Sized> Host for RecordingHost<H> {
    async fn write(&self, path: &HostPath, content: FileBuffer) -> HostResult<()> {
        self.record(HostRecord::Write { path: path.clone() });
        self.delegate.write(path, content).await
    }

    async fn read(&self, path: &HostPath) -> HostResult<FileBuffer> {
        self.record(HostRecord::Read { path: path.clone() });
        self.delegate.read(path).await
    }

    async fn delete(&self, path: &HostPath) -> HostResult<()> {
        self.record(HostRecord::Delete { path: path.clone() });
        self.delegate.delete(path).await
    }

    async fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()> {
        self.record(HostRecord::rename(from.clone(), to.clone()));
        self.delegate.rename(from, to).await
    }

    async fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>> {
        self.record(HostRecord::List { path: path.clone() });
        self.delegate.list(path).await
    }

    async fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>> {
        self.record(HostRecord::Stat { path: path.clone() });
        self.delegate.stat(path).await
    }

    async fn exists(&self, path: &HostPath) -> HostResult<bool> {
        self.record(HostRecord::Exists { path: path.clone() });
        self.delegate.exists(path).await
    }

    async fn is_directory(&self, path: &HostPath) -> HostResult<bool> {
        self.record(HostRecord::IsDirectory { path: path.clone() });
        self.delegate.is_directory(path).await
    }

    async fn is_file(&self, path: &HostPath) -> HostResult<bool> {
        self.record(HostRecord::IsFile { path: path.clone() });
        self.delegate.is_file(path).await
    }

    fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        self.record(HostRecord::Watch { path: path.clone() });
        self.delegate.watch(path, options)
    }

    fn capabilities(&self) -> HostCapabilities {
        self.delegate.capabilities()
    }
}
