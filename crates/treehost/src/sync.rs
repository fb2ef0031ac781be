//! Blocking call surface over any host.
//!
//! [`SyncDelegateHost`] polls each of the wrapped host's futures exactly
//! once. Backends whose operations complete within that first poll (the
//! in-memory host) get a plain blocking API. Hosts whose capabilities are not
//! `synchronous` are refused up front, and anything that still suspends is
//! rejected with [`HostError::InvalidSyncHost`] instead of blocking the
//! caller or returning a stale value.

use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{HostError, HostResult};
use crate::ops::Host;
use crate::path::{HostPath, PathFragment};
use crate::types::{FileBuffer, HostCapabilities, Stats};
use crate::watch::{WatchOptions, WatchStream};

/// Synchronous adapter over a host.
///
/// Only sound for hosts that never suspend. Errors from the wrapped host are
/// returned unchanged.
pub struct SyncDelegateHost<H: ?Sized> {
    delegate: Arc<H>,
}

impl<H: ?Sized> Clone for SyncDelegateHost<H> {
    fn clone(&self) -> Self {
        Self {
            delegate: Arc::clone(&self.delegate),
        }
    }
}

impl<H: ?Sized> std::fmt::Debug for SyncDelegateHost<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDelegateHost").finish_non_exhaustive()
    }
}

impl<H: Host> SyncDelegateHost<H> {
    /// Wrap an owned host.
    pub fn from_host(host: H) -> Self {
        Self::new(Arc::new(host))
    }
}

impl<H: Host + ?Sized> SyncDelegateHost<H> {
    /// Wrap a shared host.
    pub fn new(delegate: Arc<H>) -> Self {
        Self { delegate }
    }

    /// The wrapped host.
    pub fn delegate(&self) -> &Arc<H> {
        &self.delegate
    }

    /// Capabilities of the wrapped host.
    pub fn capabilities(&self) -> HostCapabilities {
        self.delegate.capabilities()
    }

    /// Run one host operation to completion within a single poll.
    ///
    /// Hosts that do not advertise synchronous operations are rejected before
    /// any future is built. A future that still suspends is dropped and
    /// reported the same way.
    fn resolve<'a, T, Fut>(&'a self, op: &'static str, call: impl FnOnce(&'a H) -> Fut) -> HostResult<T>
    where
        Fut: Future<Output = HostResult<T>>,
    {
        if !self.delegate.capabilities().synchronous {
            tracing::warn!(op, "host does not advertise synchronous operations");
            return Err(HostError::InvalidSyncHost(op));
        }
        match call(&*self.delegate).now_or_never() {
            Some(result) => result,
            None => {
                tracing::warn!(op, "host operation did not complete synchronously");
                Err(HostError::InvalidSyncHost(op))
            }
        }
    }

    /// Replace the whole content of a file.
    pub fn write(&self, path: &HostPath, content: impl Into<FileBuffer>) -> HostResult<()> {
        self.resolve("write", |h| h.write(path, content.into()))
    }

    /// Read the whole content of a file.
    pub fn read(&self, path: &HostPath) -> HostResult<FileBuffer> {
        self.resolve("read", |h| h.read(path))
    }

    /// Delete a file or directory.
    pub fn delete(&self, path: &HostPath) -> HostResult<()> {
        self.resolve("delete", |h| h.delete(path))
    }

    /// Move a file or directory.
    pub fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()> {
        self.resolve("rename", |h| h.rename(from, to))
    }

    /// Immediate children of a directory.
    pub fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>> {
        self.resolve("list", |h| h.list(path))
    }

    /// Check if a path exists.
    pub fn exists(&self, path: &HostPath) -> HostResult<bool> {
        self.resolve("exists", |h| h.exists(path))
    }

    /// Check if a path is a directory.
    pub fn is_directory(&self, path: &HostPath) -> HostResult<bool> {
        self.resolve("is_directory", |h| h.is_directory(path))
    }

    /// Check if a path is a file.
    pub fn is_file(&self, path: &HostPath) -> HostResult<bool> {
        self.resolve("is_file", |h| h.is_file(path))
    }

    /// Metadata for a path.
    pub fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>> {
        self.resolve("stat", |h| h.stat(path))
    }

    /// Subscribe to changes. Watching is already non-blocking, so this
    /// forwards directly.
    pub fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        self.delegate.watch(path, options)
    }
}
