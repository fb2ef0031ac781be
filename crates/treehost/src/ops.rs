//! Host operations trait.
//!
//! This trait is the capability set every backend provides. Callers program
//! against it without knowing whether the tree lives on disk, in memory, or
//! behind a test double.

use async_trait::async_trait;
use std::sync::Arc;

use crate::path::{HostPath, PathFragment};
use crate::types::{FileBuffer, HostCapabilities, Stats};
use crate::watch::{WatchOptions, WatchStream};
use crate::HostResult;

/// Core host operations trait.
///
/// Content operations (`write`, `read`, `delete`, `rename`) fail when their
/// existence or type preconditions are violated. Structural queries (`list`,
/// `exists`, `is_directory`, `is_file`, `stat`) never fail because a path is
/// absent, so callers can probe the tree before mutating it.
#[async_trait]
pub trait Host: Send + Sync {
    // ========================================================================
    // Content
    // ========================================================================

    /// Replace the whole content of a file, creating it if needed.
    ///
    /// Missing ancestor directories are materialized implicitly.
    async fn write(&self, path: &HostPath, content: FileBuffer) -> HostResult<()>;

    /// Read the whole content of a file.
    async fn read(&self, path: &HostPath) -> HostResult<FileBuffer>;

    /// Delete a file, or a directory together with everything under it.
    async fn delete(&self, path: &HostPath) -> HostResult<()>;

    /// Move a file, or a directory together with everything under it.
    async fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()>;

    // ========================================================================
    // Structure
    // ========================================================================

    /// Immediate children of a directory, sorted.
    ///
    /// Empty for files and absent paths.
    async fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>>;

    /// Metadata, or `None` if the path is absent or the backend has none.
    async fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>>;

    /// Check if a path exists.
    async fn exists(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    /// Check if a path is a directory.
    async fn is_directory(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.stat(path).await?.is_some_and(|s| s.is_dir()))
    }

    /// Check if a path is a file.
    async fn is_file(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.stat(path).await?.is_some_and(|s| s.is_file()))
    }

    // ========================================================================
    // Watching & metadata
    // ========================================================================

    /// Subscribe to changes under `path`.
    ///
    /// Returns `None` if the backend cannot watch.
    fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        let _ = (path, options);
        None
    }

    /// What this backend promises about its operations.
    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::default()
    }
}

#[async_trait]
impl<H: Host + ?Sized> Host for Arc<H> {
    async fn write(&self, path: &HostPath, content: FileBuffer) -> HostResult<()> {
        (**self).write(path, content).await
    }

    async fn read(&self, path: &HostPath) -> HostResult<FileBuffer> {
        (**self).read(path).await
    }

    async fn delete(&self, path: &HostPath) -> HostResult<()> {
        (**self).delete(path).await
    }

    async fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()> {
        (**self).rename(from, to).await
    }

    async fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>> {
        (**self).list(path).await
    }

    async fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>> {
        (**self).stat(path).await
    }

    async fn exists(&self, path: &HostPath) -> HostResult<bool> {
        (**self).exists(path).await
    }

    async fn is_directory(&self, path: &HostPath) -> HostResult<bool> {
        (**self).is_directory(path).await
    }

    async fn is_file(&self, path: &HostPath) -> HostResult<bool> {
        (**self).is_file(path).await
    }

    fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        (**self).watch(path, options)
    }

    fn capabilities(&self) -> HostCapabilities {
        (**self).capabilities()
    }
}
