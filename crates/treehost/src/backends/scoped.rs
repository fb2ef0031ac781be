//! Sub-tree view over another host.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::{HostError, HostResult};
use crate::ops::Host;
use crate::path::{HostPath, PathFragment};
use crate::types::{FileBuffer, HostCapabilities, Stats};
use crate::watch::{WatchOptions, WatchStream};

/// Exposes `prefix` of an inner host as `/`.
///
/// Every path is rebased under the prefix before delegation. Errors carry the
/// inner host's paths. The scoped root always exists as a directory, even
/// when the prefix has no content yet.
pub struct ScopedHost<H: ?Sized> {
    prefix: HostPath,
    inner: Arc<H>,
}

impl<H: ?Sized> Clone for ScopedHost<H> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: ?Sized> std::fmt::Debug for ScopedHost<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedHost")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl<H: Host + ?Sized> ScopedHost<H> {
    /// Expose `prefix` of `inner` as the root of a new host.
    ///
    /// The prefix does not need to exist yet.
    pub fn new(inner: Arc<H>, prefix: HostPath) -> Self {
        Self { prefix, inner }
    }

    /// The inner path that appears as `/`.
    pub fn prefix(&self) -> &HostPath {
        &self.prefix
    }

    /// The wrapped host.
    pub fn inner(&self) -> &Arc<H> {
        &self.inner
    }

    /// Map an outer path to the inner host.
    pub fn to_inner(&self, path: &HostPath) -> HostPath {
        // Every path is under the root, so rebasing cannot miss.
        path.rebase(&HostPath::root(), &self.prefix)
            .unwrap_or_else(|| self.prefix.clone())
    }

    /// Map an inner path back; `None` if it lies outside the prefix.
    pub fn to_outer(&self, path: &HostPath) -> Option<HostPath> {
        path.rebase(&self.prefix, &HostPath::root())
    }
}

#[async_trait]
impl<H: Host + ?Sized> Host for ScopedHost<H> {
    async fn write(&self, path: &HostPath, content: FileBuffer) -> HostResult<()> {
        if path.is_root() {
            return Err(HostError::path_is_directory(self.prefix.as_str()));
        }
        self.inner.write(&self.to_inner(path), content).await
    }

    async fn read(&self, path: &HostPath) -> HostResult<FileBuffer> {
        if path.is_root() {
            return Err(HostError::path_is_directory(self.prefix.as_str()));
        }
        self.inner.read(&self.to_inner(path)).await
    }

    async fn delete(&self, path: &HostPath) -> HostResult<()> {
        let inner = self.to_inner(path);
        if path.is_root() && !self.inner.exists(&inner).await? {
            return Ok(());
        }
        self.inner.delete(&inner).await
    }

    async fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()> {
        if from.is_root() && !to.is_root() {
            return Err(HostError::invalid_path(format!(
                "cannot move scope root {} to {}",
                self.prefix,
                self.to_inner(to)
            )));
        }
        self.inner.rename(&self.to_inner(from), &self.to_inner(to)).await
    }

    async fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>> {
        self.inner.list(&self.to_inner(path)).await
    }

    async fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>> {
        let stats = self.inner.stat(&self.to_inner(path)).await?;
        if path.is_root() && !stats.as_ref().is_some_and(Stats::is_dir) {
            return Ok(Some(
                Stats::directory(SystemTime::UNIX_EPOCH, SystemTime::UNIX_EPOCH)
                    .with_extra("scope", self.prefix.as_str()),
            ));
        }
        Ok(stats)
    }

    fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        let prefix = self.prefix.clone();
        let stream = self.inner.watch(&self.to_inner(path), options)?;
        Some(
            stream
                .filter_map_events(move |mut ev| {
                    let root = HostPath::root();
                    ev.path = ev.path.rebase(&prefix, &root)?;
                    ev.destination = match ev.destination.take() {
                        Some(dest) => Some(dest.rebase(&prefix, &root)?),
                        None => None,
                    };
                    Some(ev)
                })
                .with_scope(path.clone()),
        )
    }

    fn capabilities(&self) -> HostCapabilities {
        self.inner.capabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimpleMemoryHost;
    use crate::watch::HostWatchEventKind;
    use futures::StreamExt;

    fn p(s: &str) -> HostPath {
        HostPath::new(s).unwrap()
    }

    fn scoped() -> (Arc<SimpleMemoryHost>, ScopedHost<SimpleMemoryHost>) {
        let inner = Arc::new(SimpleMemoryHost::new());
        let host = ScopedHost::new(Arc::clone(&inner), p("/work"));
        (inner, host)
    }

    #[tokio::test]
    async fn test_paths_are_rebased() {
        let (inner, host) = scoped();
        host.write(&p("/src/lib.rs"), "lib".into()).await.unwrap();

        assert_eq!(inner.read(&p("/work/src/lib.rs")).await.unwrap().as_bytes(), b"lib");
        assert_eq!(host.list(&HostPath::root()).await.unwrap(), vec![PathFragment::new("src").unwrap()]);
        assert!(host.is_directory(&p("/src")).await.unwrap());
    }

    #[test]
    fn test_accessors() {
        let (inner, host) = scoped();
        assert_eq!(host.prefix(), &p("/work"));
        assert!(Arc::ptr_eq(host.inner(), &inner));
    }

    #[tokio::test]
    async fn test_outside_content_is_invisible() {
        let (inner, host) = scoped();
        inner.write(&p("/other/secret"), "s".into()).await.unwrap();

        assert!(!host.exists(&p("/other/secret")).await.unwrap());
        assert!(host.list(&HostPath::root()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_root_always_a_directory() {
        let (_inner, host) = scoped();
        assert!(host.is_directory(&HostPath::root()).await.unwrap());
        assert!(matches!(
            host.write(&HostPath::root(), "x".into()).await,
            Err(HostError::PathIsDirectory(_))
        ));
        host.delete(&HostPath::root()).await.unwrap();
    }

    #[tokio::test]
    async fn test_errors_carry_inner_paths() {
        let (_inner, host) = scoped();
        assert!(matches!(
            host.read(&p("/missing")).await,
            Err(HostError::FileNotFound(ref s)) if s == "/work/missing"
        ));
    }

    #[tokio::test]
    async fn test_delete_root_clears_only_the_scope() {
        let (inner, host) = scoped();
        inner.write(&p("/keep"), "k".into()).await.unwrap();
        host.write(&p("/a"), "a".into()).await.unwrap();

        host.delete(&HostPath::root()).await.unwrap();
        assert!(!inner.exists(&p("/work")).await.unwrap());
        assert!(inner.exists(&p("/keep")).await.unwrap());
    }

    #[tokio::test]
    async fn test_watch_maps_paths_back() {
        let (inner, host) = scoped();
        let mut events = host.watch(&HostPath::root(), WatchOptions::default()).unwrap();
        assert!(events.scope().is_root());

        inner.write(&p("/elsewhere"), "x".into()).await.unwrap();
        host.write(&p("/f"), "1".into()).await.unwrap();
        host.rename(&p("/f"), &p("/g")).await.unwrap();

        let created = events.next().await.unwrap();
        assert_eq!(created.kind, HostWatchEventKind::Created);
        assert_eq!(created.path, p("/f"));

        let renamed = events.next().await.unwrap();
        assert_eq!(renamed.kind, HostWatchEventKind::Renamed);
        assert_eq!(renamed.destination, Some(p("/g")));
    }
}
