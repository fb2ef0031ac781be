//! Local filesystem backend.
//!
//! Serves a real directory through the host contract. Host paths are
//! normalized before they get here, so joining them onto the root cannot
//! climb out of it. Symlinks are followed as the OS does and get no special
//! treatment.

use async_trait::async_trait;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::error::{HostError, HostResult};
use crate::ops::Host;
use crate::path::{HostPath, PathFragment};
use crate::types::{FileBuffer, HostCapabilities, Stats};
use crate::watch::{HostWatchEvent, HostWatchEventKind, WatchHub, WatchOptions, WatchStream};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/home/amy/project`, then reading `/src/main.rs` reads
/// `/home/amy/project/src/main.rs`.
///
/// Unlike the in-memory host, directories here are real: they survive the
/// removal of their last file.
#[derive(Debug, Clone)]
pub struct LocalHost {
    root: PathBuf,
    read_only: bool,
    watch_capacity: usize,
}

impl LocalHost {
    /// Create a new local host rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`), which keeps watch event paths
    /// comparable with the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
            watch_capacity: crate::watch::DEFAULT_WATCH_CAPACITY,
        }
    }

    /// Create a read-only local host.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        let mut host = Self::new(root);
        host.read_only = true;
        host
    }

    /// Set the broadcast buffer used by each watch subscription.
    pub fn with_watch_capacity(mut self, capacity: usize) -> Self {
        self.watch_capacity = capacity;
        self
    }

    /// Set whether this host is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Returns true if mutations are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a host path onto the real filesystem.
    pub fn resolve(&self, path: &HostPath) -> PathBuf {
        let mut full = self.root.clone();
        full.extend(path.segments());
        full
    }

    /// Map a real path under the root back to a host path.
    fn to_host_path(&self, full: &Path) -> Option<HostPath> {
        let rel = full.strip_prefix(&self.root).ok()?;
        let joined = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        HostPath::new(&joined).ok()
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> HostResult<()> {
        if self.read_only {
            Err(HostError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Metadata, treating "not there" as `None`.
    async fn metadata(&self, path: &HostPath) -> HostResult<Option<std::fs::Metadata>> {
        match fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The nearest ancestor of `path` that is a regular file, if any.
    async fn file_ancestor(&self, path: &HostPath) -> HostResult<Option<HostPath>> {
        for ancestor in path.ancestors() {
            if let Some(meta) = self.metadata(&ancestor).await? {
                if meta.is_file() {
                    return Ok(Some(ancestor));
                }
                // The first existing directory settles it.
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Convert std::fs::Metadata to Stats.
    fn metadata_to_stats(meta: &std::fs::Metadata) -> Stats {
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let created = meta.created().unwrap_or(modified);
        let stats = if meta.is_dir() {
            Stats::directory(created, modified)
        } else {
            Stats::file(meta.len(), created, modified)
        };
        stats
            .with_extra("backend", "local")
            .with_extra("readonly", meta.permissions().readonly().to_string())
    }

    fn map_notify_event(&self, event: Event) -> Vec<HostWatchEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => HostWatchEventKind::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                return match (
                    self.to_host_path(&event.paths[0]),
                    self.to_host_path(&event.paths[1]),
                ) {
                    (Some(from), Some(to)) => vec![HostWatchEvent::renamed(from, to)],
                    _ => Vec::new(),
                };
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => HostWatchEventKind::Deleted,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => HostWatchEventKind::Created,
            EventKind::Modify(_) => HostWatchEventKind::Changed,
            EventKind::Remove(_) => HostWatchEventKind::Deleted,
            _ => return Vec::new(),
        };
        event
            .paths
            .iter()
            .filter_map(|p| self.to_host_path(p))
            .map(|p| HostWatchEvent::new(kind, p))
            .collect()
    }
}

fn is_absent(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

#[async_trait]
impl Host for LocalHost {
    async fn write(&self, path: &HostPath, content: FileBuffer) -> HostResult<()> {
        self.check_writable()?;
        if path.is_root() || self.metadata(path).await?.is_some_and(|m| m.is_dir()) {
            return Err(HostError::path_is_directory(path.as_str()));
        }
        if let Some(blocker) = self.file_ancestor(path).await? {
            return Err(HostError::path_is_file(blocker.as_str()));
        }

        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, content.as_bytes()).await?;
        tracing::debug!(path = %path, bytes = content.len(), "local write");
        Ok(())
    }

    async fn read(&self, path: &HostPath) -> HostResult<FileBuffer> {
        match self.metadata(path).await? {
            None => Err(HostError::file_not_found(path.as_str())),
            Some(meta) if meta.is_dir() => Err(HostError::path_is_directory(path.as_str())),
            Some(_) => Ok(fs::read(self.resolve(path)).await?.into()),
        }
    }

    async fn delete(&self, path: &HostPath) -> HostResult<()> {
        self.check_writable()?;
        let meta = self
            .metadata(path)
            .await?
            .ok_or_else(|| HostError::file_not_found(path.as_str()))?;

        let full_path = self.resolve(path);
        if path.is_root() {
            // Keep the root itself; clear what is inside it.
            let mut dir = fs::read_dir(&full_path).await?;
            while let Some(entry) = dir.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    fs::remove_dir_all(entry.path()).await?;
                } else {
                    fs::remove_file(entry.path()).await?;
                }
            }
        } else if meta.is_dir() {
            fs::remove_dir_all(&full_path).await?;
        } else {
            fs::remove_file(&full_path).await?;
        }
        tracing::debug!(path = %path, "local delete");
        Ok(())
    }

    async fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()> {
        self.check_writable()?;
        if self.metadata(from).await?.is_none() {
            return Err(HostError::file_not_found(from.as_str()));
        }
        if from == to {
            return Ok(());
        }
        if from.is_root() || from.is_ancestor_of(to) {
            return Err(HostError::invalid_path(format!("cannot move {from} into {to}")));
        }
        match self.metadata(to).await? {
            Some(meta) if meta.is_dir() => return Err(HostError::path_is_directory(to.as_str())),
            Some(_) => return Err(HostError::file_already_exists(to.as_str())),
            None => {}
        }
        if let Some(blocker) = self.file_ancestor(to).await? {
            return Err(HostError::path_is_file(blocker.as_str()));
        }

        let to_path = self.resolve(to);
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(self.resolve(from), &to_path).await?;
        tracing::debug!(from = %from, to = %to, "local rename");
        Ok(())
    }

    async fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>> {
        if !self.metadata(path).await?.is_some_and(|m| m.is_dir()) {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut dir = fs::read_dir(self.resolve(path)).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match PathFragment::new(&name) {
                Ok(fragment) => names.push(fragment),
                Err(_) => tracing::warn!(name, "skipping unrepresentable entry"),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>> {
        Ok(self
            .metadata(path)
            .await?
            .map(|meta| Self::metadata_to_stats(&meta)))
    }

    async fn exists(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.metadata(path).await?.is_some())
    }

    async fn is_directory(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.metadata(path).await?.is_some_and(|m| m.is_dir()))
    }

    async fn is_file(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.metadata(path).await?.is_some_and(|m| m.is_file()))
    }

    fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        let hub = WatchHub::new(self.watch_capacity);
        let publisher = hub.clone();
        let mapper = self.clone();

        let mut watcher = match RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    for ev in mapper.map_notify_event(event) {
                        publisher.publish(ev);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create watcher");
                return None;
            }
        };

        let mode = if options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        if let Err(e) = watcher.watch(&self.resolve(path), mode) {
            tracing::warn!(path = %path, error = %e, "failed to watch");
            return None;
        }

        Some(hub.subscribe(path.clone(), options).with_guard(watcher))
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities { synchronous: false }
    }
}
