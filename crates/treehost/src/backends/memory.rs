//! In-memory host backend.
//!
//! Used for dry runs and testing. All data is ephemeral.
//!
//! Only files are stored. A path is a directory iff some stored path lies
//! under it, so writing `/a/b/c` makes `/a` and `/a/b` directories and
//! deleting the last file under a directory makes it disappear.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::time::SystemTime;

use crate::error::{HostError, HostResult};
use crate::ops::Host;
use crate::path::{HostPath, PathFragment};
use crate::types::{FileBuffer, HostCapabilities, Stats};
use crate::watch::{HostWatchEvent, HostWatchEventKind, WatchHub, WatchOptions, WatchStream};

/// A stored file.
#[derive(Debug, Clone)]
struct MemoryFile {
    content: FileBuffer,
    created: SystemTime,
    modified: SystemTime,
}

/// Flat map from normalized path string to file.
///
/// Keys are `HostPath` strings, so every descendant of a directory shares
/// the directory's `descendant_prefix` and forms one contiguous range.
#[derive(Debug, Clone, Default)]
struct Tree {
    files: BTreeMap<String, MemoryFile>,
}

impl Tree {
    fn descendants<'a>(&'a self, dir: &HostPath) -> impl Iterator<Item = (&'a String, &'a MemoryFile)> {
        let prefix = dir.descendant_prefix();
        self.files
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(&prefix))
    }

    fn is_file(&self, path: &HostPath) -> bool {
        self.files.contains_key(path.as_str())
    }

    fn is_directory(&self, path: &HostPath) -> bool {
        path.is_root() || self.descendants(path).next().is_some()
    }

    /// The nearest ancestor of `path` that is a stored file, if any.
    fn file_ancestor(&self, path: &HostPath) -> Option<HostPath> {
        path.ancestors().find(|a| self.is_file(a))
    }

    /// Store a file, returning the event it produced.
    fn put(&mut self, path: &HostPath, content: FileBuffer) -> HostResult<HostWatchEventKind> {
        if self.is_directory(path) {
            return Err(HostError::path_is_directory(path.as_str()));
        }
        if let Some(blocker) = self.file_ancestor(path) {
            return Err(HostError::path_is_file(blocker.as_str()));
        }

        let now = SystemTime::now();
        match self.files.get_mut(path.as_str()) {
            Some(file) => {
                file.content = content;
                file.modified = now;
                Ok(HostWatchEventKind::Changed)
            }
            None => {
                self.files.insert(
                    path.as_str().to_string(),
                    MemoryFile {
                        content,
                        created: now,
                        modified: now,
                    },
                );
                Ok(HostWatchEventKind::Created)
            }
        }
    }

    fn descendant_keys(&self, dir: &HostPath) -> Vec<String> {
        self.descendants(dir).map(|(k, _)| k.clone()).collect()
    }
}

/// In-memory host backend.
///
/// Thread-safe via an internal `RwLock`; each operation holds the lock for
/// its whole duration, so operations on one instance are totally ordered.
/// Watch events are published before the lock is released, so subscribers
/// observe them in that same order.
/// Every operation completes within the poll that starts it.
#[derive(Debug)]
pub struct SimpleMemoryHost {
    tree: RwLock<Tree>,
    hub: WatchHub,
    created: SystemTime,
}

impl Default for SimpleMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SimpleMemoryHost {
    /// Deep copy of the content. Watchers are not carried over.
    fn clone(&self) -> Self {
        Self {
            tree: RwLock::new(self.tree.read().clone()),
            hub: WatchHub::default(),
            created: self.created,
        }
    }
}

impl SimpleMemoryHost {
    /// Create a new empty in-memory host.
    pub fn new() -> Self {
        Self::with_hub(WatchHub::default())
    }

    /// Create a new empty host publishing watch events into `hub`.
    pub fn with_hub(hub: WatchHub) -> Self {
        Self {
            tree: RwLock::new(Tree::default()),
            hub,
            created: SystemTime::now(),
        }
    }

    /// Create a host pre-populated with files.
    ///
    /// Seeding does not emit watch events.
    pub fn from_files<I, C>(files: I) -> HostResult<Self>
    where
        I: IntoIterator<Item = (HostPath, C)>,
        C: Into<FileBuffer>,
    {
        let host = Self::new();
        host.seed(files)?;
        Ok(host)
    }

    /// Insert files without emitting watch events.
    pub fn seed<I, C>(&self, files: I) -> HostResult<()>
    where
        I: IntoIterator<Item = (HostPath, C)>,
        C: Into<FileBuffer>,
    {
        let mut tree = self.tree.write();
        for (path, content) in files {
            tree.put(&path, content.into())?;
        }
        Ok(())
    }

    /// All stored file paths, sorted.
    pub fn paths(&self) -> Vec<HostPath> {
        self.tree
            .read()
            .files
            .keys()
            .map(|k| HostPath::from_normalized(k.clone()))
            .collect()
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.tree.read().files.len()
    }

    /// Returns true if no files are stored.
    pub fn is_empty(&self) -> bool {
        self.tree.read().files.is_empty()
    }

    /// The hub this host publishes into.
    pub fn hub(&self) -> &WatchHub {
        &self.hub
    }

    fn publish(&self, events: Vec<HostWatchEvent>) {
        if !self.hub.has_subscribers() {
            return;
        }
        for event in events {
            self.hub.publish(event);
        }
    }
}

#[async_trait]
impl Host for SimpleMemoryHost {
    async fn write(&self, path: &HostPath, content: FileBuffer) -> HostResult<()> {
        let mut tree = self.tree.write();
        let kind = tree.put(path, content)?;
        tracing::debug!(path = %path, ?kind, "memory write");
        // Published under the lock: event order is mutation order.
        self.publish(vec![HostWatchEvent::new(kind, path.clone())]);
        Ok(())
    }

    async fn read(&self, path: &HostPath) -> HostResult<FileBuffer> {
        let tree = self.tree.read();
        match tree.files.get(path.as_str()) {
            Some(file) => Ok(file.content.clone()),
            None if tree.is_directory(path) => Err(HostError::path_is_directory(path.as_str())),
            None => Err(HostError::file_not_found(path.as_str())),
        }
    }

    async fn delete(&self, path: &HostPath) -> HostResult<()> {
        let mut tree = self.tree.write();
        let removed: Vec<String> = if tree.files.remove(path.as_str()).is_some() {
            vec![path.as_str().to_string()]
        } else {
            let keys = tree.descendant_keys(path);
            if keys.is_empty() && !path.is_root() {
                return Err(HostError::file_not_found(path.as_str()));
            }
            for key in &keys {
                tree.files.remove(key);
            }
            keys
        };

        tracing::debug!(path = %path, files = removed.len(), "memory delete");
        self.publish(
            removed
                .into_iter()
                .map(|k| HostWatchEvent::new(HostWatchEventKind::Deleted, HostPath::from_normalized(k)))
                .collect(),
        );
        Ok(())
    }

    async fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()> {
        let mut tree = self.tree.write();

        if from == to {
            return if tree.is_file(from) || tree.is_directory(from) {
                Ok(())
            } else {
                Err(HostError::file_not_found(from.as_str()))
            };
        }
        if from.is_root() || from.is_ancestor_of(to) {
            return Err(HostError::invalid_path(format!("cannot move {from} into {to}")));
        }

        let sources: Vec<String> = if tree.is_file(from) {
            vec![from.as_str().to_string()]
        } else {
            tree.descendant_keys(from)
        };
        if sources.is_empty() {
            return Err(HostError::file_not_found(from.as_str()));
        }

        if tree.is_file(to) {
            return Err(HostError::file_already_exists(to.as_str()));
        }
        if tree.is_directory(to) {
            return Err(HostError::path_is_directory(to.as_str()));
        }
        if let Some(blocker) = tree.file_ancestor(to) {
            return Err(HostError::path_is_file(blocker.as_str()));
        }

        // All checks passed; the move itself cannot fail.
        let mut moved = Vec::with_capacity(sources.len());
        for key in sources {
            let src = HostPath::from_normalized(key);
            if let (Some(file), Some(dst)) = (tree.files.remove(src.as_str()), src.rebase(from, to)) {
                tree.files.insert(dst.as_str().to_string(), file);
                moved.push((src, dst));
            }
        }

        tracing::debug!(from = %from, to = %to, files = moved.len(), "memory rename");
        self.publish(
            moved
                .into_iter()
                .map(|(src, dst)| HostWatchEvent::renamed(src, dst))
                .collect(),
        );
        Ok(())
    }

    async fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>> {
        let tree = self.tree.read();
        let children: BTreeSet<PathFragment> = tree
            .descendants(path)
            .filter_map(|(k, _)| HostPath::from_normalized(k.clone()).child_of(path))
            .collect();
        Ok(children.into_iter().collect())
    }

    async fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>> {
        let tree = self.tree.read();
        if let Some(file) = tree.files.get(path.as_str()) {
            return Ok(Some(
                Stats::file(file.content.len() as u64, file.created, file.modified)
                    .with_extra("backend", "memory"),
            ));
        }

        let mut span: Option<(SystemTime, SystemTime)> = None;
        for (_, file) in tree.descendants(path) {
            span = Some(match span {
                None => (file.created, file.modified),
                Some((c, m)) => (c.min(file.created), m.max(file.modified)),
            });
        }
        Ok(match span {
            Some((created, modified)) => {
                Some(Stats::directory(created, modified).with_extra("backend", "memory"))
            }
            None if path.is_root() => {
                Some(Stats::directory(self.created, self.created).with_extra("backend", "memory"))
            }
            None => None,
        })
    }

    async fn exists(&self, path: &HostPath) -> HostResult<bool> {
        let tree = self.tree.read();
        Ok(tree.is_file(path) || tree.is_directory(path))
    }

    async fn is_directory(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.tree.read().is_directory(path))
    }

    async fn is_file(&self, path: &HostPath) -> HostResult<bool> {
        Ok(self.tree.read().is_file(path))
    }

    fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        Some(self.hub.subscribe(path.clone(), options))
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities { synchronous: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn p(s: &str) -> HostPath {
        HostPath::new(s).unwrap()
    }

    fn names(frags: Vec<PathFragment>) -> Vec<String> {
        frags.into_iter().map(String::from).collect()
    }

    #[tokio::test]
    async fn test_concurrent_writers_see_created_first() {
        const THREADS: usize = 8;
        const WRITES: usize = 16;

        let host = std::sync::Arc::new(SimpleMemoryHost::new());
        let mut events = host.watch(&p("/same"), WatchOptions::default()).unwrap();

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let host = &host;
                scope.spawn(move || {
                    let sync = crate::sync::SyncDelegateHost::new(std::sync::Arc::clone(host));
                    for i in 0..WRITES {
                        sync.write(&p("/same"), format!("{t}:{i}")).unwrap();
                    }
                });
            }
        });

        let kinds: Vec<_> = (&mut events)
            .take(THREADS * WRITES)
            .map(|ev| ev.kind)
            .collect()
            .await;
        assert_eq!(kinds.len(), THREADS * WRITES);
        assert_eq!(kinds[0], HostWatchEventKind::Created);
        assert!(kinds[1..].iter().all(|k| *k == HostWatchEventKind::Changed));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/test.txt"), "hello world".into()).await.unwrap();

        let data = fs.read(&p("/test.txt")).await.unwrap();
        assert_eq!(data.as_bytes(), b"hello world");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_content() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/f"), "long content".into()).await.unwrap();
        fs.write(&p("/f"), "short".into()).await.unwrap();
        assert_eq!(fs.read(&p("/f")).await.unwrap().as_bytes(), b"short");
    }

    #[tokio::test]
    async fn test_implicit_directories() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/a/b/c/file.txt"), "x".into()).await.unwrap();

        assert!(fs.is_directory(&p("/a")).await.unwrap());
        assert!(fs.is_directory(&p("/a/b")).await.unwrap());
        assert!(fs.is_directory(&p("/a/b/c")).await.unwrap());
        assert!(!fs.is_file(&p("/a/b")).await.unwrap());
        assert!(fs.is_file(&p("/a/b/c/file.txt")).await.unwrap());
        assert!(!fs.is_directory(&p("/a/b/c/file.txt")).await.unwrap());
        assert!(!fs.exists(&p("/a/bb")).await.unwrap());
        assert_eq!(fs.len(), 1);
    }

    #[tokio::test]
    async fn test_sibling_prefix_is_not_a_child() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/ab/file"), "x".into()).await.unwrap();
        fs.write(&p("/a.txt"), "x".into()).await.unwrap();

        assert!(!fs.is_directory(&p("/a")).await.unwrap());
        assert!(fs.list(&p("/a")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_over_directory_fails() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/dir/file"), "x".into()).await.unwrap();

        let err = fs.write(&p("/dir"), "y".into()).await.unwrap_err();
        assert!(matches!(err, HostError::PathIsDirectory(ref s) if s == "/dir"));

        let err = fs.write(&HostPath::root(), "y".into()).await.unwrap_err();
        assert!(matches!(err, HostError::PathIsDirectory(_)));
    }

    #[tokio::test]
    async fn test_write_under_file_fails() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/a"), "file".into()).await.unwrap();

        let err = fs.write(&p("/a/b/c"), "y".into()).await.unwrap_err();
        assert!(matches!(err, HostError::PathIsFile(ref s) if s == "/a"));
        assert_eq!(fs.len(), 1);
    }

    #[tokio::test]
    async fn test_read_errors() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/dir/file"), "x".into()).await.unwrap();

        assert!(matches!(fs.read(&p("/nope")).await, Err(HostError::FileNotFound(_))));
        assert!(matches!(fs.read(&p("/dir")).await, Err(HostError::PathIsDirectory(_))));
    }

    #[tokio::test]
    async fn test_delete_file() {
        let fs = SimpleMemoryHost::from_files([(p("/x.txt"), "1")]).unwrap();
        fs.delete(&p("/x.txt")).await.unwrap();

        assert!(!fs.exists(&p("/x.txt")).await.unwrap());
        assert!(fs.list(&HostPath::root()).await.unwrap().is_empty());
        assert!(matches!(fs.delete(&p("/x.txt")).await, Err(HostError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_directory_removes_descendants() {
        let fs = SimpleMemoryHost::from_files([
            (p("/d/a"), "1"),
            (p("/d/sub/b"), "2"),
            (p("/dd"), "3"),
        ])
        .unwrap();

        fs.delete(&p("/d")).await.unwrap();
        assert_eq!(fs.paths(), vec![p("/dd")]);
        assert!(!fs.is_directory(&p("/d")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_root() {
        let fs = SimpleMemoryHost::from_files([(p("/a/b"), "1"), (p("/c"), "2")]).unwrap();
        fs.delete(&HostPath::root()).await.unwrap();
        assert!(fs.is_empty());
        // Root always exists, so deleting it again is not an error.
        fs.delete(&HostPath::root()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_file() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/old.txt"), "content".into()).await.unwrap();

        fs.rename(&p("/old.txt"), &p("/new/place.txt")).await.unwrap();

        assert!(!fs.exists(&p("/old.txt")).await.unwrap());
        let data = fs.read(&p("/new/place.txt")).await.unwrap();
        assert_eq!(data.as_bytes(), b"content");
    }

    #[tokio::test]
    async fn test_rename_directory() {
        let fs = SimpleMemoryHost::from_files([
            (p("/src/a.rs"), "a"),
            (p("/src/nested/b.rs"), "b"),
            (p("/srcx"), "untouched"),
        ])
        .unwrap();

        fs.rename(&p("/src"), &p("/lib")).await.unwrap();

        assert!(!fs.exists(&p("/src")).await.unwrap());
        assert!(fs.is_directory(&p("/lib")).await.unwrap());
        assert_eq!(fs.read(&p("/lib/a.rs")).await.unwrap().as_bytes(), b"a");
        assert_eq!(fs.read(&p("/lib/nested/b.rs")).await.unwrap().as_bytes(), b"b");
        assert_eq!(fs.read(&p("/srcx")).await.unwrap().as_bytes(), b"untouched");
    }

    #[tokio::test]
    async fn test_rename_conflicts() {
        let fs = SimpleMemoryHost::from_files([
            (p("/a"), "1"),
            (p("/b"), "2"),
            (p("/dir/x"), "3"),
        ])
        .unwrap();

        assert!(matches!(
            fs.rename(&p("/missing"), &p("/z")).await,
            Err(HostError::FileNotFound(_))
        ));
        assert!(matches!(
            fs.rename(&p("/a"), &p("/b")).await,
            Err(HostError::FileAlreadyExists(_))
        ));
        assert!(matches!(
            fs.rename(&p("/a"), &p("/dir")).await,
            Err(HostError::PathIsDirectory(_))
        ));
        assert!(matches!(
            fs.rename(&p("/dir"), &p("/a/inner")).await,
            Err(HostError::PathIsFile(_))
        ));
        assert!(matches!(
            fs.rename(&p("/dir"), &p("/dir/deeper")).await,
            Err(HostError::InvalidPath(_))
        ));

        // Nothing moved after the failures.
        assert_eq!(fs.paths(), vec![p("/a"), p("/b"), p("/dir/x")]);
    }

    #[tokio::test]
    async fn test_rename_onto_itself() {
        let fs = SimpleMemoryHost::from_files([(p("/a"), "1")]).unwrap();
        fs.rename(&p("/a"), &p("/a")).await.unwrap();
        assert!(fs.rename(&p("/q"), &p("/q")).await.is_err());
    }

    #[tokio::test]
    async fn test_list() {
        let fs = SimpleMemoryHost::from_files([
            (p("/subdir/file.txt"), ""),
            (p("/subdir/deeper/x"), ""),
            (p("/root.txt"), ""),
        ])
        .unwrap();

        assert_eq!(names(fs.list(&HostPath::root()).await.unwrap()), vec!["root.txt", "subdir"]);
        assert_eq!(names(fs.list(&p("/subdir")).await.unwrap()), vec!["deeper", "file.txt"]);
        assert!(fs.list(&p("/root.txt")).await.unwrap().is_empty());
        assert!(fs.list(&p("/absent")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stat() {
        let fs = SimpleMemoryHost::from_files([(p("/d/f.txt"), "12345")]).unwrap();

        let file = fs.stat(&p("/d/f.txt")).await.unwrap().unwrap();
        assert!(file.is_file());
        assert_eq!(file.size, 5);

        let dir = fs.stat(&p("/d")).await.unwrap().unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.modified, file.modified);

        assert!(fs.stat(&p("/none")).await.unwrap().is_none());
        assert!(fs.stat(&HostPath::root()).await.unwrap().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_stat_is_recomputed() {
        let fs = SimpleMemoryHost::new();
        fs.write(&p("/f"), "a".into()).await.unwrap();
        assert_eq!(fs.stat(&p("/f")).await.unwrap().unwrap().size, 1);
        fs.write(&p("/f"), "abc".into()).await.unwrap();
        assert_eq!(fs.stat(&p("/f")).await.unwrap().unwrap().size, 3);
    }

    #[tokio::test]
    async fn test_clone_is_independent() {
        let original = SimpleMemoryHost::from_files([(p("/shared"), "v1")]).unwrap();
        let copy = original.clone();

        copy.write(&p("/shared"), "v2".into()).await.unwrap();
        original.write(&p("/only-original"), "o".into()).await.unwrap();

        assert_eq!(original.read(&p("/shared")).await.unwrap().as_bytes(), b"v1");
        assert!(!copy.exists(&p("/only-original")).await.unwrap());
    }

    #[tokio::test]
    async fn test_watch_events() {
        let fs = SimpleMemoryHost::new();
        let mut events = fs.watch(&p("/w"), WatchOptions::default()).unwrap();

        fs.write(&p("/elsewhere"), "x".into()).await.unwrap();
        fs.write(&p("/w/a"), "1".into()).await.unwrap();
        fs.write(&p("/w/a"), "2".into()).await.unwrap();
        fs.rename(&p("/w/a"), &p("/w/b")).await.unwrap();
        fs.delete(&p("/w")).await.unwrap();

        let kinds: Vec<_> = (&mut events).take(4).map(|e| (e.kind, e.path)).collect().await;
        assert_eq!(
            kinds,
            vec![
                (HostWatchEventKind::Created, p("/w/a")),
                (HostWatchEventKind::Changed, p("/w/a")),
                (HostWatchEventKind::Renamed, p("/w/a")),
                (HostWatchEventKind::Deleted, p("/w/b")),
            ]
        );
    }

    #[tokio::test]
    async fn test_seed_does_not_emit_events() {
        let fs = SimpleMemoryHost::new();
        let mut events = fs.watch(&HostPath::root(), WatchOptions::default()).unwrap();
        fs.seed([(p("/seeded"), "s")]).unwrap();
        fs.write(&p("/written"), "w".into()).await.unwrap();

        assert_eq!(events.next().await.unwrap().path, p("/written"));
    }

    #[test]
    fn test_is_synchronous() {
        assert!(SimpleMemoryHost::new().capabilities().synchronous);
    }
}
