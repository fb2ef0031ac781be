//! Recording in-memory host for tests.
//!
//! [`TestHost`] is a [`RecordingHost`] over a [`SimpleMemoryHost`] with a
//! synchronous bridge and string helpers on top:
//!
//! ```
//! use treehost::testing::TestHost;
//!
//! let host = TestHost::with_files([("/src/lib.rs", "// lib")]).unwrap();
//! host.write_text("/src/main.rs", "fn main() {}").unwrap();
//!
//! assert_eq!(host.read_text("/src/main.rs").unwrap(), "fn main() {}");
//! assert_eq!(host.records().len(), 2);
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::backends::SimpleMemoryHost;
use crate::error::{HostError, HostResult};
use crate::ops::Host;
use crate::path::{HostPath, PathFragment};
use crate::record::{HostRecord, RecordingHost};
use crate::sync::SyncDelegateHost;
use crate::types::{FileBuffer, HostCapabilities, Stats};
use crate::watch::{WatchOptions, WatchStream};

type Recorded = RecordingHost<SimpleMemoryHost>;

/// In-memory host that records every operation.
///
/// Helpers and `files()` go through the same recorded primitives as direct
/// `Host` calls, so they show up in `records()` as well.
#[derive(Debug)]
pub struct TestHost {
    sync: SyncDelegateHost<Recorded>,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TestHost {
    /// Independent copy of the current content with an empty log.
    fn clone(&self) -> Self {
        Self::from_memory(self.memory().clone())
    }
}

impl TestHost {
    /// Create an empty test host.
    pub fn new() -> Self {
        Self::from_memory(SimpleMemoryHost::new())
    }

    /// Create a test host pre-populated with text files.
    ///
    /// Pre-population is not recorded.
    pub fn with_files<I, K, V>(files: I) -> HostResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let seeded = files
            .into_iter()
            .map(|(k, v)| Ok((HostPath::new(k.as_ref())?, FileBuffer::from(v.as_ref()))))
            .collect::<HostResult<Vec<_>>>()?;
        Ok(Self::from_memory(SimpleMemoryHost::from_files(seeded)?))
    }

    fn from_memory(memory: SimpleMemoryHost) -> Self {
        let recorded = Arc::new(RecordingHost::new(memory));
        Self {
            sync: SyncDelegateHost::new(recorded),
        }
    }

    fn recorded(&self) -> &Recorded {
        self.sync.delegate()
    }

    /// The underlying memory host. Calls made on it are not recorded.
    pub fn memory(&self) -> &SimpleMemoryHost {
        self.recorded().delegate()
    }

    /// The synchronous bridge over the recorded host.
    pub fn sync(&self) -> &SyncDelegateHost<RecordingHost<SimpleMemoryHost>> {
        &self.sync
    }

    /// Snapshot of the log, in invocation order.
    pub fn records(&self) -> Vec<HostRecord> {
        self.recorded().records()
    }

    /// Empty the log.
    pub fn clear_records(&self) {
        self.recorded().clear_records();
    }

    /// Every file path in the tree, sorted. Directories are not included.
    pub fn files(&self) -> HostResult<Vec<HostPath>> {
        let mut out = Vec::new();
        self.visit(&HostPath::root(), &mut out)?;
        out.sort();
        Ok(out)
    }

    fn visit(&self, dir: &HostPath, out: &mut Vec<HostPath>) -> HostResult<()> {
        for fragment in self.sync.list(dir)? {
            let path = dir.join(&fragment);
            if self.sync.is_directory(&path)? {
                self.visit(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }

    /// Write a text file.
    pub fn write_text(&self, path: &str, content: &str) -> HostResult<()> {
        self.sync.write(&HostPath::new(path)?, content)
    }

    /// Read a file as UTF-8 text.
    pub fn read_text(&self, path: &str) -> HostResult<String> {
        let buffer = self.sync.read(&HostPath::new(path)?)?;
        buffer
            .to_text()
            .map(str::to_owned)
            .map_err(|e| HostError::other(format!("{path} is not valid UTF-8: {e}")))
    }

    /// List a directory.
    pub fn list_sync(&self, path: &str) -> HostResult<Vec<PathFragment>> {
        self.sync.list(&HostPath::new(path)?)
    }

    /// Check if a path exists.
    pub fn exists_sync(&self, path: &str) -> HostResult<bool> {
        self.sync.exists(&HostPath::new(path)?)
    }

    /// Check if a path is a directory.
    pub fn is_directory_sync(&self, path: &str) -> HostResult<bool> {
        self.sync.is_directory(&HostPath::new(path)?)
    }

    /// Check if a path is a file.
    pub fn is_file_sync(&self, path: &str) -> HostResult<bool> {
        self.sync.is_file(&HostPath::new(path)?)
    }
}

#[async_trait]
impl Host for TestHost {
    async fn write(&self, path: &HostPath, content: FileBuffer) -> HostResult<()> {
        self.recorded().write(path, content).await
    }

    async fn read(&self, path: &HostPath) -> HostResult<FileBuffer> {
        self.recorded().read(path).await
    }

    async fn delete(&self, path: &HostPath) -> HostResult<()> {
        self.recorded().delete(path).await
    }

    async fn rename(&self, from: &HostPath, to: &HostPath) -> HostResult<()> {
        self.recorded().rename(from, to).await
    }

    async fn list(&self, path: &HostPath) -> HostResult<Vec<PathFragment>> {
        self.recorded().list(path).await
    }

    async fn stat(&self, path: &HostPath) -> HostResult<Option<Stats>> {
        self.recorded().stat(path).await
    }

    async fn exists(&self, path: &HostPath) -> HostResult<bool> {
        self.recorded().exists(path).await
    }

    async fn is_directory(&self, path: &HostPath) -> HostResult<bool> {
        self.recorded().is_directory(path).await
    }

    async fn is_file(&self, path: &HostPath) -> HostResult<bool> {
        self.recorded().is_file(path).await
    }

    fn watch(&self, path: &HostPath, options: WatchOptions) -> Option<WatchStream> {
        self.recorded().watch(path, options)
    }

    fn capabilities(&self) -> HostCapabilities {
        self.recorded().capabilities()
    }
}
