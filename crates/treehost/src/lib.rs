//! # treehost
//!
//! A path-addressed file tree abstraction with swappable backends.
//!
//! Code that reads and writes files programs against the [`Host`] trait and
//! never learns where the tree actually lives:
//!
//! - [`SimpleMemoryHost`] keeps files in a flat ordered map. Directories are
//!   implicit: a directory exists exactly when some file lies beneath it.
//! - [`LocalHost`] serves a real directory through `tokio::fs`.
//! - [`ScopedHost`] presents a sub-tree of another host as its own root.
//! - [`SyncDelegateHost`] gives a blocking API over hosts whose operations
//!   never suspend.
//! - [`RecordingHost`] logs every primitive operation, and [`TestHost`]
//!   bundles all of the above into a test double.
//!
//! ## Contract
//!
//! Content operations (`write`, `read`, `delete`, `rename`) fail with a
//! [`HostError`] when their preconditions do not hold. Structural queries
//! (`list`, `exists`, `is_directory`, `is_file`, `stat`) answer for any
//! path, present or not.

pub mod backends;
pub mod config;
mod error;
mod ops;
pub mod path;
pub mod record;
pub mod sync;
pub mod testing;
mod types;
pub mod watch;

pub use backends::{LocalHost, ScopedHost, SimpleMemoryHost};
pub use config::{BackendConfig, ConfigError, HostConfig, WatchConfig};
pub use error::{HostError, HostResult};
pub use ops::Host;
pub use path::{HostPath, PathFragment};
pub use record::{HostRecord, RecordKind, RecordingHost};
pub use sync::SyncDelegateHost;
pub use testing::TestHost;
pub use types::{FileBuffer, FileType, HostCapabilities, Stats};
pub use watch::{
    HostWatchEvent, HostWatchEventKind, WatchHandle, WatchHub, WatchOptions, WatchStream,
};
