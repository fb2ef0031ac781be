//! Host backends.
//!
//! - [`SimpleMemoryHost`]: flat in-memory map with implicit directories
//! - [`LocalHost`]: a real directory on disk
//! - [`ScopedHost`]: a sub-tree of another host presented as its own root

mod local;
mod memory;
mod scoped;

pub use local::LocalHost;
pub use memory::SimpleMemoryHost;
pub use scoped::ScopedHost;
