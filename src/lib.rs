//! TinyFS: a small single-volume flat filesystem living inside one host
//! regular file treated as a fixed-size block device.
//!
//! A volume is [formatted](tinyfs::TinyFs::format) into a host file, then
//! [mounted](tinyfs::TinyFs::mount) into a [`TinyFs`] session, which exposes
//! files as flat, unstructured byte streams addressed by name.

pub mod block_device;
pub mod chain;
pub mod error;
pub mod file_table;
pub mod tinyfs;
pub mod volume;

pub use error::{TfsError, TfsResult};
pub use file_table::FileDescriptor;
pub use tinyfs::{FileInfo, TinyFs};
