//! Error kinds returned by every TinyFS operation.

use std::io;

/// The error type shared by every public TinyFS operation.
///
/// Each variant corresponds to one of the abstract error kinds of the
/// original design: a nonspecific `generic-error` is not modeled as its own
/// variant since every failure in this crate can be attributed to a precise
/// cause.
#[derive(Debug, thiserror::Error)]
pub enum TfsError {
	/// No volume is currently mounted.
	#[error("no disk is currently open")]
	DiskNotOpen,
	/// `mount` was called on a path with no host file.
	#[error("disk file not found: {0}")]
	DiskNotFound(String),
	/// A block index was negative or otherwise out of range.
	#[error("invalid block index: {0}")]
	InvalidBlock(i64),
	/// The free-block chain is empty.
	#[error("disk is full")]
	DiskFull,
	/// No record with the given name exists.
	#[error("file not found: {0}")]
	FileNotFound(String),
	/// `rename` targeted a name already in use.
	#[error("file already exists: {0}")]
	FileAlreadyExists(String),
	/// The descriptor is out of range of the file table.
	#[error("file descriptor not open: {0}")]
	FileNotOpen(u32),
	/// The file is marked read-only.
	#[error("file is read-only")]
	FileReadOnly,
	/// `seek` or `write_byte` was given an offset outside `[0, size)`.
	#[error("invalid seek offset: {0}")]
	InvalidSeek(u64),
	/// A host write failed.
	#[error("write error: {0}")]
	WriteError(String),
	/// A host read failed.
	#[error("read error: {0}")]
	ReadError(String),
	/// The host file could not be opened, created, or formatted.
	#[error("disk failure: {0}")]
	DiskFailure(String),
	/// `mount` was called while a volume was already mounted.
	#[error("a disk is already mounted")]
	DiskAlreadyMounted,
	/// The superblock (or another scanned block) failed its magic/type check.
	#[error("invalid filesystem: {0}")]
	InvalidFilesystem(String),
	/// The file table could not grow.
	#[error("out of memory growing the file table")]
	MemoryError,
	/// A `read_byte` call found the cursor at or past the end of the file.
	#[error("end of file")]
	EndOfFile,
}

/// Shorthand result type used throughout the crate.
pub type TfsResult<T> = Result<T, TfsError>;

impl From<io::Error> for TfsError {
	fn from(err: io::Error) -> Self {
		TfsError::DiskFailure(err.to_string())
	}
}
