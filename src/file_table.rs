//! The in-memory, session-only file table.
//!
//! This plays the role `maestro`'s `FileDescriptorTable` (`src/file/fd.rs`)
//! plays for open files in the kernel, minus the shared open-file-description
//! indirection: TinyFS is single-volume and single-session, so a descriptor
//! simply is the record's current slot in an ordered `Vec`.

use std::time::SystemTime;

use crate::error::{TfsError, TfsResult};

/// Maximum length, in bytes, of a file name (not counting the terminator).
pub const MAX_NAME_LEN: usize = 8;

/// A descriptor is the record's current index in the file table.
///
/// Closing or deleting an earlier record shifts every later descriptor down
/// by one, exactly as the original design did; callers that hold onto a
/// descriptor across a `close_file`/`delete_file` of a lower-numbered
/// descriptor will silently observe a different file afterward. This is a
/// documented hazard, not a bug: spec's testable properties never assume
/// descriptor stability across close.
pub type FileDescriptor = usize;

/// In-memory metadata for one open file.
#[derive(Debug, Clone)]
pub struct FileMeta {
	/// Name, truncated to [`MAX_NAME_LEN`] bytes.
	pub name: String,
	/// Byte length of the file's payload.
	pub size: u64,
	/// First data block of the file's chain, or `None` if empty.
	pub head_block: Option<u64>,
	/// Block containing the byte at `cursor_offset`, or `None` if `size` is
	/// `0`.
	pub cursor_block: Option<u64>,
	/// Current read offset, `0 <= cursor_offset <= size`.
	pub cursor_offset: u64,
	/// Whether mutation is currently forbidden.
	pub read_only: bool,
	/// Timestamp captured when the descriptor was first opened.
	pub created_at: SystemTime,
}

/// Truncates `name` to at most [`MAX_NAME_LEN`] bytes, respecting char
/// boundaries.
fn truncate_name(name: &str) -> String {
	let mut end = name.len().min(MAX_NAME_LEN);
	while end > 0 && !name.is_char_boundary(end) {
		end -= 1;
	}
	name[..end].to_string()
}

impl FileMeta {
	fn new(name: &str) -> Self {
		Self {
			name: truncate_name(name),
			size: 0,
			head_block: None,
			cursor_block: None,
			cursor_offset: 0,
			read_only: false,
			created_at: SystemTime::now(),
		}
	}
}

/// An ordered, resizable sequence of file records.
///
/// While unmounted the table is always empty (I7): mounting never
/// repopulates it from disk, and unmounting clears it.
#[derive(Debug, Default)]
pub struct FileTable {
	records: Vec<FileMeta>,
}

impl FileTable {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self {
			records: Vec::new(),
		}
	}

	/// Returns the descriptor for `name`, opening a new record if none
	/// exists yet.
	pub fn open(&mut self, name: &str) -> TfsResult<FileDescriptor> {
		if let Some(fd) = self.find(name) {
			return Ok(fd);
		}
		self.records.try_reserve(1).map_err(|_| TfsError::MemoryError)?;
		self.records.push(FileMeta::new(name));
		Ok(self.records.len() - 1)
	}

	/// Returns the descriptor of the record named `name`, if any.
	pub fn find(&self, name: &str) -> Option<FileDescriptor> {
		let truncated = truncate_name(name);
		self.records.iter().position(|r| r.name == truncated)
	}

	/// Returns an immutable reference to the record at `fd`.
	pub fn get(&self, fd: FileDescriptor) -> TfsResult<&FileMeta> {
		self.records.get(fd).ok_or(TfsError::FileNotOpen(fd as u32))
	}

	/// Returns a mutable reference to the record at `fd`.
	pub fn get_mut(&mut self, fd: FileDescriptor) -> TfsResult<&mut FileMeta> {
		self.records
			.get_mut(fd)
			.ok_or(TfsError::FileNotOpen(fd as u32))
	}

	/// Removes the record at `fd`, shifting every later descriptor down by
	/// one. Returns the removed record so the caller can free its chain.
	pub fn remove(&mut self, fd: FileDescriptor) -> TfsResult<FileMeta> {
		if fd >= self.records.len() {
			return Err(TfsError::FileNotOpen(fd as u32));
		}
		Ok(self.records.remove(fd))
	}

	/// Renames the record at `fd`, refusing if another record already holds
	/// `new_name`.
	pub fn rename(&mut self, fd: FileDescriptor, new_name: &str) -> TfsResult<()> {
		self.get(fd)?;
		if let Some(other) = self.find(new_name) {
			if other != fd {
				return Err(TfsError::FileAlreadyExists(new_name.to_string()));
			}
		}
		let record = self.get_mut(fd)?;
		record.name = truncate_name(new_name);
		Ok(())
	}

	/// Iterates over every record's name in table order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.records.iter().map(|r| r.name.as_str())
	}

	/// Iterates over every record, used by `check_consistency`.
	pub fn iter(&self) -> impl Iterator<Item = &FileMeta> {
		self.records.iter()
	}

	/// Discards every record without touching disk, used on `unmount`.
	pub fn clear(&mut self) {
		self.records.clear();
	}

	/// The number of currently open records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Whether the table holds no records.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}
