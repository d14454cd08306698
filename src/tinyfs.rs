//! The public API surface: mount state, the file table, and every operation
//! of the original design's `libTinyFS.c` re-expressed as methods on one
//! owned handle.
//!
//! The original design kept the mounted disk and the file table as C file
//! statics, making them true process-wide singletons. An owned `TinyFs`
//! struct is the idiomatic Rust equivalent: a caller that wants the "at most
//! one mount" invariant simply keeps a single instance around, and the type
//! system (rather than hidden global state) is what a second, independent
//! mount attempt on the same instance is checked against.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{info, warn};

use crate::block_device::BlockDevice;
use crate::chain;
use crate::error::{TfsError, TfsResult};
use crate::file_table::{FileDescriptor, FileTable};
use crate::volume::{self, DEFAULT_DISK_NAME, DEFAULT_DISK_SIZE};

/// Metadata returned by [`TinyFs::read_file_info`].
#[derive(Debug, Clone)]
pub struct FileInfo {
	/// The file's current name.
	pub name: String,
	/// The file's current size in bytes.
	pub size: u64,
	/// The file's head block, if it has any content.
	pub head_block: Option<u64>,
	/// When the descriptor was first opened.
	pub created_at: SystemTime,
	/// Whether the file is currently read-only.
	pub read_only: bool,
}

enum Mount {
	Unmounted,
	Mounted { device: BlockDevice, path: PathBuf },
}

/// A TinyFS session: at most one mounted volume, and the file table that
/// goes with it.
pub struct TinyFs {
	mount: Mount,
	table: FileTable,
}

impl Default for TinyFs {
	fn default() -> Self {
		Self::new()
	}
}

impl TinyFs {
	/// Creates an unmounted session.
	pub fn new() -> Self {
		Self {
			mount: Mount::Unmounted,
			table: FileTable::new(),
		}
	}

	/// Formats a blank volume at `path` with `n_bytes`, rounded down to a
	/// multiple of the block size. Requires and leaves `Unmounted`.
	pub fn format(&self, path: impl AsRef<Path>, n_bytes: u64) -> TfsResult<()> {
		if matches!(self.mount, Mount::Mounted { .. }) {
			return Err(TfsError::DiskAlreadyMounted);
		}
		volume::format(path.as_ref(), n_bytes)
	}

	/// Formats a blank volume at the default path and size.
	pub fn format_default(&self) -> TfsResult<()> {
		self.format(DEFAULT_DISK_NAME, DEFAULT_DISK_SIZE)
	}

	/// Mounts the volume at `path`, verifying its superblock.
	pub fn mount(&mut self, path: impl AsRef<Path>) -> TfsResult<()> {
		if matches!(self.mount, Mount::Mounted { .. }) {
			return Err(TfsError::DiskAlreadyMounted);
		}

		let path = path.as_ref().to_path_buf();
		let mut device = BlockDevice::open(&path, 0)?;
		if let Err(err) = volume::check_superblock(&mut device) {
			warn!("mount({}) rejected: {err}", path.display());
			return Err(err);
		}

		info!("mounted {}", path.display());
		self.mount = Mount::Mounted { device, path };
		Ok(())
	}

	/// Unmounts the current volume and clears the file table (I7).
	pub fn unmount(&mut self) -> TfsResult<()> {
		match std::mem::replace(&mut self.mount, Mount::Unmounted) {
			Mount::Unmounted => Err(TfsError::DiskNotOpen),
			Mount::Mounted { path, .. } => {
				self.table.clear();
				info!("unmounted {}", path.display());
				Ok(())
			}
		}
	}

	/// Whether a volume is currently mounted.
	pub fn is_mounted(&self) -> bool {
		matches!(self.mount, Mount::Mounted { .. })
	}

	fn device(&mut self) -> TfsResult<&mut BlockDevice> {
		match &mut self.mount {
			Mount::Mounted { device, .. } => Ok(device),
			Mount::Unmounted => Err(TfsError::DiskNotOpen),
		}
	}

	/// Opens (creating if necessary) the file named `name`, returning its
	/// descriptor.
	pub fn open_file(&mut self, name: &str) -> TfsResult<FileDescriptor> {
		self.device()?;
		self.table.open(name)
	}

	/// Closes `fd`. The file's content stays on disk but becomes
	/// unreachable from this session (I7).
	pub fn close_file(&mut self, fd: FileDescriptor) -> TfsResult<()> {
		self.device()?;
		self.table.remove(fd)?;
		Ok(())
	}

	/// Frees `fd`'s chain on disk and removes its record.
	pub fn delete_file(&mut self, fd: FileDescriptor) -> TfsResult<()> {
		let device = self.device()?;
		let meta = self.table.get(fd)?;
		if meta.read_only {
			return Err(TfsError::FileReadOnly);
		}
		if let Some(head) = meta.head_block {
			volume::free_chain(device, head)?;
		}
		self.table.remove(fd)?;
		Ok(())
	}

	/// Replaces `fd`'s content with `buffer`.
	pub fn write_file(&mut self, fd: FileDescriptor, buffer: &[u8]) -> TfsResult<()> {
		let device = self.device()?;
		let meta = self.table.get_mut(fd)?;
		chain::write_content(device, meta, buffer)
	}

	/// Reads one byte at `fd`'s cursor, advancing it.
	pub fn read_byte(&mut self, fd: FileDescriptor) -> TfsResult<u8> {
		let device = self.device()?;
		let meta = self.table.get_mut(fd)?;
		chain::read_byte_at_cursor(device, meta)
	}

	/// Moves `fd`'s cursor to absolute offset `off`.
	pub fn seek(&mut self, fd: FileDescriptor, off: u64) -> TfsResult<()> {
		let device = self.device()?;
		let meta = self.table.get_mut(fd)?;
		chain::seek_to(device, meta, off)
	}

	/// Overwrites the single byte at `off` in `fd`'s content.
	pub fn write_byte(&mut self, fd: FileDescriptor, off: u64, value: u8) -> TfsResult<()> {
		let device = self.device()?;
		let meta = self.table.get(fd)?;
		chain::write_byte(device, meta, off, value)
	}

	/// Renames `fd` to `new_name`, refusing if another open file already has
	/// that name.
	pub fn rename(&mut self, fd: FileDescriptor, new_name: &str) -> TfsResult<()> {
		self.device()?;
		self.table.rename(fd, new_name)
	}

	/// Lists every open file's name, in table order.
	pub fn readdir(&mut self) -> TfsResult<Vec<String>> {
		self.device()?;
		Ok(self.table.names().map(str::to_string).collect())
	}

	/// Marks the file named `name` read-only.
	pub fn make_read_only(&mut self, name: &str) -> TfsResult<()> {
		self.device()?;
		let fd = self
			.table
			.find(name)
			.ok_or_else(|| TfsError::FileNotFound(name.to_string()))?;
		self.table.get_mut(fd)?.read_only = true;
		Ok(())
	}

	/// Clears the read-only flag on the file named `name`.
	pub fn make_read_write(&mut self, name: &str) -> TfsResult<()> {
		self.device()?;
		let fd = self
			.table
			.find(name)
			.ok_or_else(|| TfsError::FileNotFound(name.to_string()))?;
		self.table.get_mut(fd)?.read_only = false;
		Ok(())
	}

	/// Returns `fd`'s metadata.
	pub fn read_file_info(&mut self, fd: FileDescriptor) -> TfsResult<FileInfo> {
		self.device()?;
		let meta = self.table.get(fd)?;
		Ok(FileInfo {
			name: meta.name.clone(),
			size: meta.size,
			head_block: meta.head_block,
			created_at: meta.created_at,
			read_only: meta.read_only,
		})
	}

	/// Verifies I1-I5 against the currently mounted volume and every
	/// currently open file. Chains belonging to files that were written and
	/// then closed without deletion are invisible to this check (I7): the
	/// file table is session-only, so an orphaned chain cannot be named.
	pub fn check_consistency(&mut self) -> TfsResult<()> {
		let device = self.device()?;
		volume::check_superblock(device)?;

		let mut free_set = std::collections::HashSet::new();
		volume::walk_free_chain(device, |b, block_type, magic| {
			if block_type != volume::TYPE_FREE || magic != volume::MAGIC {
				return Err(TfsError::InvalidFilesystem(format!(
					"block {b} on the free chain has the wrong header"
				)));
			}
			if !free_set.insert(b) {
				return Err(TfsError::InvalidFilesystem(format!(
					"block {b} appears twice in the free chain"
				)));
			}
			Ok(())
		})?;

		let mut allocated_set = std::collections::HashSet::new();
		for meta in self.table.iter() {
			let Some(head) = meta.head_block else {
				continue;
			};
			let mut current = Some(head);
			let mut visited = std::collections::HashSet::new();
			while let Some(b) = current {
				if !visited.insert(b) {
					return Err(TfsError::InvalidFilesystem(format!(
						"file {:?} has a cyclic chain at block {b}",
						meta.name
					)));
				}
				if free_set.contains(&b) {
					return Err(TfsError::InvalidFilesystem(format!(
						"block {b} is both free and allocated to {:?}",
						meta.name
					)));
				}
				if !allocated_set.insert(b) {
					return Err(TfsError::InvalidFilesystem(format!(
						"block {b} is allocated to more than one file"
					)));
				}
				// Validates {3, 0x44} on every visited block (I3), not just the link.
				let (link, _) = volume::read_data_block(device, b)?;
				current = link;
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn mounted(dir: &tempfile::TempDir, blocks: u64) -> (TinyFs, std::path::PathBuf) {
		let path = dir.path().join("disk");
		let mut tfs = TinyFs::new();
		tfs.format(&path, crate::block_device::BLOCK_SIZE as u64 * blocks)
			.unwrap();
		tfs.mount(&path).unwrap();
		(tfs, path)
	}

	#[test]
	fn format_mount_unmount_scenario() {
		let dir = tempfile::tempdir().unwrap();
		let (mut tfs, _path) = mounted(&dir, 40);
		tfs.unmount().unwrap();
		assert!(matches!(tfs.unmount(), Err(TfsError::DiskNotOpen)));
	}

	#[test]
	fn double_mount_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let (mut tfs, path) = mounted(&dir, 40);
		assert!(matches!(
			tfs.mount(&path),
			Err(TfsError::DiskAlreadyMounted)
		));
	}

	#[test]
	fn format_while_mounted_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let (tfs, path) = mounted(&dir, 40);
		assert!(matches!(
			tfs.format(&path, crate::block_device::BLOCK_SIZE as u64 * 40),
			Err(TfsError::DiskAlreadyMounted)
		));
	}

	#[test]
	fn check_consistency_rejects_corrupted_data_block_header() {
		let dir = tempfile::tempdir().unwrap();
		let (mut tfs, _) = mounted(&dir, 40);

		let fd = tfs.open_file("f").unwrap();
		tfs.write_file(fd, b"hello").unwrap();
		let head = tfs.read_file_info(fd).unwrap().head_block.unwrap();

		let device = tfs.device().unwrap();
		let mut buf = [0u8; crate::block_device::BLOCK_SIZE];
		device.read_block(head, &mut buf).unwrap();
		buf[1] = 0; // corrupt the magic byte, leave the link intact
		device.write_block(head, &buf).unwrap();

		assert!(matches!(
			tfs.check_consistency(),
			Err(TfsError::InvalidFilesystem(_))
		));
	}

	#[test]
	fn small_file_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let (mut tfs, _) = mounted(&dir, 40);

		let fd = tfs.open_file("iamfile").unwrap();
		let mut content = b"I am file. A very good file. ".repeat(7);
		content.truncate(200);
		*content.last_mut().unwrap() = 0;
		tfs.write_file(fd, &content).unwrap();

		tfs.seek(fd, 0).unwrap();
		let mut out = Vec::new();
		for _ in 0..200 {
			out.push(tfs.read_byte(fd).unwrap());
		}
		assert_eq!(out, content);
		assert!(matches!(tfs.read_byte(fd), Err(TfsError::EndOfFile)));
	}

	#[test]
	fn multi_block_file_passes_consistency_check() {
		let dir = tempfile::tempdir().unwrap();
		let (mut tfs, _) = mounted(&dir, 40);

		let fd = tfs.open_file("big").unwrap();
		let content: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
		tfs.write_file(fd, &content).unwrap();

		tfs.seek(fd, 0).unwrap();
		let mut out = Vec::with_capacity(1000);
		for _ in 0..1000 {
			out.push(tfs.read_byte(fd).unwrap());
		}
		assert_eq!(out, content);
		tfs.check_consistency().unwrap();
	}

	#[test]
	fn rename_collision_keeps_both_names() {
		let dir = tempfile::tempdir().unwrap();
		let (mut tfs, _) = mounted(&dir, 40);

		tfs.open_file("a").unwrap();
		let fd_b = tfs.open_file("b").unwrap();
		assert!(matches!(
			tfs.rename(fd_b, "a"),
			Err(TfsError::FileAlreadyExists(_))
		));

		let names = tfs.readdir().unwrap();
		assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn read_only_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let (mut tfs, _) = mounted(&dir, 40);

		let fd = tfs.open_file("f").unwrap();
		tfs.write_file(fd, &[0u8; 50]).unwrap();
		tfs.make_read_only("f").unwrap();

		assert!(matches!(
			tfs.write_file(fd, &[1u8; 10]),
			Err(TfsError::FileReadOnly)
		));
		assert!(matches!(
			tfs.write_byte(fd, 0, b'X'),
			Err(TfsError::FileReadOnly)
		));

		tfs.make_read_write("f").unwrap();
		tfs.write_byte(fd, 0, b'X').unwrap();
		tfs.seek(fd, 0).unwrap();
		assert_eq!(tfs.read_byte(fd).unwrap(), b'X');
	}

	#[test]
	fn disk_full_recovery() {
		let dir = tempfile::tempdir().unwrap();
		// 10 blocks total: 1 superblock + 9 free.
		let (mut tfs, _) = mounted(&dir, 10);

		let fd = tfs.open_file("huge").unwrap();
		// 12 blocks' worth of content, more than the 9 available.
		let content = vec![7u8; crate::volume::PAYLOAD_SIZE * 12];
		assert!(matches!(
			tfs.write_file(fd, &content),
			Err(TfsError::DiskFull)
		));

		tfs.check_consistency().unwrap();

		let device = tfs.device().unwrap();
		let mut free_count = 0;
		crate::volume::walk_free_chain(device, |_, _, _| {
			free_count += 1;
			Ok(())
		})
		.unwrap();
		assert_eq!(free_count, 9);
	}
}
