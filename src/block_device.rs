//! Emulates a fixed-block-size storage device on top of one host regular
//! file.
//!
//! This mirrors the `StorageInterface` boundary a real block driver would
//! sit behind: whole blocks in, whole blocks out, no caching, one host I/O
//! call per operation.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::trace;

use crate::error::{TfsError, TfsResult};

/// The size in bytes of every block on the device.
pub const BLOCK_SIZE: usize = 256;

/// A host file treated as a random-access array of fixed-size blocks.
#[derive(Debug)]
pub struct BlockDevice {
	file: File,
	block_count: u64,
}

impl BlockDevice {
	/// Opens (or creates) the host file at `path`.
	///
	/// If `n_bytes` is `0`, an existing host file is opened as-is and its
	/// content is left untouched; it is an error for the file to be absent.
	/// Otherwise `n_bytes` is rounded down to a multiple of [`BLOCK_SIZE`],
	/// the host file is created or truncated to that size, and the whole
	/// region is zero-filled. Rounding down to `0` is an error.
	pub fn open(path: &Path, n_bytes: u64) -> TfsResult<Self> {
		if n_bytes == 0 {
			if !path.exists() {
				return Err(TfsError::DiskNotFound(path.display().to_string()));
			}
			let file = OpenOptions::new().read(true).write(true).open(path)?;
			let block_count = file.metadata()?.len() / BLOCK_SIZE as u64;
			return Ok(Self { file, block_count });
		}

		let block_count = n_bytes / BLOCK_SIZE as u64;
		if block_count == 0 {
			return Err(TfsError::DiskFailure(format!(
				"{n_bytes} bytes rounds down to zero blocks"
			)));
		}
		let rounded = block_count * BLOCK_SIZE as u64;

		let mut file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;
		let zero_block = [0u8; BLOCK_SIZE];
		for _ in 0..block_count {
			file.write_all(&zero_block)?;
		}
		file.set_len(rounded)?;

		Ok(Self { file, block_count })
	}

	/// The number of blocks addressable on this device.
	pub fn block_count(&self) -> u64 {
		self.block_count
	}

	/// Reads the block at `idx` into `buf`, which must be exactly
	/// [`BLOCK_SIZE`] bytes.
	pub fn read_block(&mut self, idx: u64, buf: &mut [u8]) -> TfsResult<()> {
		debug_assert_eq!(buf.len(), BLOCK_SIZE);
		self.check_index(idx)?;

		trace!("read_block({idx})");
		self.file
			.seek(SeekFrom::Start(idx * BLOCK_SIZE as u64))
			.map_err(|e| TfsError::ReadError(e.to_string()))?;
		self.file
			.read_exact(buf)
			.map_err(|e| TfsError::ReadError(e.to_string()))
	}

	/// Writes `buf`, which must be exactly [`BLOCK_SIZE`] bytes, to the
	/// block at `idx`.
	pub fn write_block(&mut self, idx: u64, buf: &[u8]) -> TfsResult<()> {
		debug_assert_eq!(buf.len(), BLOCK_SIZE);
		self.check_index(idx)?;

		trace!("write_block({idx})");
		self.file
			.seek(SeekFrom::Start(idx * BLOCK_SIZE as u64))
			.map_err(|e| TfsError::WriteError(e.to_string()))?;
		self.file
			.write_all(buf)
			.map_err(|e| TfsError::WriteError(e.to_string()))
	}

	fn check_index(&self, idx: u64) -> TfsResult<()> {
		if idx >= self.block_count {
			return Err(TfsError::InvalidBlock(idx as i64));
		}
		Ok(())
	}
}
