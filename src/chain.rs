//! Walks and rewrites a single file's singly-linked chain of data blocks.
//!
//! This plays the role `maestro`'s `Ext2INode::read_content`/`write_content`
//! (`src/file/fs/ext2/inode.rs`) play for ext2's indirect-block tree, minus
//! the indirection levels: TinyFS files never grow past whatever a single
//! write allocated, so there is exactly one level of chaining to walk.

use crate::block_device::BlockDevice;
use crate::error::{TfsError, TfsResult};
use crate::file_table::FileMeta;
use crate::volume::{self, PAYLOAD_SIZE};

/// Replaces a file's entire content with `buffer`, discarding whatever chain
/// it had before.
///
/// On success the cursor is reset to the start of the file. On a disk-full
/// partway through allocation, every block allocated for this write is
/// freed, the file becomes empty, and the error is returned; the file's
/// previous content (already freed above) is not restored, matching the
/// "second write replaces the file's content entirely" rule.
pub fn write_content(device: &mut BlockDevice, meta: &mut FileMeta, buffer: &[u8]) -> TfsResult<()> {
	if meta.read_only {
		return Err(TfsError::FileReadOnly);
	}

	if let Some(head) = meta.head_block.take() {
		volume::free_chain(device, head)?;
	}
	meta.size = 0;
	meta.cursor_block = None;
	meta.cursor_offset = 0;

	if buffer.is_empty() {
		return Ok(());
	}

	let need = buffer.len().div_ceil(PAYLOAD_SIZE);
	let mut blocks = Vec::with_capacity(need);
	for _ in 0..need {
		match volume::allocate_one(device) {
			Ok(b) => blocks.push(b),
			Err(err) => {
				for b in &blocks {
					// Each block was allocated independently with link=0, so
					// freeing it as a one-block chain is correct.
					let _ = volume::free_chain(device, *b);
				}
				return Err(err);
			}
		}
	}

	for (i, &blk) in blocks.iter().enumerate() {
		let start = i * PAYLOAD_SIZE;
		let end = (start + PAYLOAD_SIZE).min(buffer.len());
		let mut payload = [0u8; PAYLOAD_SIZE];
		payload[..end - start].copy_from_slice(&buffer[start..end]);
		let next = blocks.get(i + 1).copied();
		volume::write_data_block(device, blk, next, &payload)?;
	}

	meta.head_block = Some(blocks[0]);
	meta.size = buffer.len() as u64;
	meta.cursor_block = Some(blocks[0]);
	meta.cursor_offset = 0;
	Ok(())
}

/// Reads the byte at the cursor and advances it by one.
///
/// Returns [`TfsError::EndOfFile`] without advancing the cursor if it is
/// already at or past `size`.
pub fn read_byte_at_cursor(device: &mut BlockDevice, meta: &mut FileMeta) -> TfsResult<u8> {
	if meta.cursor_offset >= meta.size {
		return Err(TfsError::EndOfFile);
	}
	let block = meta
		.cursor_block
		.expect("cursor_block must be set while cursor_offset < size");

	let (link, payload) = volume::read_data_block(device, block)?;
	let inner = (meta.cursor_offset % PAYLOAD_SIZE as u64) as usize;
	let byte = payload[inner];

	meta.cursor_offset += 1;
	if meta.cursor_offset % PAYLOAD_SIZE as u64 == 0 && meta.cursor_offset < meta.size {
		meta.cursor_block = link;
	}
	Ok(byte)
}

/// Moves the cursor to absolute offset `off`, which must satisfy
/// `0 <= off < size`.
pub fn seek_to(device: &mut BlockDevice, meta: &mut FileMeta, off: u64) -> TfsResult<()> {
	if off >= meta.size {
		return Err(TfsError::InvalidSeek(off));
	}
	let mut block = meta.head_block.ok_or(TfsError::InvalidSeek(off))?;
	let steps = off / PAYLOAD_SIZE as u64;
	for _ in 0..steps {
		block = volume::next_of(device, block)?
			.expect("chain shorter than recorded size implies a corrupted volume");
	}
	meta.cursor_block = Some(block);
	meta.cursor_offset = off;
	Ok(())
}

/// Overwrites the single byte at absolute offset `off`, which must satisfy
/// `0 <= off < size`.
pub fn write_byte(device: &mut BlockDevice, meta: &FileMeta, off: u64, value: u8) -> TfsResult<()> {
	if meta.read_only {
		return Err(TfsError::FileReadOnly);
	}
	if off >= meta.size {
		return Err(TfsError::InvalidSeek(off));
	}
	let mut block = meta.head_block.ok_or(TfsError::InvalidSeek(off))?;
	let steps = off / PAYLOAD_SIZE as u64;
	for _ in 0..steps {
		block = volume::next_of(device, block)?
			.expect("chain shorter than recorded size implies a corrupted volume");
	}

	let (link, mut payload) = volume::read_data_block(device, block)?;
	let inner = (off % PAYLOAD_SIZE as u64) as usize;
	payload[inner] = value;
	volume::write_data_block(device, block, link, &payload)?;

	let (_, verify) = volume::read_data_block(device, block)?;
	if verify[inner] != value {
		return Err(TfsError::WriteError(format!(
			"byte at offset {off} did not round-trip"
		)));
	}
	Ok(())
}
