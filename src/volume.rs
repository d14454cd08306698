//! On-disk block layout, volume formatting, and the free-block allocator.
//!
//! Every block begins with a 4-byte header: a type byte, the magic byte
//! `0x44`, and a little-endian `u16` "next" link (`0` meaning "none"). The
//! reference design on which this crate is based used a single link byte,
//! capping a volume at 255 blocks; this implementation widens the link
//! field to a `u16` so volumes up to 65535 blocks are addressable, which is
//! transparent to the default 40-block volume since the on-disk layout
//! still starts payload at byte 4 either way.

use std::path::Path;

use log::{debug, warn};

use crate::block_device::{BlockDevice, BLOCK_SIZE};
use crate::error::{TfsError, TfsResult};

/// Block type: roots the free chain.
pub const TYPE_SUPER: u8 = 1;
/// Block type: reserved for a future inode table, never produced by this
/// crate but tolerated when scanning.
pub const TYPE_INODE: u8 = 2;
/// Block type: holds file content and links to the next block in its file's
/// chain.
pub const TYPE_DATA: u8 = 3;
/// Block type: sits on the free chain.
pub const TYPE_FREE: u8 = 4;

/// The constant tag every TinyFS-owned block carries at offset 1.
pub const MAGIC: u8 = 0x44;

/// Offset of the payload within a data block.
pub const HEADER_SIZE: usize = 4;
/// Usable payload bytes per data block.
pub const PAYLOAD_SIZE: usize = BLOCK_SIZE - HEADER_SIZE;

/// The default total size, in bytes, of a freshly formatted volume.
pub const DEFAULT_DISK_SIZE: u64 = 10240;
/// The default host file name for a volume.
pub const DEFAULT_DISK_NAME: &str = "tinyFSDisk";

/// Block 0, which roots the free chain.
const SUPERBLOCK_INDEX: u64 = 0;

/// Decodes a block's header: `(type, magic, link)`.
fn decode_header(buf: &[u8]) -> (u8, u8, u16) {
	let link = u16::from_le_bytes([buf[2], buf[3]]);
	(buf[0], buf[1], link)
}

/// Encodes a block's header in place, zeroing any payload bytes already
/// present is the caller's responsibility.
fn encode_header(buf: &mut [u8], block_type: u8, link: u16) {
	buf[0] = block_type;
	buf[1] = MAGIC;
	buf[2..4].copy_from_slice(&link.to_le_bytes());
}

/// Reads block `idx` and returns its `(type, magic, link)` header.
fn read_header(device: &mut BlockDevice, idx: u64) -> TfsResult<(u8, u8, u16)> {
	let mut buf = [0u8; BLOCK_SIZE];
	device.read_block(idx, &mut buf)?;
	Ok(decode_header(&buf))
}

/// Rewrites block `idx` as a free block with the given `link`, zeroing its
/// payload.
fn write_free_block(device: &mut BlockDevice, idx: u64, link: u16) -> TfsResult<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	encode_header(&mut buf, TYPE_FREE, link);
	device.write_block(idx, &buf)
}

/// Formats a blank volume: creates the host file, writes the superblock
/// rooting the free chain, and chains every remaining block onto it.
pub fn format(path: &Path, n_bytes: u64) -> TfsResult<()> {
	let mut device = BlockDevice::open(path, n_bytes)?;
	let n = device.block_count();
	if n < 2 {
		return Err(TfsError::DiskFailure(
			"volume too small to hold a superblock and any data".into(),
		));
	}

	let mut super_buf = [0u8; BLOCK_SIZE];
	encode_header(&mut super_buf, TYPE_SUPER, 1);
	device.write_block(SUPERBLOCK_INDEX, &super_buf)?;

	for i in 1..n {
		let link = if i == n - 1 { 0 } else { (i + 1) as u16 };
		write_free_block(&mut device, i, link)?;
	}

	debug!("formatted {} with {n} blocks", path.display());
	Ok(())
}

/// Verifies that block 0 of the already-open `device` is a valid superblock.
pub fn check_superblock(device: &mut BlockDevice) -> TfsResult<()> {
	let (block_type, magic, _) = read_header(device, SUPERBLOCK_INDEX)?;
	if block_type != TYPE_SUPER || magic != MAGIC {
		return Err(TfsError::InvalidFilesystem(
			"block 0 is not a valid superblock".into(),
		));
	}
	Ok(())
}

/// Pops one block off the free chain, marks it as a (zeroed) data block, and
/// returns its index.
pub fn allocate_one(device: &mut BlockDevice) -> TfsResult<u64> {
	let (_, _, f) = read_header(device, SUPERBLOCK_INDEX)?;
	if f == 0 {
		warn!("allocate_one: free chain exhausted");
		return Err(TfsError::DiskFull);
	}
	let f = f as u64;

	let (block_type, magic, g) = read_header(device, f)?;
	if block_type != TYPE_FREE || magic != MAGIC {
		return Err(TfsError::InvalidFilesystem(format!(
			"block {f} on the free chain is not a free block"
		)));
	}

	let mut super_buf = [0u8; BLOCK_SIZE];
	encode_header(&mut super_buf, TYPE_SUPER, g);
	device.write_block(SUPERBLOCK_INDEX, &super_buf)?;

	let mut data_buf = [0u8; BLOCK_SIZE];
	encode_header(&mut data_buf, TYPE_DATA, 0);
	device.write_block(f, &data_buf)?;

	Ok(f)
}

/// Frees every block of the chain rooted at `head`, prepending each one onto
/// the superblock's free chain as it is visited.
pub fn free_chain(device: &mut BlockDevice, head: u64) -> TfsResult<()> {
	let mut current = Some(head);
	while let Some(b) = current {
		let (_, _, next) = read_header(device, b)?;

		let (_, _, s) = read_header(device, SUPERBLOCK_INDEX)?;
		write_free_block(device, b, s)?;

		let mut super_buf = [0u8; BLOCK_SIZE];
		encode_header(&mut super_buf, TYPE_SUPER, b as u16);
		device.write_block(SUPERBLOCK_INDEX, &super_buf)?;

		current = if next == 0 { None } else { Some(next as u64) };
	}
	Ok(())
}

/// Returns the block index following `b` in whatever chain it belongs to, or
/// `None` if `b` is the tail.
pub(crate) fn next_of(device: &mut BlockDevice, b: u64) -> TfsResult<Option<u64>> {
	let (_, _, link) = read_header(device, b)?;
	Ok((link != 0).then_some(link as u64))
}

/// Reads a data block, returning its link (`None` if it is the chain's tail)
/// and its full payload.
pub(crate) fn read_data_block(
	device: &mut BlockDevice,
	idx: u64,
) -> TfsResult<(Option<u64>, [u8; PAYLOAD_SIZE])> {
	let mut buf = [0u8; BLOCK_SIZE];
	device.read_block(idx, &mut buf)?;
	let (block_type, magic, link) = decode_header(&buf);
	if block_type != TYPE_DATA || magic != MAGIC {
		return Err(TfsError::InvalidFilesystem(format!(
			"block {idx} is not a valid data block"
		)));
	}
	let mut payload = [0u8; PAYLOAD_SIZE];
	payload.copy_from_slice(&buf[HEADER_SIZE..]);
	Ok(((link != 0).then_some(link as u64), payload))
}

/// Writes a data block with the given `link` (`None` encodes as `0`) and
/// payload. `payload` must be exactly [`PAYLOAD_SIZE`] bytes; shorter
/// content should be zero-padded by the caller.
pub(crate) fn write_data_block(
	device: &mut BlockDevice,
	idx: u64,
	link: Option<u64>,
	payload: &[u8],
) -> TfsResult<()> {
	debug_assert_eq!(payload.len(), PAYLOAD_SIZE);
	let mut buf = [0u8; BLOCK_SIZE];
	encode_header(&mut buf, TYPE_DATA, link.unwrap_or(0) as u16);
	buf[HEADER_SIZE..].copy_from_slice(payload);
	device.write_block(idx, &buf)
}

/// Walks the free chain rooted at the superblock, calling `f` with every
/// block index on it. Used by `check_consistency`.
pub(crate) fn walk_free_chain(
	device: &mut BlockDevice,
	mut f: impl FnMut(u64, u8, u8) -> TfsResult<()>,
) -> TfsResult<()> {
	let (_, _, head) = read_header(device, SUPERBLOCK_INDEX)?;
	let mut current = (head != 0).then_some(head as u64);
	while let Some(b) = current {
		let (block_type, magic, next) = read_header(device, b)?;
		f(b, block_type, magic)?;
		current = (next != 0).then_some(next as u64);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn format_builds_a_single_free_chain() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("disk");
		format(&path, BLOCK_SIZE as u64 * 10).unwrap();

		let mut device = BlockDevice::open(&path, 0).unwrap();
		check_superblock(&mut device).unwrap();

		let mut seen = Vec::new();
		walk_free_chain(&mut device, |b, t, m| {
			assert_eq!(t, TYPE_FREE);
			assert_eq!(m, MAGIC);
			seen.push(b);
			Ok(())
		})
		.unwrap();
		assert_eq!(seen, (1..10).collect::<Vec<_>>());
	}

	#[test]
	fn allocate_and_free_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("disk");
		format(&path, BLOCK_SIZE as u64 * 4).unwrap();
		let mut device = BlockDevice::open(&path, 0).unwrap();

		let a = allocate_one(&mut device).unwrap();
		let b = allocate_one(&mut device).unwrap();
		assert_ne!(a, b);

		free_chain(&mut device, a).unwrap();
		let c = allocate_one(&mut device).unwrap();
		assert_eq!(c, a, "freed block should be reused");
	}

	#[test]
	fn disk_full_when_chain_exhausted() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("disk");
		format(&path, BLOCK_SIZE as u64 * 3).unwrap();
		let mut device = BlockDevice::open(&path, 0).unwrap();

		allocate_one(&mut device).unwrap();
		allocate_one(&mut device).unwrap();
		assert!(matches!(allocate_one(&mut device), Err(TfsError::DiskFull)));
	}
}
