//! End-to-end scenarios exercising `TinyFs` through its public API only,
//! against real temporary host files.

use tinyfs::{TfsError, TinyFs};

fn disk_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
	dir.path().join("volume")
}

#[test]
fn format_mount_unmount() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();

	tfs.format(&path, 10240).unwrap();
	tfs.mount(&path).unwrap();
	tfs.unmount().unwrap();
	assert!(matches!(tfs.unmount(), Err(TfsError::DiskNotOpen)));
}

#[test]
fn write_read_small_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();
	tfs.format(&path, 10240).unwrap();
	tfs.mount(&path).unwrap();

	let phrase = "I am file. A very good file. ";
	let mut content: Vec<u8> = phrase.bytes().cycle().take(200).collect();
	*content.last_mut().unwrap() = 0;

	let fd = tfs.open_file("iamfile").unwrap();
	tfs.write_file(fd, &content).unwrap();
	tfs.seek(fd, 0).unwrap();

	let mut out = Vec::with_capacity(200);
	for _ in 0..200 {
		out.push(tfs.read_byte(fd).unwrap());
	}
	assert_eq!(out, content);
	assert!(matches!(tfs.read_byte(fd), Err(TfsError::EndOfFile)));
}

#[test]
fn multi_block_file_chain_length_matches_spec() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();
	tfs.format(&path, 10240).unwrap();
	tfs.mount(&path).unwrap();

	let phrase = "silly file time ";
	let mut content: Vec<u8> = phrase.bytes().cycle().take(1000).collect();
	*content.last_mut().unwrap() = 0;

	let fd = tfs.open_file("sillyfile").unwrap();
	tfs.write_file(fd, &content).unwrap();

	let info = tfs.read_file_info(fd).unwrap();
	assert_eq!(info.size, 1000);

	tfs.seek(fd, 0).unwrap();
	let mut out = Vec::with_capacity(1000);
	for _ in 0..1000 {
		out.push(tfs.read_byte(fd).unwrap());
	}
	assert_eq!(out, content);
	tfs.check_consistency().unwrap();
}

#[test]
fn rename_collision_keeps_both_files_listed() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();
	tfs.format(&path, 10240).unwrap();
	tfs.mount(&path).unwrap();

	tfs.open_file("a").unwrap();
	let fd_b = tfs.open_file("b").unwrap();
	assert!(matches!(
		tfs.rename(fd_b, "a"),
		Err(TfsError::FileAlreadyExists(_))
	));

	let mut names = tfs.readdir().unwrap();
	names.sort();
	assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn read_only_enforcement() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();
	tfs.format(&path, 10240).unwrap();
	tfs.mount(&path).unwrap();

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
fn disk_full_recovery_leaves_free_chain_intact() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();
	// 10 blocks: 1 superblock + 9 free data blocks.
	tfs.format(&path, 256 * 10).unwrap();
	tfs.mount(&path).unwrap();

	let fd = tfs.open_file("huge").unwrap();
	// 12 blocks' worth of payload, more than the 9 available.
	let content = vec![9u8; 252 * 12];
	assert!(matches!(
		tfs.write_file(fd, &content),
		Err(TfsError::DiskFull)
	));

	tfs.check_consistency().unwrap();
	assert_eq!(tfs.read_file_info(fd).unwrap().size, 0);
}

#[test]
fn second_mount_without_unmount_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();
	tfs.format(&path, 10240).unwrap();
	tfs.mount(&path).unwrap();

	assert!(matches!(
		tfs.mount(&path),
		Err(TfsError::DiskAlreadyMounted)
	));
}

#[test]
fn operations_before_mount_fail_with_disk_not_open() {
	let mut tfs = TinyFs::new();
	assert!(matches!(
		tfs.open_file("x"),
		Err(TfsError::DiskNotOpen)
	));
	assert!(matches!(tfs.readdir(), Err(TfsError::DiskNotOpen)));
}

#[test]
fn file_table_is_empty_immediately_after_mount() {
	let dir = tempfile::tempdir().unwrap();
	let path = disk_path(&dir);
	let mut tfs = TinyFs::new();
	tfs.format(&path, 10240).unwrap();
	tfs.mount(&path).unwrap();

	assert!(tfs.readdir().unwrap().is_empty());
}
