//! File operations: the filesystem operation vector a host binding drives.
//!
//! Every function here takes `&mut Mount` and runs to completion before
//! returning — per the single-threaded, serial concurrency model, nothing
//! suspends mid-operation and the core performs no locking of its own.

use crate::bitmap::allocate_inode;
use crate::bitmap::allocate_zeroed_block;
use crate::bitmap::free_inode;
use crate::bitmap::read_block_bitmap;
use crate::bitmap::read_inode_bitmap;
use crate::dir::DirBlock;
use crate::error::FsError;
use crate::error::FsResult;
use crate::filemap::free_all_blocks;
use crate::filemap::get_block;
use crate::filemap::put_block;
use crate::inode::read_inode;
use crate::inode::write_inode;
use crate::inode::Inode;
use crate::layout::BLOCK_SIZE;
use crate::layout::DIRENTS_PER_BLK;
use crate::layout::FS_FILENAME_SIZE;
use crate::layout::INODES_PER_BLK;
use crate::layout::MAX_FILE_BYTES;
use crate::layout::S_IFDIR;
use crate::layout::S_IFREG;
use crate::mount::Mount;
use crate::path;

/// Attributes returned by `getattr` and surfaced per-entry by `readdir`.
#[derive(Clone, Copy, Debug)]
pub struct Attr {
	pub uid: u32,
	pub gid: u32,
	pub mode: u32,
	pub size: u64,
	pub ctime: u32,
	pub mtime: u32,
	pub atime: u32,
	pub nlink: u32,
	pub blksize: u32,
	pub blocks: u64,
}

impl Attr {
	fn from_inode(inode: &Inode) -> Self {
		Self {
			uid: inode.uid,
			gid: inode.gid,
			mode: inode.mode,
			size: inode.size,
			ctime: inode.ctime,
			mtime: inode.mtime,
			atime: inode.mtime,
			nlink: 1,
			blksize: BLOCK_SIZE as u32,
			blocks: (inode.size + 511) / 512,
		}
	}
}

/// One entry yielded by `readdir`.
#[derive(Clone, Debug)]
pub struct DirListEntry {
	pub name: String,
	pub attr: Attr,
}

/// Free-space/inode-space report returned by `statfs`.
#[derive(Clone, Copy, Debug)]
pub struct StatFs {
	pub bsize: u32,
	pub blocks: u64,
	pub bfree: u64,
	pub bavail: u64,
	pub files: u64,
	pub ffree: u64,
	pub namemax: u32,
}

fn now() -> u32 {
	fsutils::util::get_timestamp().as_secs() as u32
}

fn require_dir(inode: &Inode) -> FsResult<()> {
	if inode.is_dir() {
		Ok(())
	} else {
		Err(FsError::NotADirectory)
	}
}

fn require_not_dir(inode: &Inode) -> FsResult<()> {
	if inode.is_dir() {
		Err(FsError::IsADirectory)
	} else {
		Ok(())
	}
}

/// `getattr(path) -> attributes`.
pub fn getattr(mount: &mut Mount, path: &str) -> FsResult<Attr> {
	let (dev, sb) = mount.parts();
	let (_, inode) = path::resolve(dev, sb, path)?;
	Ok(Attr::from_inode(&inode))
}

/// `opendir(path) -> handle`. The handle is the resolved inode number;
/// there is no open-file table beyond it.
pub fn opendir(mount: &mut Mount, path: &str) -> FsResult<u32> {
	let (dev, sb) = mount.parts();
	let (n, inode) = path::resolve(dev, sb, path)?;
	require_dir(&inode)?;
	Ok(n)
}

/// `readdir(handle) -> entries`. Loads `direct[0]` and reports every valid
/// entry together with attributes built from its own inode.
pub fn readdir(mount: &mut Mount, handle: u32) -> FsResult<Vec<DirListEntry>> {
	let (dev, sb) = mount.parts();
	let inode = read_inode(dev, sb, handle)?;
	require_dir(&inode)?;

	let dirb = DirBlock::read(dev, inode.direct[0])?;
	let mut out = Vec::new();
	for entry in dirb.iter_valid() {
		let child = read_inode(dev, sb, entry.inode)?;
		out.push(DirListEntry {
			name: entry.name().to_owned(),
			attr: Attr::from_inode(&child),
		});
	}
	Ok(out)
}

/// `releasedir(handle)`. No per-handle state to release.
pub fn releasedir(_mount: &mut Mount, _handle: u32) -> FsResult<()> {
	Ok(())
}

fn create_entry(
	mount: &mut Mount,
	path: &str,
	mode: u32,
	umask: u32,
	uid: u32,
	gid: u32,
	is_dir: bool,
) -> FsResult<u32> {
	let (dev, sb) = mount.parts();
	let (parent_n, leaf) = path::translate_parent(dev, sb, path)?;
	if leaf.is_empty() {
		return Err(FsError::InvalidArgument);
	}

	let parent = read_inode(dev, sb, parent_n)?;
	require_dir(&parent)?;

	let mut dirb = DirBlock::read(dev, parent.direct[0])?;
	if dirb.find(&leaf).is_some() {
		return Err(FsError::FileExists);
	}
	// Confirm there's a free slot before mutating any other state, so a
	// full directory fails before an inode or block is allocated.
	dirb.find_free_slot()?;

	let type_bit = if is_dir { S_IFDIR } else { S_IFREG };
	let new_mode = (mode & 0o1777 & !umask) | type_bit;

	let new_inode_num = allocate_inode(dev, sb)?;
	let mut new_inode = Inode::new(uid, gid, new_mode, now());

	if is_dir {
		let block = allocate_zeroed_block(dev, sb)?;
		new_inode.direct[0] = block;
	}

	write_inode(dev, sb, new_inode_num, new_inode)?;

	dirb.insert(new_inode_num, &leaf, is_dir)?;
	dirb.write_back(dev)?;

	Ok(new_inode_num)
}

/// `mknod(path, mode)`: creates a regular file.
pub fn mknod(mount: &mut Mount, path: &str, mode: u32, umask: u32, uid: u32, gid: u32) -> FsResult<u32> {
	create_entry(mount, path, mode, umask, uid, gid, false)
}

/// `mkdir(path, mode)`: creates a directory with a freshly allocated,
/// zeroed data block as `direct[0]`.
pub fn mkdir(mount: &mut Mount, path: &str, mode: u32, umask: u32, uid: u32, gid: u32) -> FsResult<u32> {
	create_entry(mount, path, mode, umask, uid, gid, true)
}

/// `unlink(path)`: removes a file, freeing every block it owned.
pub fn unlink(mount: &mut Mount, path: &str) -> FsResult<()> {
	let (dev, sb) = mount.parts();
	let (parent_n, leaf) = path::translate_parent(dev, sb, path)?;

	let parent = read_inode(dev, sb, parent_n)?;
	require_dir(&parent)?;

	let mut dirb = DirBlock::read(dev, parent.direct[0])?;
	let target_n = dirb.find(&leaf).ok_or(FsError::NotFound)?.inode;

	let mut target = read_inode(dev, sb, target_n)?;
	require_not_dir(&target)?;

	free_all_blocks(dev, sb, &mut target)?;
	free_inode(dev, sb, target_n)?;
	dirb.remove(&leaf)?;
	dirb.write_back(dev)?;

	Ok(())
}

/// `rmdir(path)`: removes an empty, non-root directory.
pub fn rmdir(mount: &mut Mount, path: &str) -> FsResult<()> {
	let (dev, sb) = mount.parts();

	// The root has no parent to unlink it from; report it the same way as
	// a non-empty directory rather than InvalidArgument.
	if path::translate(dev, sb, path)? == sb.root_inode {
		return Err(FsError::DirectoryNotEmpty);
	}

	let (parent_n, leaf) = path::translate_parent(dev, sb, path)?;
	let parent = read_inode(dev, sb, parent_n)?;
	require_dir(&parent)?;

	let mut dirb = DirBlock::read(dev, parent.direct[0])?;
	let target_n = dirb.find(&leaf).ok_or(FsError::NotFound)?.inode;

	let mut target = read_inode(dev, sb, target_n)?;
	require_dir(&target)?;

	let target_dirb = DirBlock::read(dev, target.direct[0])?;
	if !target_dirb.is_empty() {
		return Err(FsError::DirectoryNotEmpty);
	}

	// Directories never allocate beyond direct[0].
	crate::bitmap::free_block(dev, sb, target.direct[0])?;
	target.direct[0] = 0;

	free_inode(dev, sb, target_n)?;
	dirb.remove(&leaf)?;
	dirb.write_back(dev)?;

	Ok(())
}

/// `rename(src, dst)`: src and dst must share the same parent; dst must not
/// already exist. No cross-directory moves, no overwrite.
pub fn rename(mount: &mut Mount, src: &str, dst: &str) -> FsResult<()> {
	let (dev, sb) = mount.parts();
	let (src_parent, src_leaf) = path::translate_parent(dev, sb, src)?;
	let (dst_parent, dst_leaf) = path::translate_parent(dev, sb, dst)?;

	if src_parent != dst_parent {
		return Err(FsError::InvalidArgument);
	}

	let parent = read_inode(dev, sb, src_parent)?;
	require_dir(&parent)?;

	let mut dirb = DirBlock::read(dev, parent.direct[0])?;
	dirb.rename(&src_leaf, &dst_leaf)?;
	dirb.write_back(dev)?;

	Ok(())
}

/// `chmod(path, mode)`: replaces only the low 9 permission bits.
pub fn chmod(mount: &mut Mount, path: &str, mode: u32) -> FsResult<()> {
	let (dev, sb) = mount.parts();
	let (n, mut inode) = path::resolve(dev, sb, path)?;
	inode.chmod(mode);
	write_inode(dev, sb, n, inode)?;
	Ok(())
}

/// `open(path) -> handle`. Rejects directories; the handle is simply the
/// inode number.
pub fn open(mount: &mut Mount, path: &str) -> FsResult<u32> {
	let (dev, sb) = mount.parts();
	let (n, inode) = path::resolve(dev, sb, path)?;
	require_not_dir(&inode)?;
	Ok(n)
}

/// `release(handle)`. Re-validates exactly as `open` did; no per-open state
/// is cached to simply drop.
pub fn release(mount: &mut Mount, handle: u32) -> FsResult<()> {
	let (dev, sb) = mount.parts();
	let inode = read_inode(dev, sb, handle)?;
	require_not_dir(&inode)?;
	Ok(())
}

/// `read(path, len, offset)`.
pub fn read(mount: &mut Mount, path: &str, len: u64, offset: u64) -> FsResult<Vec<u8>> {
	let (dev, sb) = mount.parts();
	let (_, inode) = path::resolve(dev, sb, path)?;
	require_not_dir(&inode)?;

	if offset >= inode.size {
		return Ok(Vec::new());
	}
	let len = len.min(inode.size - offset);

	let mut out = Vec::with_capacity(len as usize);
	let first_block = offset / BLOCK_SIZE as u64;
	let last_block = (offset + len).saturating_sub(1) / BLOCK_SIZE as u64;

	let mut block_buf = [0u8; BLOCK_SIZE];
	for logical in first_block..=last_block {
		let phys = get_block(dev, &inode, logical)?;
		if phys == 0 {
			block_buf = [0u8; BLOCK_SIZE];
		} else {
			dev.read_block(phys as u64, &mut block_buf)?;
		}

		let block_start = logical * BLOCK_SIZE as u64;
		let from = offset.max(block_start) - block_start;
		let to = (offset + len).min(block_start + BLOCK_SIZE as u64) - block_start;
		out.extend_from_slice(&block_buf[from as usize..to as usize]);
	}

	Ok(out)
}

/// `write(path, buf, offset)`. Returns the number of bytes actually written
/// (after clamping to `MAX_FILE_BYTES`).
pub fn write(mount: &mut Mount, path: &str, buf: &[u8], offset: u64) -> FsResult<usize> {
	let (dev, sb) = mount.parts();
	let (n, mut inode) = path::resolve(dev, sb, path)?;
	require_not_dir(&inode)?;

	if offset > inode.size {
		return Err(FsError::InvalidArgument);
	}
	if buf.is_empty() {
		return Ok(0);
	}
	if offset >= MAX_FILE_BYTES {
		return Err(FsError::FileTooLarge);
	}

	let len = (buf.len() as u64).min(MAX_FILE_BYTES - offset) as usize;
	let buf = &buf[..len];

	let first_block = offset / BLOCK_SIZE as u64;
	let last_block = (offset + len as u64 - 1) / BLOCK_SIZE as u64;

	let mut written = 0usize;
	let mut block_buf = [0u8; BLOCK_SIZE];
	for logical in first_block..=last_block {
		let block_start = logical * BLOCK_SIZE as u64;
		let from = offset.max(block_start) - block_start;
		let to = (offset + len as u64).min(block_start + BLOCK_SIZE as u64) - block_start;
		let whole_block = from == 0 && to == BLOCK_SIZE as u64;

		if whole_block {
			block_buf.copy_from_slice(&buf[written..written + BLOCK_SIZE]);
		} else {
			// Partial head or tail block: read-modify-write, treating a
			// missing block as all zeros.
			let phys = get_block(dev, &inode, logical)?;
			if phys == 0 {
				block_buf = [0u8; BLOCK_SIZE];
			} else {
				dev.read_block(phys as u64, &mut block_buf)?;
			}
			let n_bytes = (to - from) as usize;
			block_buf[from as usize..to as usize].copy_from_slice(&buf[written..written + n_bytes]);
		}

		put_block(dev, sb, &mut inode, logical, &block_buf)?;
		written += (to - from) as usize;
	}

	if offset + len as u64 > inode.size {
		inode.size = offset + len as u64;
	}
	inode.mtime = now();
	write_inode(dev, sb, n, inode)?;

	Ok(written)
}

/// `truncate(path, new_len)`. Only `new_len == 0` is supported.
pub fn truncate(mount: &mut Mount, path: &str, new_len: u64) -> FsResult<()> {
	if new_len != 0 {
		return Err(FsError::InvalidArgument);
	}

	let (dev, sb) = mount.parts();
	let (n, mut inode) = path::resolve(dev, sb, path)?;
	require_not_dir(&inode)?;

	free_all_blocks(dev, sb, &mut inode)?;
	inode.size = 0;
	inode.mtime = now();
	write_inode(dev, sb, n, inode)?;

	Ok(())
}

/// `statfs()`.
pub fn statfs(mount: &mut Mount) -> FsResult<StatFs> {
	let (dev, sb) = mount.parts();
	let block_bitmap = read_block_bitmap(dev, sb)?;
	let inode_bitmap = read_inode_bitmap(dev, sb)?;

	let metadata_blocks = sb.data_base();
	let data_blocks = sb.num_blocks as u64 - metadata_blocks;
	let bfree = block_bitmap.count_free(sb.num_blocks) as u64;
	let total_inodes = INODES_PER_BLK as u64 * sb.inode_region_sz as u64;
	let ffree = inode_bitmap.count_free(INODES_PER_BLK as u32 * sb.inode_region_sz) as u64;

	Ok(StatFs {
		bsize: BLOCK_SIZE as u32,
		blocks: data_blocks,
		bfree,
		bavail: bfree,
		files: total_inodes,
		ffree,
		namemax: FS_FILENAME_SIZE as u32,
	})
}

/// `utime(path, atime, mtime)`. Deliberately unimplemented: returns
/// `NotImplemented` without touching any state.
pub fn utime(_mount: &mut Mount, _path: &str, _atime: u32, _mtime: u32) -> FsResult<()> {
	Err(FsError::NotImplemented)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::block::MemBlockDevice;
	use crate::layout::FS_MAGIC;
	use crate::layout::N_DIRECT;
	use crate::layout::PTRS_PER_BLK;
	use crate::superblock::Superblock;

	/// Formats a small in-memory image: superblock + 1-block inode bitmap +
	/// 1-block block bitmap + 4-block inode table, then creates the root
	/// directory inode (number 1) with an empty data block.
	fn formatted_mount(num_blocks: u32) -> Mount {
		let mut dev = MemBlockDevice::new(num_blocks as u64);
		let sb = Superblock {
			magic: FS_MAGIC,
			inode_map_sz: 1,
			block_map_sz: 1,
			inode_region_sz: 4,
			num_blocks,
			root_inode: 1,
		};
		sb.write(&mut dev).unwrap();

		// Reserve inode 0 (never allocated) and block 0 (superblock) plus
		// every metadata block up to the data region, matching the
		// formatter's layout.
		{
			let mut inode_bm = crate::bitmap::read_inode_bitmap(&mut dev, &sb).unwrap();
			inode_bm.set(0);
			inode_bm.write_back(&mut dev).unwrap();

			let mut block_bm = crate::bitmap::read_block_bitmap(&mut dev, &sb).unwrap();
			for b in 0..sb.data_base() as u32 {
				block_bm.set(b);
			}
			block_bm.write_back(&mut dev).unwrap();
		}

		let root_data_block = allocate_zeroed_block(&mut dev, &sb).unwrap();
		let root_n = allocate_inode(&mut dev, &sb).unwrap();
		assert_eq!(root_n, sb.root_inode);

		let mut root = Inode::new(0, 0, S_IFDIR | 0o755, now());
		root.direct[0] = root_data_block;
		write_inode(&mut dev, &sb, root_n, root).unwrap();

		Mount::open(Box::new(dev)).unwrap()
	}

	#[test]
	fn mkdir_then_readdir_lists_one_entry() {
		let mut mount = formatted_mount(256);
		let before = statfs(&mut mount).unwrap();

		mkdir(&mut mount, "/a", 0o755, 0, 1000, 1000).unwrap();

		let handle = opendir(&mut mount, "/").unwrap();
		let entries = readdir(&mut mount, handle).unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].name, "a");

		let after = statfs(&mut mount).unwrap();
		assert_eq!(after.ffree, before.ffree - 1);
		assert_eq!(after.bfree, before.bfree - 1);
	}

	#[test]
	fn mknod_write_read_round_trip() {
		let mut mount = formatted_mount(256);
		mkdir(&mut mount, "/a", 0o755, 0, 1000, 1000).unwrap();
		mknod(&mut mount, "/a/file", 0o644, 0, 1000, 1000).unwrap();

		let n = write(&mut mount, "/a/file", b"hello", 0).unwrap();
		assert_eq!(n, 5);

		let data = read(&mut mount, "/a/file", 5, 0).unwrap();
		assert_eq!(data, b"hello");

		let attr = getattr(&mut mount, "/a/file").unwrap();
		assert_eq!(attr.size, 5);
	}

	#[test]
	fn write_across_indirect_boundary() {
		let mut mount = formatted_mount(4096);
		mkdir(&mut mount, "/a", 0o755, 0, 0, 0).unwrap();
		mknod(&mut mount, "/a/file", 0o644, 0, 0, 0).unwrap();

		let x = vec![0xABu8; BLOCK_SIZE];
		write(&mut mount, "/a/file", &x, 0).unwrap();

		let y = vec![0xCDu8; BLOCK_SIZE];
		let offset = (N_DIRECT as u64) * BLOCK_SIZE as u64;
		write(&mut mount, "/a/file", &y, offset).unwrap();

		let back = read(&mut mount, "/a/file", BLOCK_SIZE as u64, offset).unwrap();
		assert_eq!(back, y);
	}

	#[test]
	fn unlink_restores_statfs_counts() {
		let mut mount = formatted_mount(256);
		mkdir(&mut mount, "/a", 0o755, 0, 0, 0).unwrap();
		mknod(&mut mount, "/a/file", 0o644, 0, 0, 0).unwrap();
		write(&mut mount, "/a/file", b"hello", 0).unwrap();

		let before = statfs(&mut mount).unwrap();
		unlink(&mut mount, "/a/file").unwrap();
		let after = statfs(&mut mount).unwrap();

		assert_eq!(after.ffree, before.ffree + 1);
		assert_eq!(after.bfree, before.bfree + 1);
	}

	#[test]
	fn rmdir_requires_empty() {
		let mut mount = formatted_mount(256);
		mkdir(&mut mount, "/a", 0o755, 0, 0, 0).unwrap();
		mknod(&mut mount, "/a/file", 0o644, 0, 0, 0).unwrap();

		assert!(matches!(rmdir(&mut mount, "/a"), Err(FsError::DirectoryNotEmpty)));

		unlink(&mut mount, "/a/file").unwrap();
		rmdir(&mut mount, "/a").unwrap();

		let handle = opendir(&mut mount, "/").unwrap();
		assert!(readdir(&mut mount, handle).unwrap().is_empty());
	}

	#[test]
	fn rename_cross_directory_rejected_same_directory_succeeds() {
		let mut mount = formatted_mount(256);
		mkdir(&mut mount, "/a", 0o755, 0, 0, 0).unwrap();
		mkdir(&mut mount, "/b", 0o755, 0, 0, 0).unwrap();
		mknod(&mut mount, "/a/file", 0o644, 0, 0, 0).unwrap();

		assert!(matches!(
			rename(&mut mount, "/a/file", "/b/file"),
			Err(FsError::InvalidArgument)
		));

		rename(&mut mount, "/a/file", "/a/other").unwrap();
		let handle = opendir(&mut mount, "/a").unwrap();
		let entries = readdir(&mut mount, handle).unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].name, "other");
	}

	#[test]
	fn chmod_preserves_type_bit_and_changes_permissions() {
		let mut mount = formatted_mount(256);
		mknod(&mut mount, "/file", 0o644, 0, 0, 0).unwrap();
		chmod(&mut mount, "/file", 0o600).unwrap();
		let attr = getattr(&mut mount, "/file").unwrap();
		assert_eq!(attr.mode & 0o777, 0o600);
		assert_eq!(attr.mode & crate::layout::S_IFMT, S_IFREG);
	}

	#[test]
	fn write_past_end_is_invalid_argument() {
		let mut mount = formatted_mount(256);
		mknod(&mut mount, "/file", 0o644, 0, 0, 0).unwrap();
		assert!(matches!(
			write(&mut mount, "/file", b"x", 100),
			Err(FsError::InvalidArgument)
		));
	}

	#[test]
	fn read_at_eof_returns_empty() {
		let mut mount = formatted_mount(256);
		mknod(&mut mount, "/file", 0o644, 0, 0, 0).unwrap();
		write(&mut mount, "/file", b"hi", 0).unwrap();
		let data = read(&mut mount, "/file", 10, 2).unwrap();
		assert!(data.is_empty());
	}

	#[test]
	fn utime_is_not_implemented() {
		let mut mount = formatted_mount(256);
		mknod(&mut mount, "/file", 0o644, 0, 0, 0).unwrap();
		assert!(matches!(
			utime(&mut mount, "/file", 0, 0),
			Err(FsError::NotImplemented)
		));
	}

	#[test]
	fn directory_full_rejects_one_more_entry() {
		let mut mount = formatted_mount(256);
		for i in 0..DIRENTS_PER_BLK {
			mknod(&mut mount, &format!("/f{}", i), 0o644, 0, 0, 0).unwrap();
		}
		assert!(matches!(
			mknod(&mut mount, "/overflow", 0o644, 0, 0, 0),
			Err(FsError::NoSpace)
		));
	}

	#[test]
	fn max_file_size_write_is_clamped_then_rejected() {
		// Use a small write straddling an already-allocated final boundary
		// to exercise the >= MAX_FILE_BYTES clamp without materializing a
		// 64 MiB file on disk.
		let mut mount = formatted_mount(256);
		mknod(&mut mount, "/file", 0o644, 0, 0, 0).unwrap();

		let (dev, sb) = mount.parts();
		let (n, mut inode) = path::resolve(dev, sb, "/file").unwrap();
		inode.size = MAX_FILE_BYTES;
		write_inode(dev, sb, n, inode).unwrap();

		assert!(matches!(
			write(&mut mount, "/file", b"x", MAX_FILE_BYTES),
			Err(FsError::FileTooLarge)
		));
	}

	#[test]
	fn double_indirect_write_and_read_back() {
		let mut mount = formatted_mount(8192);
		mknod(&mut mount, "/big", 0o644, 0, 0, 0).unwrap();

		let offset = (N_DIRECT as u64 + PTRS_PER_BLK as u64) * BLOCK_SIZE as u64;
		let data = vec![0x77u8; BLOCK_SIZE];
		write(&mut mount, "/big", &data, offset).unwrap();

		let back = read(&mut mount, "/big", BLOCK_SIZE as u64, offset).unwrap();
		assert_eq!(back, data);
	}
}
