//! Path resolver: parses absolute, slash-separated paths and walks the
//! directory tree to find the inode they name.

use crate::block::BlockDevice;
use crate::dir::DirBlock;
use crate::error::FsError;
use crate::error::FsResult;
use crate::inode::read_inode;
use crate::inode::Inode;
use crate::layout::FS_FILENAME_SIZE;
use crate::superblock::Superblock;

/// Splits `path` on `/`, stripping a trailing slash first, then normalizes
/// `.` (skipped) and `..` (pops the previous component, dropped silently at
/// root) over the resulting components.
///
/// Returns `NameTooLong` for any component of `FS_FILENAME_SIZE` bytes or
/// more (the on-disk name field holds at most `FS_FILENAME_SIZE - 1` bytes
/// plus a NUL terminator).
fn split_normalized(path: &str) -> FsResult<Vec<String>> {
	let trimmed = path.trim_end_matches('/');

	let mut out: Vec<String> = Vec::new();
	for raw in trimmed.split('/') {
		if raw.is_empty() || raw == "." {
			continue;
		}
		if raw == ".." {
			out.pop();
			continue;
		}
		if raw.len() >= FS_FILENAME_SIZE {
			return Err(FsError::NameTooLong);
		}
		out.push(raw.to_owned());
	}
	Ok(out)
}

/// Walks from the root inode through `components`, requiring every
/// intermediate (and the final) component to be a directory if more
/// components remain after it.
fn walk(
	dev: &mut dyn BlockDevice,
	sb: &Superblock,
	components: &[String],
) -> FsResult<u32> {
	let mut current = sb.root_inode;

	for name in components {
		let inode = read_inode(dev, sb, current)?;
		if !inode.is_dir() {
			return Err(FsError::NotADirectory);
		}
		let dirb = DirBlock::read(dev, inode.direct[0])?;
		let entry = dirb.find(name).ok_or(FsError::NotFound)?;
		current = entry.inode;
	}

	Ok(current)
}

/// Resolves `path` to an inode number. An empty path or `/` denotes the
/// root inode.
pub fn translate(dev: &mut dyn BlockDevice, sb: &Superblock, path: &str) -> FsResult<u32> {
	let components = split_normalized(path)?;
	walk(dev, sb, &components)
}

/// Resolves `path` to its parent's inode number and the leaf component's
/// name, the form used by operations that must manipulate a parent
/// directory (mknod, mkdir, unlink, rmdir, rename).
pub fn translate_parent(
	dev: &mut dyn BlockDevice,
	sb: &Superblock,
	path: &str,
) -> FsResult<(u32, String)> {
	let mut components = split_normalized(path)?;
	let leaf = components.pop().ok_or(FsError::InvalidArgument)?;
	let parent = walk(dev, sb, &components)?;
	Ok((parent, leaf))
}

/// Resolves `path` to both its inode number and its fully-loaded [`Inode`].
pub fn resolve(dev: &mut dyn BlockDevice, sb: &Superblock, path: &str) -> FsResult<(u32, Inode)> {
	let n = translate(dev, sb, path)?;
	let inode = read_inode(dev, sb, n)?;
	Ok((n, inode))
}
