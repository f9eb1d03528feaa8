//! On-disk layout constants.
//!
//! Every size and offset used by the rest of the crate is derived from
//! [`BLOCK_SIZE`]. Nothing here is configurable per-image; a block size other
//! than 1024 would need a different build of this crate, not a runtime flag.

use std::mem::size_of;

use crate::inode::InodeRecord;

/// Size in bytes of a single block, the unit of all on-disk addressing.
pub const BLOCK_SIZE: usize = 1024;

/// Number of 32-bit block pointers that fit in one block.
pub const PTRS_PER_BLK: usize = BLOCK_SIZE / 4;

/// Number of inode records that fit in one block.
pub const INODES_PER_BLK: usize = BLOCK_SIZE / size_of::<InodeRecord>();

/// Number of directory entry slots per (single-block) directory.
pub const DIRENTS_PER_BLK: usize = 32;

/// Maximum length of a path component, including the NUL terminator.
pub const FS_FILENAME_SIZE: usize = 24;

/// Number of direct block pointers stored in an inode.
pub const N_DIRECT: usize = 8;

/// Block number 0 is reserved: it is the superblock and is never a valid
/// pointer value (0 in a pointer slot means "unallocated").
pub const RESERVED_BLOCK: u32 = 0;

/// The maximum number of logical blocks addressable by a single file, via
/// direct pointers, the single-indirect block, and the double-indirect tree.
pub const MAX_FILE_BLOCKS: u64 = (N_DIRECT as u64) + (PTRS_PER_BLK as u64)
	+ (PTRS_PER_BLK as u64) * (PTRS_PER_BLK as u64);

/// The largest byte offset a file may legally reach.
pub const MAX_FILE_BYTES: u64 = MAX_FILE_BLOCKS * (BLOCK_SIZE as u64);

/// Magic number stamped in the superblock at format time.
pub const FS_MAGIC: u32 = 0xF5_1EED;

/// File type bit for a regular file, stored in `mode`'s high bits.
pub const S_IFREG: u32 = 0o100000;
/// File type bit for a directory, stored in `mode`'s high bits.
pub const S_IFDIR: u32 = 0o040000;
/// Mask isolating the file type bits of `mode`.
pub const S_IFMT: u32 = 0o170000;
/// Mask isolating the permission bits of `mode` (chmod only ever touches
/// these low 9 bits; type bits live above them).
pub const PERM_MASK: u32 = 0o777;
