//! Error taxonomy for the block filesystem core.
//!
//! Every operation in [`crate::ops`] returns `Result<T, FsError>`. The
//! variants mirror the POSIX errno space a host binding would translate them
//! back into; [`FsError::errno`] does that translation directly so a FUSE-style
//! adapter does not need its own mapping table.

use std::fmt;
use std::io;

/// The error type returned by every core filesystem operation.
#[derive(Debug)]
pub enum FsError {
	/// A path component does not exist.
	NotFound,
	/// An intermediate path component, or an operation's target, is not a
	/// directory but was required to be.
	NotADirectory,
	/// An operation's target is a directory but was required to be a file.
	IsADirectory,
	/// The creation target of mknod/mkdir/rename already exists.
	FileExists,
	/// The inode table, block device, or a directory is full.
	NoSpace,
	/// A path component exceeds `FS_FILENAME_SIZE - 1` bytes.
	NameTooLong,
	/// An empty path, a root-only operation, or an out-of-range argument.
	InvalidArgument,
	/// rmdir was called on a directory that still has entries.
	DirectoryNotEmpty,
	/// A write would grow a file beyond `MAX_FILE_BYTES`.
	FileTooLarge,
	/// The operation is not implemented (`utime`, non-zero truncate targets).
	NotImplemented,
	/// A lower-level I/O failure, from the block device or the backing file.
	Io(io::Error),
}

impl FsError {
	/// Maps this error onto the `libc` errno constant a host binding would
	/// report to its caller.
	pub fn errno(&self) -> i32 {
		match self {
			FsError::NotFound => libc::ENOENT,
			FsError::NotADirectory => libc::ENOTDIR,
			FsError::IsADirectory => libc::EISDIR,
			FsError::FileExists => libc::EEXIST,
			FsError::NoSpace => libc::ENOSPC,
			FsError::NameTooLong => libc::ENAMETOOLONG,
			FsError::InvalidArgument => libc::EINVAL,
			FsError::DirectoryNotEmpty => libc::ENOTEMPTY,
			FsError::FileTooLarge => libc::EFBIG,
			FsError::NotImplemented => libc::ENOSYS,
			FsError::Io(_) => libc::EIO,
		}
	}
}

impl fmt::Display for FsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FsError::NotFound => write!(f, "no such file or directory"),
			FsError::NotADirectory => write!(f, "not a directory"),
			FsError::IsADirectory => write!(f, "is a directory"),
			FsError::FileExists => write!(f, "file exists"),
			FsError::NoSpace => write!(f, "no space left on device"),
			FsError::NameTooLong => write!(f, "file name too long"),
			FsError::InvalidArgument => write!(f, "invalid argument"),
			FsError::DirectoryNotEmpty => write!(f, "directory not empty"),
			FsError::FileTooLarge => write!(f, "file too large"),
			FsError::NotImplemented => write!(f, "function not implemented"),
			FsError::Io(e) => write!(f, "I/O error: {}", e),
		}
	}
}

impl std::error::Error for FsError {}

impl From<io::Error> for FsError {
	fn from(e: io::Error) -> Self {
		FsError::Io(e)
	}
}

/// Convenience alias used throughout the core.
pub type FsResult<T> = Result<T, FsError>;
