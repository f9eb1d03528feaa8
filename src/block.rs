//! Block device abstraction.
//!
//! The core never touches a file descriptor directly: it reads and writes
//! whole [`BLOCK_SIZE`](crate::layout::BLOCK_SIZE) blocks through this trait.
//! `FileBlockDevice` is the production implementation, backed by a regular
//! `std::fs::File`; `MemBlockDevice` is an in-memory double used by tests.

use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use crate::layout::BLOCK_SIZE;

/// A fixed-size-block random access device.
///
/// Implementations are expected to treat a short read or write, or a seek
/// past a closed handle, as an `io::Error` rather than a partial success —
/// the core never deals in partial blocks.
pub trait BlockDevice {
	/// Total number of addressable blocks.
	fn num_blocks(&self) -> u64;

	/// Reads `n_blocks` blocks starting at `first_block` into `buf`.
	///
	/// `buf` must be exactly `n_blocks * BLOCK_SIZE` bytes.
	fn read(&mut self, first_block: u64, n_blocks: u64, buf: &mut [u8]) -> io::Result<()>;

	/// Writes `n_blocks` blocks starting at `first_block` from `buf`.
	///
	/// `buf` must be exactly `n_blocks * BLOCK_SIZE` bytes.
	fn write(&mut self, first_block: u64, n_blocks: u64, buf: &[u8]) -> io::Result<()>;

	/// Flushes any buffering between this device and stable storage.
	fn flush(&mut self) -> io::Result<()>;

	/// Reads exactly one block.
	fn read_block(&mut self, block: u64, buf: &mut [u8; BLOCK_SIZE]) -> io::Result<()> {
		self.read(block, 1, buf)
	}

	/// Writes exactly one block.
	fn write_block(&mut self, block: u64, buf: &[u8; BLOCK_SIZE]) -> io::Result<()> {
		self.write(block, 1, buf)
	}
}

/// A `BlockDevice` backed by a regular file (the image file).
///
/// The file's length is truncated down to the nearest whole block; trailing
/// bytes beyond the last full block are ignored, matching the image format.
pub struct FileBlockDevice {
	file: File,
	num_blocks: u64,
}

impl FileBlockDevice {
	/// Opens `file` as a block device, computing the block count from its
	/// length truncated down to a block boundary.
	pub fn new(file: File) -> io::Result<Self> {
		let len = file.metadata()?.len();
		let num_blocks = len / BLOCK_SIZE as u64;
		Ok(Self { file, num_blocks })
	}

	fn seek_to(&mut self, block: u64) -> io::Result<()> {
		let offset = block
			.checked_mul(BLOCK_SIZE as u64)
			.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "block offset overflow"))?;
		self.file.seek(SeekFrom::Start(offset))?;
		Ok(())
	}
}

impl BlockDevice for FileBlockDevice {
	fn num_blocks(&self) -> u64 {
		self.num_blocks
	}

	fn read(&mut self, first_block: u64, n_blocks: u64, buf: &mut [u8]) -> io::Result<()> {
		debug_assert_eq!(buf.len() as u64, n_blocks * BLOCK_SIZE as u64);
		self.seek_to(first_block)?;
		self.file.read_exact(buf)
	}

	fn write(&mut self, first_block: u64, n_blocks: u64, buf: &[u8]) -> io::Result<()> {
		debug_assert_eq!(buf.len() as u64, n_blocks * BLOCK_SIZE as u64);
		self.seek_to(first_block)?;
		self.file.write_all(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.file.flush()
	}
}

/// An in-memory `BlockDevice`, used by unit and integration tests in place
/// of a real image file.
pub struct MemBlockDevice {
	blocks: Vec<u8>,
	num_blocks: u64,
}

impl MemBlockDevice {
	/// Creates a zero-filled device of `num_blocks` blocks.
	pub fn new(num_blocks: u64) -> Self {
		Self {
			blocks: vec![0u8; num_blocks as usize * BLOCK_SIZE],
			num_blocks,
		}
	}

	fn range(&self, first_block: u64, n_blocks: u64) -> io::Result<std::ops::Range<usize>> {
		let start = first_block as usize * BLOCK_SIZE;
		let end = start + n_blocks as usize * BLOCK_SIZE;
		if end > self.blocks.len() {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "block range out of bounds"));
		}
		Ok(start..end)
	}
}

impl BlockDevice for MemBlockDevice {
	fn num_blocks(&self) -> u64 {
		self.num_blocks
	}

	fn read(&mut self, first_block: u64, n_blocks: u64, buf: &mut [u8]) -> io::Result<()> {
		let range = self.range(first_block, n_blocks)?;
		buf.copy_from_slice(&self.blocks[range]);
		Ok(())
	}

	fn write(&mut self, first_block: u64, n_blocks: u64, buf: &[u8]) -> io::Result<()> {
		let range = self.range(first_block, n_blocks)?;
		self.blocks[range].copy_from_slice(buf);
		Ok(())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
