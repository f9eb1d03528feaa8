//! Directory engine: scan, insert, and remove entries in a single-block
//! directory.
//!
//! A directory's data block holds exactly [`DIRENTS_PER_BLK`] entry slots,
//! no more. There is no growth beyond that one block — hitting the limit on
//! mknod/mkdir is reported as [`FsError::NoSpace`].

use crate::block::BlockDevice;
use crate::error::FsError;
use crate::error::FsResult;
use crate::layout::BLOCK_SIZE;
use crate::layout::DIRENTS_PER_BLK;
use crate::layout::FS_FILENAME_SIZE;

/// On-disk directory entry record.
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct DirEntryRecord {
	valid: u8,
	is_dir: u8,
	_padding: u16,
	inode: u32,
	name: [u8; FS_FILENAME_SIZE],
}

/// In-memory view of one directory entry slot.
#[derive(Clone, Copy, Debug)]
pub struct DirEntry {
	pub valid: bool,
	/// Advisory only; the inode's `mode` is the authoritative file type.
	pub is_dir: bool,
	pub inode: u32,
	name: [u8; FS_FILENAME_SIZE],
	name_len: usize,
}

impl DirEntry {
	const EMPTY: Self = Self {
		valid: false,
		is_dir: false,
		inode: 0,
		name: [0; FS_FILENAME_SIZE],
		name_len: 0,
	};

	fn new(inode: u32, name: &str, is_dir: bool) -> FsResult<Self> {
		let bytes = name.as_bytes();
		if bytes.len() >= FS_FILENAME_SIZE {
			return Err(FsError::NameTooLong);
		}
		let mut buf = [0u8; FS_FILENAME_SIZE];
		buf[..bytes.len()].copy_from_slice(bytes);
		Ok(Self {
			valid: true,
			is_dir,
			inode,
			name: buf,
			name_len: bytes.len(),
		})
	}

	/// The entry's name, decoded up to its NUL terminator.
	pub fn name(&self) -> &str {
		std::str::from_utf8(&self.name[..self.name_len]).unwrap_or("")
	}

	fn from_record(r: &DirEntryRecord) -> Self {
		let name = r.name;
		let name_len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
		Self {
			valid: r.valid != 0,
			is_dir: r.is_dir != 0,
			inode: r.inode,
			name,
			name_len,
		}
	}

	fn to_record(self) -> DirEntryRecord {
		DirEntryRecord {
			valid: self.valid as u8,
			is_dir: self.is_dir as u8,
			_padding: 0,
			inode: self.inode,
			name: self.name,
		}
	}
}

/// A directory block's entry table, loaded entirely into memory.
pub struct DirBlock {
	block: u32,
	entries: [DirEntry; DIRENTS_PER_BLK],
}

impl DirBlock {
	/// Reads the directory block at physical block number `block`.
	pub fn read(dev: &mut dyn BlockDevice, block: u32) -> FsResult<Self> {
		let mut buf = [0u8; BLOCK_SIZE];
		dev.read_block(block as u64, &mut buf)?;

		let mut entries = [DirEntry::EMPTY; DIRENTS_PER_BLK];
		let record_size = std::mem::size_of::<DirEntryRecord>();
		for (i, slot) in entries.iter_mut().enumerate() {
			let start = i * record_size;
			let mut record: DirEntryRecord = unsafe { std::mem::zeroed() };
			let dst = fsutils::util::reinterpret_mut(&mut record);
			dst.copy_from_slice(&buf[start..start + record_size]);
			*slot = DirEntry::from_record(&record);
		}

		Ok(Self { block, entries })
	}

	/// Writes every slot back to the directory's block.
	pub fn write_back(&self, dev: &mut dyn BlockDevice) -> FsResult<()> {
		let mut buf = [0u8; BLOCK_SIZE];
		let record_size = std::mem::size_of::<DirEntryRecord>();
		for (i, entry) in self.entries.iter().enumerate() {
			let start = i * record_size;
			let record = entry.to_record();
			buf[start..start + record_size].copy_from_slice(fsutils::util::reinterpret(&record));
		}
		dev.write_block(self.block as u64, &buf)?;
		Ok(())
	}

	/// Linear scan for a valid entry named `name`.
	pub fn find(&self, name: &str) -> Option<&DirEntry> {
		self.entries.iter().find(|e| e.valid && e.name() == name)
	}

	/// Linear scan for a valid entry named `name`, mutably.
	pub fn find_mut(&mut self, name: &str) -> Option<&mut DirEntry> {
		self.entries.iter_mut().find(|e| e.valid && e.name() == name)
	}

	/// Index of the first slot with `valid == false`, or `NoSpace` if full.
	pub fn find_free_slot(&self) -> FsResult<usize> {
		self.entries
			.iter()
			.position(|e| !e.valid)
			.ok_or(FsError::NoSpace)
	}

	/// True iff no slot in this directory has `valid == true`.
	pub fn is_empty(&self) -> bool {
		self.entries.iter().all(|e| !e.valid)
	}

	/// Inserts a new entry into the first free slot.
	pub fn insert(&mut self, inode: u32, name: &str, is_dir: bool) -> FsResult<()> {
		if self.find(name).is_some() {
			return Err(FsError::FileExists);
		}
		let slot = self.find_free_slot()?;
		self.entries[slot] = DirEntry::new(inode, name, is_dir)?;
		Ok(())
	}

	/// Marks the entry named `name` invalid. No-op bookkeeping beyond that —
	/// the slot's bytes are left in place until the next `insert` overwrites
	/// them.
	pub fn remove(&mut self, name: &str) -> FsResult<u32> {
		let entry = self.find_mut(name).ok_or(FsError::NotFound)?;
		let inode = entry.inode;
		entry.valid = false;
		Ok(inode)
	}

	/// Renames the entry named `old` to `new` in place, refusing if `new`
	/// is already taken by a different entry.
	pub fn rename(&mut self, old: &str, new: &str) -> FsResult<()> {
		if self.entries.iter().any(|e| e.valid && e.name() == new) {
			return Err(FsError::FileExists);
		}
		let slot = self
			.entries
			.iter()
			.position(|e| e.valid && e.name() == old)
			.ok_or(FsError::NotFound)?;
		let inode = self.entries[slot].inode;
		let is_dir = self.entries[slot].is_dir;
		self.entries[slot] = DirEntry::new(inode, new, is_dir)?;
		Ok(())
	}

	/// Iterates all valid entries.
	pub fn iter_valid(&self) -> impl Iterator<Item = &DirEntry> {
		self.entries.iter().filter(|e| e.valid)
	}
}
