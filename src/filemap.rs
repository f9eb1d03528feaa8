//! File map: logical-to-physical block translation, including lazy
//! allocation of indirect blocks on write and the free-everything walk used
//! by unlink and truncate.

use crate::bitmap::allocate_zeroed_block;
use crate::bitmap::free_block;
use crate::block::BlockDevice;
use crate::error::FsResult;
use crate::inode::Inode;
use crate::layout::BLOCK_SIZE;
use crate::layout::N_DIRECT;
use crate::layout::PTRS_PER_BLK;
use crate::superblock::Superblock;

/// Reads a block of `PTRS_PER_BLK` physical block numbers.
fn read_ptr_block(dev: &mut dyn BlockDevice, block: u32) -> FsResult<[u32; PTRS_PER_BLK]> {
	let mut buf = [0u8; BLOCK_SIZE];
	dev.read_block(block as u64, &mut buf)?;
	let mut ptrs = [0u32; PTRS_PER_BLK];
	for (i, chunk) in buf.chunks_exact(4).enumerate() {
		ptrs[i] = u32::from_le_bytes(chunk.try_into().unwrap());
	}
	Ok(ptrs)
}

/// Writes a block of `PTRS_PER_BLK` physical block numbers.
fn write_ptr_block(dev: &mut dyn BlockDevice, block: u32, ptrs: &[u32; PTRS_PER_BLK]) -> FsResult<()> {
	let mut buf = [0u8; BLOCK_SIZE];
	for (i, p) in ptrs.iter().enumerate() {
		buf[i * 4..i * 4 + 4].copy_from_slice(&p.to_le_bytes());
	}
	dev.write_block(block as u64, &buf)?;
	Ok(())
}

/// Translates logical block index `logical` to a physical block number.
///
/// Returns `Ok(0)` for a not-yet-allocated (sparse/short) block — this is
/// not an error, it means "read as zero" or "past what's been written".
pub fn get_block(dev: &mut dyn BlockDevice, inode: &Inode, logical: u64) -> FsResult<u32> {
	let logical = logical as usize;

	if logical < N_DIRECT {
		return Ok(inode.direct[logical]);
	}

	let in_indir_1 = logical - N_DIRECT;
	if in_indir_1 < PTRS_PER_BLK {
		if inode.indir_1 == 0 {
			return Ok(0);
		}
		let ptrs = read_ptr_block(dev, inode.indir_1)?;
		return Ok(ptrs[in_indir_1]);
	}

	if inode.indir_2 == 0 {
		return Ok(0);
	}
	let in_indir_2 = in_indir_1 - PTRS_PER_BLK;
	let index_in_indir_2 = in_indir_2 / PTRS_PER_BLK;
	let index_in_second_indir = in_indir_2 % PTRS_PER_BLK;

	let indir_2_block = read_ptr_block(dev, inode.indir_2)?;
	let second_indir_block = indir_2_block[index_in_indir_2];
	if second_indir_block == 0 {
		return Ok(0);
	}
	let second_indir = read_ptr_block(dev, second_indir_block)?;
	Ok(second_indir[index_in_second_indir])
}

/// Ensures the full chain of indirect blocks and the leaf data block exist
/// for logical block `logical`, allocating any missing link, then writes
/// `data` to the leaf. Mutates `inode`'s pointer fields in place; the
/// caller is responsible for writing the inode record back afterward.
pub fn put_block(
	dev: &mut dyn BlockDevice,
	sb: &Superblock,
	inode: &mut Inode,
	logical: u64,
	data: &[u8; BLOCK_SIZE],
) -> FsResult<()> {
	let logical = logical as usize;

	if logical < N_DIRECT {
		if inode.direct[logical] == 0 {
			inode.direct[logical] = allocate_zeroed_block(dev, sb)?;
		}
		dev.write_block(inode.direct[logical] as u64, data)?;
		return Ok(());
	}

	let in_indir_1 = logical - N_DIRECT;
	if in_indir_1 < PTRS_PER_BLK {
		if inode.indir_1 == 0 {
			inode.indir_1 = allocate_zeroed_block(dev, sb)?;
		}
		let mut ptrs = read_ptr_block(dev, inode.indir_1)?;
		if ptrs[in_indir_1] == 0 {
			ptrs[in_indir_1] = allocate_zeroed_block(dev, sb)?;
			write_ptr_block(dev, inode.indir_1, &ptrs)?;
		}
		dev.write_block(ptrs[in_indir_1] as u64, data)?;
		return Ok(());
	}

	if inode.indir_2 == 0 {
		inode.indir_2 = allocate_zeroed_block(dev, sb)?;
	}
	let in_indir_2 = in_indir_1 - PTRS_PER_BLK;
	let index_in_indir_2 = in_indir_2 / PTRS_PER_BLK;
	let index_in_second_indir = in_indir_2 % PTRS_PER_BLK;

	let mut indir_2_block = read_ptr_block(dev, inode.indir_2)?;
	if indir_2_block[index_in_indir_2] == 0 {
		indir_2_block[index_in_indir_2] = allocate_zeroed_block(dev, sb)?;
		write_ptr_block(dev, inode.indir_2, &indir_2_block)?;
	}
	let second_indir_block = indir_2_block[index_in_indir_2];

	let mut second_indir = read_ptr_block(dev, second_indir_block)?;
	if second_indir[index_in_second_indir] == 0 {
		// Corrected from the source this was distilled from, which wrote the
		// freshly allocated leaf to second_indir[index_in_indir_2] instead —
		// corrupting the extent whenever the two indices differed.
		second_indir[index_in_second_indir] = allocate_zeroed_block(dev, sb)?;
		write_ptr_block(dev, second_indir_block, &second_indir)?;
	}
	dev.write_block(second_indir[index_in_second_indir] as u64, data)?;
	Ok(())
}

/// Frees every block owned by a regular file's pointer tree: direct
/// pointers, the single-indirect block and its leaves, and the
/// double-indirect block with every second-level block and its leaves.
/// Zeroes all pointer fields in `inode` on return.
///
/// Each level's walk stops at the first zero pointer, relying on the
/// invariant that blocks are allocated densely from index 0 upward.
pub fn free_all_blocks(dev: &mut dyn BlockDevice, sb: &Superblock, inode: &mut Inode) -> FsResult<()> {
	for ptr in inode.direct.iter_mut() {
		if *ptr == 0 {
			break;
		}
		free_block(dev, sb, *ptr)?;
		*ptr = 0;
	}

	if inode.indir_1 != 0 {
		let ptrs = read_ptr_block(dev, inode.indir_1)?;
		for &p in ptrs.iter() {
			if p == 0 {
				break;
			}
			free_block(dev, sb, p)?;
		}
		free_block(dev, sb, inode.indir_1)?;
		inode.indir_1 = 0;
	}

	if inode.indir_2 != 0 {
		let indir_2_block = read_ptr_block(dev, inode.indir_2)?;
		for &second_indir_block in indir_2_block.iter() {
			if second_indir_block == 0 {
				break;
			}
			let second_indir = read_ptr_block(dev, second_indir_block)?;
			for &p in second_indir.iter() {
				if p == 0 {
					break;
				}
				free_block(dev, sb, p)?;
			}
			free_block(dev, sb, second_indir_block)?;
		}
		free_block(dev, sb, inode.indir_2)?;
		inode.indir_2 = 0;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::block::MemBlockDevice;
	use crate::layout::FS_MAGIC;
	use crate::layout::S_IFREG;

	fn test_sb(num_blocks: u32) -> Superblock {
		Superblock {
			magic: FS_MAGIC,
			inode_map_sz: 1,
			block_map_sz: 4,
			inode_region_sz: 4,
			num_blocks,
			root_inode: 1,
		}
	}

	#[test]
	fn direct_block_allocates_then_reads_back() {
		let sb = test_sb(2048);
		let mut dev = MemBlockDevice::new(sb.num_blocks as u64);
		let mut inode = Inode::new(0, 0, S_IFREG | 0o644, 0);

		let data = [0xAB; BLOCK_SIZE];
		put_block(&mut dev, &sb, &mut inode, 0, &data).unwrap();

		let phys = get_block(&mut dev, &inode, 0).unwrap();
		assert_ne!(phys, 0);

		let mut back = [0u8; BLOCK_SIZE];
		dev.read_block(phys as u64, &mut back).unwrap();
		assert_eq!(back, data);
	}

	#[test]
	fn unallocated_block_reads_as_zero_pointer() {
		let sb = test_sb(2048);
		let mut dev = MemBlockDevice::new(sb.num_blocks as u64);
		let inode = Inode::new(0, 0, S_IFREG | 0o644, 0);
		assert_eq!(get_block(&mut dev, &inode, 3).unwrap(), 0);
	}

	#[test]
	fn crossing_into_single_indirect_allocates_indir_1() {
		let sb = test_sb(2048);
		let mut dev = MemBlockDevice::new(sb.num_blocks as u64);
		let mut inode = Inode::new(0, 0, S_IFREG | 0o644, 0);

		let data = [0xCD; BLOCK_SIZE];
		put_block(&mut dev, &sb, &mut inode, N_DIRECT as u64, &data).unwrap();

		assert_ne!(inode.indir_1, 0);
		let phys = get_block(&mut dev, &inode, N_DIRECT as u64).unwrap();
		assert_ne!(phys, 0);
		let mut back = [0u8; BLOCK_SIZE];
		dev.read_block(phys as u64, &mut back).unwrap();
		assert_eq!(back, data);
	}

	#[test]
	fn crossing_into_double_indirect_allocates_indir_2_chain() {
		let sb = test_sb(4096);
		let mut dev = MemBlockDevice::new(sb.num_blocks as u64);
		let mut inode = Inode::new(0, 0, S_IFREG | 0o644, 0);

		let logical = (N_DIRECT + PTRS_PER_BLK) as u64;
		let data = [0xEF; BLOCK_SIZE];
		put_block(&mut dev, &sb, &mut inode, logical, &data).unwrap();

		assert_ne!(inode.indir_2, 0);
		let phys = get_block(&mut dev, &inode, logical).unwrap();
		assert_ne!(phys, 0);
		let mut back = [0u8; BLOCK_SIZE];
		dev.read_block(phys as u64, &mut back).unwrap();
		assert_eq!(back, data);
	}

	#[test]
	fn double_indirect_second_slot_lands_at_correct_index() {
		// Regression test for the corrected put-block indexing: writing two
		// distinct logical blocks mapping to different index_in_second_indir
		// values under the same indir_2 slot must not collide.
		let sb = test_sb(4096);
		let mut dev = MemBlockDevice::new(sb.num_blocks as u64);
		let mut inode = Inode::new(0, 0, S_IFREG | 0o644, 0);

		let base = (N_DIRECT + PTRS_PER_BLK) as u64;
		let first = base;
		let second = base + 1;

		let data_a = [0x11; BLOCK_SIZE];
		let data_b = [0x22; BLOCK_SIZE];
		put_block(&mut dev, &sb, &mut inode, first, &data_a).unwrap();
		put_block(&mut dev, &sb, &mut inode, second, &data_b).unwrap();

		let phys_a = get_block(&mut dev, &inode, first).unwrap();
		let phys_b = get_block(&mut dev, &inode, second).unwrap();
		assert_ne!(phys_a, phys_b);

		let mut back_a = [0u8; BLOCK_SIZE];
		dev.read_block(phys_a as u64, &mut back_a).unwrap();
		assert_eq!(back_a, data_a);

		let mut back_b = [0u8; BLOCK_SIZE];
		dev.read_block(phys_b as u64, &mut back_b).unwrap();
		assert_eq!(back_b, data_b);
	}

	#[test]
	fn free_all_blocks_clears_pointers_and_bitmap() {
		let sb = test_sb(2048);
		let mut dev = MemBlockDevice::new(sb.num_blocks as u64);
		let mut inode = Inode::new(0, 0, S_IFREG | 0o644, 0);

		let data = [0x42; BLOCK_SIZE];
		put_block(&mut dev, &sb, &mut inode, 0, &data).unwrap();
		put_block(&mut dev, &sb, &mut inode, 1, &data).unwrap();
		put_block(&mut dev, &sb, &mut inode, N_DIRECT as u64, &data).unwrap();

		free_all_blocks(&mut dev, &sb, &mut inode).unwrap();

		assert_eq!(inode.direct, [0; N_DIRECT]);
		assert_eq!(inode.indir_1, 0);
		assert_eq!(inode.indir_2, 0);
	}
}
