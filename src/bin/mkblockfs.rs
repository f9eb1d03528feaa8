//! `mkblockfs` formats an image file with the on-disk layout implemented by
//! the `blockfs` library: a superblock, an inode bitmap, a block bitmap, an
//! inode table, and data blocks, with a root directory already created.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::exit;

use blockfs::bitmap;
use blockfs::block::FileBlockDevice;
use blockfs::inode::write_inode;
use blockfs::inode::Inode;
use blockfs::layout::BLOCK_SIZE;
use blockfs::layout::FS_MAGIC;
use blockfs::layout::S_IFDIR;
use blockfs::superblock::Superblock;
use blockfs::BlockDevice;

/// Default number of blocks set aside for the inode table when not given
/// explicitly on the command line.
const DEFAULT_INODE_REGION_SZ: u32 = 4;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,
	/// If true, print command line help.
	help: bool,
	/// The path to the image file to format.
	image_path: Option<PathBuf>,
	/// Number of blocks for the inode table (overrides the default).
	inode_region_sz: Option<u32>,
}

fn print_usage(prog: &str) {
	eprintln!("Usage: {} [options] <image-path>", prog);
	eprintln!("Options:");
	eprintln!("  -h, --help                 print this help and exit");
	eprintln!("  --inode-region-sz <N>      number of blocks reserved for the inode table");
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();

	args.prog = iter.next().unwrap_or_else(|| "mkblockfs".to_owned());

	while let Some(arg) = iter.next() {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			"--inode-region-sz" => {
				let value = iter.next().unwrap_or_else(|| {
					eprintln!("{}: --inode-region-sz requires a value", args.prog);
					exit(1);
				});
				args.inode_region_sz = Some(value.parse().unwrap_or_else(|_| {
					eprintln!("{}: invalid --inode-region-sz value: {}", args.prog, value);
					exit(1);
				}));
			}
			_ => {
				args.image_path = Some(PathBuf::from(arg));
			}
		}
	}

	args
}

/// Computes a default block bitmap size in blocks: enough bits to cover
/// every block on the device.
fn default_block_map_sz(num_blocks: u64) -> u32 {
	let bits_per_block = (BLOCK_SIZE * 8) as u64;
	fsutils::util::ceil_division(num_blocks, bits_per_block) as u32
}

fn create(dev: &mut FileBlockDevice, inode_region_sz: u32) -> std::io::Result<()> {
	let num_blocks = dev.num_blocks() as u32;
	let inode_map_sz = 1;
	let block_map_sz = default_block_map_sz(num_blocks as u64).max(1);

	let sb = Superblock {
		magic: FS_MAGIC,
		inode_map_sz,
		block_map_sz,
		inode_region_sz,
		num_blocks,
		root_inode: 1,
	};
	sb.write(dev).map_err(fs_err_to_io)?;

	// Reserve inode 0 (never allocated) and every metadata block, including
	// the superblock itself, before the allocator is allowed to hand out
	// anything from the data region.
	let mut inode_bm = bitmap::read_inode_bitmap(dev, &sb).map_err(fs_err_to_io)?;
	inode_bm.set(0);
	inode_bm.write_back(dev).map_err(fs_err_to_io)?;

	let mut block_bm = bitmap::read_block_bitmap(dev, &sb).map_err(fs_err_to_io)?;
	for b in 0..sb.data_base() as u32 {
		block_bm.set(b);
	}
	block_bm.write_back(dev).map_err(fs_err_to_io)?;

	let root_data_block = bitmap::allocate_zeroed_block(dev, &sb).map_err(fs_err_to_io)?;
	let root_n = bitmap::allocate_inode(dev, &sb).map_err(fs_err_to_io)?;
	assert_eq!(root_n, sb.root_inode, "root inode must be the first one allocated");

	let now = fsutils::util::get_timestamp().as_secs() as u32;
	let mut root = Inode::new(0, 0, S_IFDIR | 0o755, now);
	root.direct[0] = root_data_block;
	write_inode(dev, &sb, root_n, root).map_err(fs_err_to_io)?;

	dev.flush()
}

fn fs_err_to_io(e: blockfs::FsError) -> std::io::Error {
	match e {
		blockfs::FsError::Io(e) => e,
		other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
	}
}

fn main() {
	let args = parse_args();

	if args.help {
		print_usage(&args.prog);
		exit(0);
	}

	let image_path = args.image_path.unwrap_or_else(|| {
		eprintln!("{}: specify path to an image file", args.prog);
		print_usage(&args.prog);
		exit(1);
	});

	let file = OpenOptions::new()
		.read(true)
		.write(true)
		.open(&image_path)
		.unwrap_or_else(|e| {
			eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
			exit(1);
		});

	let mut dev = FileBlockDevice::new(file).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(1);
	});

	let inode_region_sz = args.inode_region_sz.unwrap_or(DEFAULT_INODE_REGION_SZ);
	create(&mut dev, inode_region_sz).unwrap_or_else(|e| {
		eprintln!("{}: failed to format {}: {}", args.prog, image_path.display(), e);
		exit(1);
	});

	println!("{}: formatted {}", args.prog, image_path.display());
}
