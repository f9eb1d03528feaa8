//! `blockfsutil` is a thin command-line driver over the operation vector,
//! standing in for a real host binding (a FUSE mount, say) so the library
//! can be exercised end-to-end from a shell.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::exit;

use blockfs::block::FileBlockDevice;
use blockfs::ops;
use blockfs::Mount;

fn print_usage(prog: &str) {
	eprintln!("Usage: {} <image-path> <command> [args...]", prog);
	eprintln!("Commands:");
	eprintln!("  ls <path>              list a directory");
	eprintln!("  mkdir <path>           create a directory");
	eprintln!("  cat <path>             print a file's contents");
	eprintln!("  write <path> <text>    overwrite a file's contents at offset 0");
	eprintln!("  stat <path>            print attributes");
	eprintln!("  df                     print free space");
}

fn open_mount(image_path: &PathBuf) -> Mount {
	let file = OpenOptions::new()
		.read(true)
		.write(true)
		.open(image_path)
		.unwrap_or_else(|e| {
			eprintln!("blockfsutil: {}: {}", image_path.display(), e);
			exit(1);
		});
	let dev = FileBlockDevice::new(file).unwrap_or_else(|e| {
		eprintln!("blockfsutil: {}: {}", image_path.display(), e);
		exit(1);
	});
	Mount::open(Box::new(dev)).unwrap_or_else(|e| {
		eprintln!("blockfsutil: failed to mount {}: {}", image_path.display(), e);
		exit(1);
	})
}

fn main() {
	let mut argv = env::args();
	let prog = argv.next().unwrap_or_else(|| "blockfsutil".to_owned());

	let image_path = match argv.next() {
		Some(p) => PathBuf::from(p),
		None => {
			print_usage(&prog);
			exit(1);
		}
	};
	let command = match argv.next() {
		Some(c) => c,
		None => {
			print_usage(&prog);
			exit(1);
		}
	};
	let rest: Vec<String> = argv.collect();

	let mut mount = open_mount(&image_path);
	let uid = 0;
	let gid = 0;
	let umask = 0o022;

	let result = match command.as_str() {
		"ls" => {
			let path = rest.first().map(String::as_str).unwrap_or("/");
			ops::opendir(&mut mount, path).and_then(|handle| {
				let entries = ops::readdir(&mut mount, handle)?;
				for entry in entries {
					println!("{}", entry.name);
				}
				ops::releasedir(&mut mount, handle)
			})
		}
		"mkdir" => {
			let path = rest.first().unwrap_or_else(|| {
				eprintln!("{}: mkdir requires a path", prog);
				exit(1);
			});
			ops::mkdir(&mut mount, path, 0o755, umask, uid, gid).map(|_| ())
		}
		"cat" => {
			let path = rest.first().unwrap_or_else(|| {
				eprintln!("{}: cat requires a path", prog);
				exit(1);
			});
			ops::getattr(&mut mount, path).and_then(|attr| {
				let data = ops::read(&mut mount, path, attr.size, 0)?;
				print!("{}", String::from_utf8_lossy(&data));
				Ok(())
			})
		}
		"write" => {
			if rest.len() < 2 {
				eprintln!("{}: write requires a path and text", prog);
				exit(1);
			}
			match ops::mknod(&mut mount, &rest[0], 0o644, umask, uid, gid) {
				Ok(_) | Err(blockfs::FsError::FileExists) => {
					ops::write(&mut mount, &rest[0], rest[1].as_bytes(), 0).map(|_| ())
				}
				Err(e) => Err(e),
			}
		}
		"stat" => {
			let path = rest.first().map(String::as_str).unwrap_or("/");
			ops::getattr(&mut mount, path).map(|attr| {
				println!(
					"mode={:o} size={} uid={} gid={} ctime={} mtime={}",
					attr.mode, attr.size, attr.uid, attr.gid, attr.ctime, attr.mtime
				);
			})
		}
		"df" => ops::statfs(&mut mount).map(|sf| {
			println!(
				"bsize={} blocks={} bfree={} files={} ffree={}",
				sf.bsize, sf.blocks, sf.bfree, sf.files, sf.ffree
			);
		}),
		other => {
			eprintln!("{}: unknown command `{}`", prog, other);
			print_usage(&prog);
			exit(1);
		}
	};

	if let Err(e) = result {
		eprintln!("{}: {}: {}", prog, command, e);
		exit(e.errno() % 256);
	}
}
