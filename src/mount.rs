//! Mount state: owns the block device handle and the immutable superblock
//! for the lifetime of a mount.
//!
//! There is no process-wide mount table here — every operation in
//! [`crate::ops`] takes a `&mut Mount` explicitly. Rust's exclusive-borrow
//! rules then give the single-mutator invariant the core relies on for
//! free: two operations can never run against the same `Mount` at once
//! without the caller going through `&mut`, so there is nothing extra to
//! enforce at the core layer.

use crate::block::BlockDevice;
use crate::error::FsResult;
use crate::superblock::Superblock;

/// A mounted filesystem: a block device plus the superblock read from it.
pub struct Mount {
	device: Box<dyn BlockDevice>,
	superblock: Superblock,
}

impl Mount {
	/// Mounts `device`, reading and validating its superblock.
	pub fn open(device: Box<dyn BlockDevice>) -> FsResult<Self> {
		let mut device = device;
		let superblock = Superblock::read(device.as_mut())?;
		Ok(Self { device, superblock })
	}

	/// The immutable superblock read at mount time.
	pub fn superblock(&self) -> &Superblock {
		&self.superblock
	}

	/// Mutable access to the block device, for operations that need to
	/// issue reads/writes.
	pub fn device(&mut self) -> &mut dyn BlockDevice {
		self.device.as_mut()
	}

	/// Splits the mount into its two parts, both needed simultaneously by
	/// most operations (the superblock borrowed immutably, the device
	/// mutably).
	pub fn parts(&mut self) -> (&mut dyn BlockDevice, &Superblock) {
		(self.device.as_mut(), &self.superblock)
	}

	/// Flushes the device and releases the mount's resources. Equivalent to
	/// dropping the `Mount`, spelled out for callers that want an explicit
	/// unmount step with error reporting.
	pub fn unmount(mut self) -> FsResult<()> {
		self.device.flush()?;
		Ok(())
	}
}
