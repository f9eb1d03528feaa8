//! A small, self-contained block-oriented filesystem core, layered on a
//! fixed-size image file: superblock, two bitmaps, an inode table, and data
//! blocks, exposing a filesystem-in-userspace style operation vector.
//!
//! The core is strictly single-threaded and serial — each top-level
//! operation in [`ops`] runs to completion before the next begins, and the
//! exclusive `&mut Mount` borrow that every operation takes is what
//! enforces that there is exactly one mutator at a time. There is no
//! journaling and no crash atomicity: a crash between a bitmap write and the
//! structural write that follows it may leak an inode or a block, a posture
//! this crate accepts rather than adding write-ahead logging for.

pub mod bitmap;
pub mod block;
pub mod dir;
pub mod error;
pub mod filemap;
pub mod inode;
pub mod layout;
pub mod mount;
pub mod ops;
pub mod path;
pub mod superblock;

pub use block::BlockDevice;
pub use block::FileBlockDevice;
pub use block::MemBlockDevice;
pub use error::FsError;
pub use error::FsResult;
pub use mount::Mount;
