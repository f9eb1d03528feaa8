//! This module implements features common to the block-fs tools.

pub mod disk;
pub mod util;
