//! arborfs front end: FUSE adapter, inode table, and image inspection.
//!
//! The FUSE adapter is compiled only with the `fuse` feature, which needs
//! libfuse at build time.

#[cfg(feature = "fuse")]
pub mod fuse;
pub mod inodes;
pub mod inspect;

pub use inodes::{InodeTable, ROOT_INO};
