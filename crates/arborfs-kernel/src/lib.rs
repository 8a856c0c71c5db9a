//! arborfs kernel: an in-memory inode tree persisted to a single image file.
//!
//! The tree is a strict ownership hierarchy. Directories own their entries,
//! entries own their child inodes, and every operation resolves its path
//! top-down from the root. [`Engine`] wraps the tree in one process-wide lock
//! and implements [`FsOps`], the path-based surface a kernel-bridge adapter
//! calls into.
//!
//! ```no_run
//! use arborfs_kernel::{Credentials, Engine, FsConfig, FsOps};
//!
//! let engine = Engine::init(FsConfig::with_image("arborfs.img"))?;
//! let me = Credentials::current();
//! engine.mkdir("/a", 0o755, me)?;
//! engine.create("/a/b.txt", 0o644, me)?;
//! engine.write("/a/b.txt", b"hello", 0)?;
//! assert_eq!(engine.read_all("/a/b.txt")?, b"hello");
//! engine.destroy()?;
//! # Ok::<(), arborfs_kernel::FsError>(())
//! ```

pub mod codec;
pub mod config;
mod dir_ops;
pub mod engine;
pub mod error;
mod file_ops;
pub mod inode;
pub mod ops;
pub mod path;
pub mod tree;
pub mod types;

pub use codec::CodecError;
pub use config::{ConfigError, FsConfig, Limits};
pub use engine::Engine;
pub use error::{FsError, FsResult, status};
pub use ops::FsOps;
pub use tree::{Tree, TreeStats};
pub use types::{Credentials, DirEntry, FileAttr, FileType, StatFs};
