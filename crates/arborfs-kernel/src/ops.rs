//! Filesystem operations trait.
//!
//! Path-based (no inode numbers), explicit offset/size, one synchronous call
//! per kernel request. The FUSE adapter keeps its own inode ↔ path table.

use std::time::SystemTime;

use crate::error::FsResult;
use crate::types::{Credentials, DirEntry, FileAttr, StatFs};

/// Core filesystem operations.
///
/// Paths are absolute (`/a/b.txt`). Implementations serialise calls
/// internally; every method may be called from any thread.
pub trait FsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    fn getattr(&self, path: &str) -> FsResult<FileAttr>;

    /// List a directory: `.`, `..`, then children in creation order.
    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>>;

    /// Check that `path` is a regular file. No handle is returned.
    fn open(&self, path: &str) -> FsResult<()>;

    /// Read into `buf` starting at `offset`.
    ///
    /// Returns the number of bytes copied, 0 at end-of-file.
    fn read(&self, path: &str, buf: &mut [u8], offset: i64) -> FsResult<usize>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset`. Returns the number of bytes written.
    fn write(&self, path: &str, data: &[u8], offset: i64) -> FsResult<usize>;

    /// Create an empty regular file owned by `owner`.
    fn create(&self, path: &str, mode: u32, owner: Credentials) -> FsResult<FileAttr>;

    /// Create an empty directory owned by `owner`.
    fn mkdir(&self, path: &str, mode: u32, owner: Credentials) -> FsResult<FileAttr>;

    /// Remove a regular file.
    fn unlink(&self, path: &str) -> FsResult<()>;

    /// Remove an empty directory.
    fn rmdir(&self, path: &str) -> FsResult<()>;

    /// Set the file length, zero-filling on growth.
    fn truncate(&self, path: &str, size: i64) -> FsResult<()>;

    /// Overwrite access and modification times.
    fn utimens(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Get filesystem statistics.
    fn statfs(&self) -> FsResult<StatFs>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    fn exists(&self, path: &str) -> bool {
        self.getattr(path).is_ok()
    }

    /// Read up to `size` bytes at `offset` into a fresh buffer.
    fn read_vec(&self, path: &str, offset: i64, size: usize) -> FsResult<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let n = self.read(path, &mut buf, offset)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Read entire file contents.
    fn read_all(&self, path: &str) -> FsResult<Vec<u8>> {
        let attr = self.getattr(path)?;
        self.read_vec(path, 0, attr.size as usize)
    }
}
