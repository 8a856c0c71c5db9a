//! The filesystem handle: root inode plus the limits every mutation checks.
//!
//! Directory and file operations live in `dir_ops` and `file_ops` as further
//! `impl Tree` blocks. None of them lock; [`crate::Engine`] serialises
//! access.

use std::time::SystemTime;

use serde::Serialize;

use crate::config::Limits;
use crate::error::{FsError, FsResult};
use crate::inode::{Content, DirContent, Inode};
use crate::path;
use crate::types::{Credentials, FileAttr, StatFs};

/// Permission bits of a freshly synthesised root.
pub const ROOT_PERM: u32 = 0o755;

/// Statfs block size.
const BLOCK_SIZE: u64 = 512;

/// Counts over the whole tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub inodes: u64,
    pub files: u64,
    pub directories: u64,
    /// Sum of file sizes.
    pub bytes: u64,
    pub largest_file: u64,
}

/// Root inode and limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: Inode,
    limits: Limits,
}

impl Tree {
    /// Wrap an existing root (e.g. one decoded from an image).
    pub fn new(root: Inode, limits: Limits) -> Self {
        Self { root, limits }
    }

    /// Single empty root directory owned by `owner`.
    pub fn fresh(limits: Limits, owner: Credentials) -> Self {
        Self::new(Inode::new_directory(ROOT_PERM, owner), limits)
    }

    pub fn root(&self) -> &Inode {
        &self.root
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn resolve(&self, path: &str) -> FsResult<&Inode> {
        path::resolve(&self.root, path)
    }

    pub fn resolve_mut(&mut self, path: &str) -> FsResult<&mut Inode> {
        path::resolve_mut(&mut self.root, path)
    }

    /// Resolve the parent directory of `path` for a create/remove.
    ///
    /// Returns the parent's inode and the final component.
    pub(crate) fn parent_dir_mut<'p>(
        &mut self,
        path: &'p str,
    ) -> FsResult<(&mut Inode, &'p str)> {
        let (parent_path, name) = path::split_parent(path)?;
        let parent = path::resolve_mut(&mut self.root, parent_path)?;
        if !parent.is_dir() {
            return Err(FsError::not_a_directory(parent_path));
        }
        Ok((parent, name))
    }

    /// Snapshot of every stored metadata field.
    pub fn get_attributes(&self, path: &str) -> FsResult<FileAttr> {
        Ok(self.resolve(path)?.attr())
    }

    /// Overwrite access and modification times unconditionally.
    pub fn set_times(&mut self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let inode = self.resolve_mut(path)?;
        inode.meta.atime = atime;
        inode.meta.mtime = mtime;
        Ok(())
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut stack = vec![&self.root];
        while let Some(inode) = stack.pop() {
            stats.inodes += 1;
            match &inode.content {
                Content::File(file) => {
                    stats.files += 1;
                    stats.bytes += file.len() as u64;
                    stats.largest_file = stats.largest_file.max(file.len() as u64);
                }
                Content::Directory(dir) => {
                    stats.directories += 1;
                    stack.extend(dir.entries().iter().map(|e| &e.inode));
                }
            }
        }
        stats
    }

    /// Capacity-based filesystem statistics.
    ///
    /// The free inode count is the number of unused entry slots in existing
    /// directories. Block totals cover the content capacity of existing
    /// files plus one full file per free slot.
    pub fn statfs(&self) -> StatFs {
        let stats = self.stats();
        let slots = stats.directories * self.limits.max_entries as u64;
        let ffree = slots.saturating_sub(stats.inodes - 1);
        let capacity = (stats.files + ffree) * self.limits.max_file_size as u64;
        let blocks = capacity.div_ceil(BLOCK_SIZE);
        let used = stats.bytes.div_ceil(BLOCK_SIZE);
        let free = blocks.saturating_sub(used);
        StatFs {
            blocks,
            bfree: free,
            bavail: free,
            files: stats.inodes,
            ffree,
            bsize: BLOCK_SIZE as u32,
            namelen: self.limits.max_name_len as u32,
            frsize: BLOCK_SIZE as u32,
        }
    }
}

/// Shared create-time checks: capacity, then uniqueness.
pub(crate) fn check_insert(dir: &DirContent, name: &str, path: &str, limits: &Limits) -> FsResult<()> {
    if dir.len() >= limits.max_entries {
        return Err(FsError::directory_full(path));
    }
    if dir.position(name).is_some() {
        return Err(FsError::already_exists(path));
    }
    Ok(())
}
