//! Directory operations: mkdir, rmdir, readdir.

use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::inode::{Dentry, Inode};
use crate::path;
use crate::tree::{Tree, check_insert};
use crate::types::{Credentials, DirEntry, FileAttr};

impl Tree {
    /// Create an empty directory at `path`.
    ///
    /// All checks run before anything is mutated: name, parent, capacity,
    /// uniqueness.
    pub fn create_directory(
        &mut self,
        path: &str,
        perm: u32,
        owner: Credentials,
    ) -> FsResult<FileAttr> {
        let limits = *self.limits();
        let (parent, name) = self.parent_dir_mut(path)?;
        path::validate_name(name, &limits)?;
        let Some(dir) = parent.as_dir_mut() else {
            return Err(FsError::not_a_directory(path));
        };
        check_insert(dir, name, path, &limits)?;

        let child = Inode::new_directory(perm, owner);
        let attr = child.attr();
        dir.push(Dentry::new(name, child));
        parent.meta.mtime = SystemTime::now();
        Ok(attr)
    }

    /// Remove the empty directory at `path`.
    pub fn remove_directory(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = self.parent_dir_mut(path)?;
        let Some(dir) = parent.as_dir_mut() else {
            return Err(FsError::not_a_directory(path));
        };
        let index = match dir.position(name) {
            Some(i) if dir.entries()[i].inode.is_dir() => i,
            _ => return Err(FsError::not_found(path)),
        };
        let is_empty = dir.entries()[index]
            .inode
            .as_dir()
            .is_some_and(|d| d.is_empty());
        if !is_empty {
            return Err(FsError::not_empty(path));
        }

        drop(dir.remove(index));
        parent.meta.mtime = SystemTime::now();
        Ok(())
    }

    /// Lazily list a directory: `.`, `..`, then each child in insertion
    /// order with its current metadata.
    ///
    /// Read-only; the listing borrows the tree and so cannot outlive the
    /// caller's hold on it.
    pub fn list_directory(&self, path: &str) -> FsResult<impl Iterator<Item = DirEntry> + '_> {
        let inode = self.resolve(path)?;
        let dir = inode
            .as_dir()
            .ok_or_else(|| FsError::not_a_directory(path))?;
        let parent = path::resolve_parent(self.root(), path)?;

        let specials = [
            DirEntry::new(".", inode.attr()),
            DirEntry::new("..", parent.attr()),
        ];
        let children = dir
            .entries()
            .iter()
            .map(|e| DirEntry::new(e.name.clone(), e.inode.attr()));
        Ok(specials.into_iter().chain(children))
    }
}
