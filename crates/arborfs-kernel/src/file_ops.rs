//! File operations: create, open, read, write, truncate, unlink.
//!
//! There is no handle table. Every call re-resolves its path from the root.

use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::inode::{Dentry, Inode};
use crate::path;
use crate::tree::{Tree, check_insert};
use crate::types::{Credentials, FileAttr};

/// Resolve `path` and insist on a regular file.
fn file_mut<'a>(tree: &'a mut Tree, path: &str) -> FsResult<&'a mut Inode> {
    let inode = tree.resolve_mut(path)?;
    if !inode.is_file() {
        return Err(FsError::not_a_file(path));
    }
    Ok(inode)
}

impl Tree {
    /// Create an empty regular file at `path`.
    pub fn create_file(&mut self, path: &str, perm: u32, owner: Credentials) -> FsResult<FileAttr> {
        let limits = *self.limits();
        let (parent, name) = self.parent_dir_mut(path)?;
        path::validate_name(name, &limits)?;
        let Some(dir) = parent.as_dir_mut() else {
            return Err(FsError::not_a_directory(path));
        };
        check_insert(dir, name, path, &limits)?;

        let child = Inode::new_file(perm, owner);
        let attr = child.attr();
        dir.push(Dentry::new(name, child));
        parent.meta.mtime = SystemTime::now();
        Ok(attr)
    }

    /// Check that `path` names a regular file. Holds no state.
    pub fn open(&self, path: &str) -> FsResult<()> {
        if self.resolve(path)?.is_file() {
            Ok(())
        } else {
            Err(FsError::not_a_file(path))
        }
    }

    /// Copy up to `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied; 0 at end-of-file. An offset past
    /// the end of the file is an error, not a short read.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: i64) -> FsResult<usize> {
        let inode = file_mut(self, path)?;
        let size = inode.size();
        if offset < 0 || offset as u64 > size {
            return Err(FsError::InvalidOffset(offset));
        }
        let start = offset as usize;
        let Some(content) = inode.as_file() else {
            return Err(FsError::not_a_file(path));
        };
        let count = buf.len().min(content.len() - start);
        buf[..count].copy_from_slice(&content.as_bytes()[start..start + count]);
        inode.meta.atime = SystemTime::now();
        Ok(count)
    }

    /// Write `data` at `offset`, zero-filling any gap past the current end.
    ///
    /// The offset is bounded by the content capacity, not the current size.
    pub fn write(&mut self, path: &str, data: &[u8], offset: i64) -> FsResult<usize> {
        let capacity = self.limits().max_file_size;
        let inode = file_mut(self, path)?;
        if offset < 0 || offset as u64 > capacity as u64 {
            return Err(FsError::InvalidOffset(offset));
        }
        let start = offset as usize;
        if start + data.len() > capacity {
            return Err(FsError::OutOfSpace { capacity });
        }
        let Some(content) = inode.as_file_mut() else {
            return Err(FsError::not_a_file(path));
        };
        content.write_at(start, data);

        let now = SystemTime::now();
        inode.meta.mtime = now;
        inode.meta.ctime = now;
        Ok(data.len())
    }

    /// Set the file length to `size`, zero-filling when growing.
    pub fn truncate(&mut self, path: &str, size: i64) -> FsResult<()> {
        let capacity = self.limits().max_file_size;
        let inode = file_mut(self, path)?;
        if size < 0 || size as u64 > capacity as u64 {
            return Err(FsError::invalid_argument(format!(
                "size {size} outside 0..={capacity}"
            )));
        }
        let Some(content) = inode.as_file_mut() else {
            return Err(FsError::not_a_file(path));
        };
        content.set_len(size as usize);
        inode.meta.mtime = SystemTime::now();
        Ok(())
    }

    /// Remove the regular file at `path`.
    pub fn remove_file(&mut self, path: &str) -> FsResult<()> {
        let (parent, name) = self.parent_dir_mut(path)?;
        let Some(dir) = parent.as_dir_mut() else {
            return Err(FsError::not_a_directory(path));
        };
        let index = match dir.position(name) {
            Some(i) if dir.entries()[i].inode.is_file() => i,
            _ => return Err(FsError::not_found(path)),
        };

        drop(dir.remove(index));
        parent.meta.mtime = SystemTime::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::types::{PERM_MASK, S_IFMT, S_IFREG};
    use std::time::Duration;

    fn me() -> Credentials {
        Credentials::new(1000, 1000)
    }

    fn tree() -> Tree {
        Tree::fresh(Limits::default(), me())
    }

    fn tree_with_file(path: &str, body: &[u8]) -> Tree {
        let mut tree = tree();
        tree.create_file(path, 0o644, me()).unwrap();
        tree.write(path, body, 0).unwrap();
        tree
    }

    fn read_to_vec(tree: &mut Tree, path: &str, cap: usize, offset: i64) -> Vec<u8> {
        let mut buf = vec![0xAA; cap];
        let n = tree.read(path, &mut buf, offset).unwrap();
        buf.truncate(n);
        buf
    }

    #[test]
    fn test_create_file() {
        let mut tree = tree();
        let attr = tree.create_file("/x", 0o640, me()).unwrap();
        assert!(attr.is_file());
        assert_eq!(attr.mode & S_IFMT, S_IFREG);
        assert_eq!(attr.mode & PERM_MASK, 0o640);
        assert_eq!(attr.nlink, 1);
        assert_eq!(attr.size, 0);
        assert_eq!(tree.get_attributes("/x").unwrap(), attr);
    }

    #[test]
    fn test_create_file_twice() {
        let mut tree = tree();
        tree.create_file("/x", 0o644, me()).unwrap();
        assert!(matches!(
            tree.create_file("/x", 0o644, me()),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_file_name_too_long() {
        let mut tree = tree();
        let path = format!("/{}", "n".repeat(256));
        assert!(matches!(
            tree.create_file(&path, 0o644, me()),
            Err(FsError::NameTooLong(_))
        ));
        let path = format!("/{}", "n".repeat(255));
        assert!(tree.create_file(&path, 0o644, me()).is_ok());
    }

    #[test]
    fn test_create_file_in_full_directory() {
        let limits = Limits {
            max_entries: 2,
            ..Limits::default()
        };
        let mut tree = Tree::fresh(limits, me());
        tree.create_file("/a", 0o644, me()).unwrap();
        tree.create_directory("/d", 0o755, me()).unwrap();
        assert!(matches!(
            tree.create_file("/c", 0o644, me()),
            Err(FsError::DirectoryFull(_))
        ));
        // Capacity is checked before uniqueness.
        assert!(matches!(
            tree.create_file("/a", 0o644, me()),
            Err(FsError::DirectoryFull(_))
        ));
        assert_eq!(tree.list_directory("/").unwrap().count(), 4);
        assert!(tree.create_file("/d/c", 0o644, me()).is_ok());
    }

    #[test]
    fn test_create_file_bad_parent() {
        let mut tree = tree_with_file("/f", b"");
        assert!(matches!(
            tree.create_file("/missing/x", 0o644, me()),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            tree.create_file("/f/x", 0o644, me()),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_file_ops_on_missing_path() {
        let mut tree = tree();
        let mut buf = [0u8; 4];
        assert!(matches!(tree.read("/nope", &mut buf, 0), Err(FsError::NotFound(_))));
        assert!(matches!(tree.write("/nope", b"x", 0), Err(FsError::NotFound(_))));
        assert!(matches!(tree.truncate("/nope", 0), Err(FsError::NotFound(_))));
        assert!(matches!(
            tree.read("/no/such/file", &mut buf, 0),
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            tree.write("/no/such/file", b"x", 0),
            Err(FsError::NotFound(_))
        ));
        assert_eq!(tree.stats().inodes, 1);
    }

    #[test]
    fn test_open() {
        let mut tree = tree();
        tree.create_file("/f", 0o644, me()).unwrap();
        tree.create_directory("/d", 0o755, me()).unwrap();
        assert!(tree.open("/f").is_ok());
        assert!(matches!(tree.open("/d"), Err(FsError::NotAFile(_))));
        assert!(matches!(tree.open("/missing"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_write_then_read() {
        let mut tree = tree_with_file("/f", b"hello world");
        assert_eq!(read_to_vec(&mut tree, "/f", 100, 0), b"hello world");
        assert_eq!(read_to_vec(&mut tree, "/f", 5, 6), b"world");
        assert_eq!(tree.get_attributes("/f").unwrap().size, 11);
    }

    #[test]
    fn test_read_at_eof_is_empty() {
        let mut tree = tree_with_file("/f", b"abc");
        assert!(read_to_vec(&mut tree, "/f", 10, 3).is_empty());
    }

    #[test]
    fn test_read_bad_offsets() {
        let mut tree = tree_with_file("/f", b"abc");
        let mut buf = [0u8; 4];
        assert!(matches!(
            tree.read("/f", &mut buf, 4),
            Err(FsError::InvalidOffset(4))
        ));
        assert!(matches!(
            tree.read("/f", &mut buf, -1),
            Err(FsError::InvalidOffset(-1))
        ));
    }

    #[test]
    fn test_read_updates_atime_only() {
        let mut tree = tree_with_file("/f", b"abc");
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        tree.set_times("/f", old, old).unwrap();
        read_to_vec(&mut tree, "/f", 3, 0);
        let attr = tree.get_attributes("/f").unwrap();
        assert!(attr.atime > old);
        assert_eq!(attr.mtime, old);
    }

    #[test]
    fn test_read_write_directory() {
        let mut tree = tree();
        tree.create_directory("/d", 0o755, me()).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(tree.read("/d", &mut buf, 0), Err(FsError::NotAFile(_))));
        assert!(matches!(tree.write("/d", b"x", 0), Err(FsError::NotAFile(_))));
        assert!(matches!(tree.truncate("/d", 0), Err(FsError::NotAFile(_))));
    }

    #[test]
    fn test_sparse_write_zero_fills() {
        let mut tree = tree_with_file("/f", b"ab");
        tree.write("/f", b"yz", 6).unwrap();
        assert_eq!(read_to_vec(&mut tree, "/f", 100, 0), b"ab\0\0\0\0yz");
        assert_eq!(tree.get_attributes("/f").unwrap().size, 8);
    }

    #[test]
    fn test_overwrite_inside_keeps_size() {
        let mut tree = tree_with_file("/f", b"abcdef");
        tree.write("/f", b"XY", 1).unwrap();
        assert_eq!(read_to_vec(&mut tree, "/f", 100, 0), b"aXYdef");
        assert_eq!(tree.get_attributes("/f").unwrap().size, 6);
    }

    #[test]
    fn test_write_updates_mtime_and_ctime() {
        let mut tree = tree_with_file("/f", b"");
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        tree.set_times("/f", old, old).unwrap();
        tree.write("/f", b"x", 0).unwrap();
        let attr = tree.get_attributes("/f").unwrap();
        assert!(attr.mtime > old);
        assert_eq!(attr.mtime, attr.ctime);
        assert_eq!(attr.atime, old);
    }

    #[test]
    fn test_write_capacity() {
        let limits = Limits {
            max_file_size: 16,
            ..Default::default()
        };
        let mut tree = Tree::fresh(limits, me());
        tree.create_file("/f", 0o644, me()).unwrap();

        assert_eq!(tree.write("/f", &[1u8; 16], 0).unwrap(), 16);
        assert!(matches!(
            tree.write("/f", b"x", 16),
            Err(FsError::OutOfSpace { capacity: 16 })
        ));
        assert!(matches!(
            tree.write("/f", b"x", 17),
            Err(FsError::InvalidOffset(17))
        ));
        assert!(matches!(
            tree.write("/f", b"x", -3),
            Err(FsError::InvalidOffset(-3))
        ));
        // Zero-length write exactly at capacity is fine.
        assert_eq!(tree.write("/f", b"", 16).unwrap(), 0);
        // A rejected write leaves the content untouched.
        assert_eq!(tree.get_attributes("/f").unwrap().size, 16);
    }

    #[test]
    fn test_truncate_shrink_and_grow() {
        let mut tree = tree_with_file("/f", b"hello world");
        tree.truncate("/f", 5).unwrap();
        assert_eq!(read_to_vec(&mut tree, "/f", 100, 0), b"hello");

        tree.truncate("/f", 8).unwrap();
        // Stale bytes do not resurface after regrowing.
        assert_eq!(read_to_vec(&mut tree, "/f", 100, 0), b"hello\0\0\0");
        assert!(read_to_vec(&mut tree, "/f", 100, 8).is_empty());
    }

    #[test]
    fn test_truncate_bounds() {
        let mut tree = tree_with_file("/f", b"abc");
        assert!(matches!(
            tree.truncate("/f", -1),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.truncate("/f", 1025),
            Err(FsError::InvalidArgument(_))
        ));
        assert!(tree.truncate("/f", 1024).is_ok());
        assert!(matches!(
            tree.truncate("/missing", 0),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_file() {
        let mut tree = tree();
        tree.create_file("/a", 0o644, me()).unwrap();
        tree.create_file("/b", 0o644, me()).unwrap();
        tree.create_file("/c", 0o644, me()).unwrap();
        tree.remove_file("/b").unwrap();

        let names: Vec<_> = tree.list_directory("/").unwrap().map(|e| e.name).collect();
        assert_eq!(names, [".", "..", "a", "c"]);
        assert!(matches!(tree.get_attributes("/b"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_remove_file_rejects_directory() {
        let mut tree = tree();
        tree.create_directory("/d", 0o755, me()).unwrap();
        assert!(matches!(tree.remove_file("/d"), Err(FsError::NotFound(_))));
        assert!(matches!(tree.remove_file("/x"), Err(FsError::NotFound(_))));
        assert!(matches!(tree.remove_file("/"), Err(FsError::InvalidPath(_))));
        assert!(tree.get_attributes("/d").is_ok());
    }

    #[test]
    fn test_remove_file_updates_parent_mtime() {
        let mut tree = tree();
        tree.create_directory("/d", 0o755, me()).unwrap();
        tree.create_file("/d/f", 0o644, me()).unwrap();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        tree.set_times("/d", old, old).unwrap();
        tree.remove_file("/d/f").unwrap();
        assert!(tree.get_attributes("/d").unwrap().mtime > old);
    }
}
