//! Kernel inode number ↔ engine path table.
//!
//! The engine is path-addressed; the kernel speaks inode numbers. Numbers are
//! handed out on first sight of a path and never reused within a mount.

use std::collections::HashMap;

/// Inode number the kernel uses for the mount root.
pub const ROOT_INO: u64 = 1;

#[derive(Debug)]
pub struct InodeTable {
    by_ino: HashMap<u64, String>,
    by_path: HashMap<String, u64>,
    next_ino: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut table = Self {
            by_ino: HashMap::new(),
            by_path: HashMap::new(),
            next_ino: ROOT_INO + 1,
        };
        table.by_ino.insert(ROOT_INO, "/".to_owned());
        table.by_path.insert("/".to_owned(), ROOT_INO);
        table
    }

    /// Inode number for `path`, allocating one on first use.
    pub fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.by_path.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.by_ino.insert(ino, path.to_owned());
        self.by_path.insert(path.to_owned(), ino);
        ino
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.by_ino.get(&ino).map(String::as_str)
    }

    /// Path of `name` inside the directory numbered `parent`.
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        self.path(parent).map(|dir| join(dir, name))
    }

    /// Parent path of the entry numbered `ino`; the root is its own parent.
    pub fn parent_ino(&mut self, ino: u64) -> Option<u64> {
        let path = self.path(ino)?.to_owned();
        let parent = match path.rfind('/') {
            Some(0) | None => "/".to_owned(),
            Some(idx) => path[..idx].to_owned(),
        };
        Some(self.ino_for(&parent))
    }

    /// Drop the mapping for a removed path.
    pub fn forget(&mut self, path: &str) {
        if let Some(ino) = self.by_path.remove(path) {
            self.by_ino.remove(&ino);
        }
    }

    pub fn len(&self) -> usize {
        self.by_ino.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ino.is_empty()
    }
}

/// Join a directory path and an entry name.
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_preallocated() {
        let mut table = InodeTable::new();
        assert_eq!(table.path(ROOT_INO), Some("/"));
        assert_eq!(table.ino_for("/"), ROOT_INO);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ino_for_is_stable() {
        let mut table = InodeTable::new();
        let a = table.ino_for("/a");
        let b = table.ino_for("/a/b");
        assert_ne!(a, b);
        assert_eq!(table.ino_for("/a"), a);
        assert_eq!(table.path(b), Some("/a/b"));
    }

    #[test]
    fn test_child_and_parent() {
        let mut table = InodeTable::new();
        assert_eq!(table.child_path(ROOT_INO, "x").as_deref(), Some("/x"));
        let a = table.ino_for("/a");
        assert_eq!(table.child_path(a, "y").as_deref(), Some("/a/y"));
        assert_eq!(table.child_path(999, "y"), None);

        let y = table.ino_for("/a/y");
        assert_eq!(table.parent_ino(y), Some(a));
        assert_eq!(table.parent_ino(a), Some(ROOT_INO));
        assert_eq!(table.parent_ino(ROOT_INO), Some(ROOT_INO));
    }

    #[test]
    fn test_forget_does_not_reuse_numbers() {
        let mut table = InodeTable::new();
        let old = table.ino_for("/f");
        table.forget("/f");
        assert_eq!(table.path(old), None);
        let new = table.ino_for("/f");
        assert_ne!(old, new);
    }
}
