//! Inode store: the entity model of the tree.
//!
//! An [`Inode`] is either a file or a directory, never both and never
//! neither; the [`Content`] enum makes that structural. Directories own
//! their entries, and each [`Dentry`] owns its child inode outright, so
//! dropping an entry drops the whole subtree beneath it.
//!
//! File length is derived from the content buffer rather than stored twice:
//! [`Inode::size`] is the single source of truth.

use std::time::SystemTime;

use crate::types::{Credentials, FileAttr, FileType, PERM_MASK, S_IFDIR, S_IFREG};

/// Metadata fields shared by both inode kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl Metadata {
    fn new(mode: u32, nlink: u32, owner: Credentials) -> Self {
        let now = SystemTime::now();
        Self {
            mode,
            nlink,
            uid: owner.uid,
            gid: owner.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }
}

/// Bytes of a regular file. Length is the file size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContent {
    data: Vec<u8>,
}

impl FileContent {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[cfg(test)]
    pub(crate) fn allocated(&self) -> usize {
        self.data.capacity()
    }

    /// Copy `bytes` in at `offset`, zero-filling any gap between the current
    /// end and `offset` first. Capacity is checked by the caller.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        if offset > self.data.len() {
            self.data.resize(offset, 0);
        }
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
    }

    /// Shrink or zero-extend to exactly `len` bytes.
    pub fn set_len(&mut self, len: usize) {
        self.data.resize(len, 0);
    }
}

/// Ordered entries of a directory. Order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirContent {
    entries: Vec<Dentry>,
}

impl DirContent {
    pub fn from_entries(entries: Vec<Dentry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Dentry] {
        &self.entries
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Inode> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.inode)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Inode> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .map(|e| &mut e.inode)
    }

    pub fn push(&mut self, entry: Dentry) {
        self.entries.push(entry);
    }

    /// Remove the entry at `index`, closing the gap without reordering.
    pub fn remove(&mut self, index: usize) -> Dentry {
        self.entries.remove(index)
    }
}

/// Kind-discriminated inode content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    File(FileContent),
    Directory(DirContent),
}

/// Named reference from a directory to the child inode it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dentry {
    pub name: String,
    pub inode: Inode,
}

impl Dentry {
    pub fn new(name: impl Into<String>, inode: Inode) -> Self {
        Self {
            name: name.into(),
            inode,
        }
    }
}

/// One file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub meta: Metadata,
    pub content: Content,
}

impl Inode {
    /// Empty directory: link count 2, all timestamps now.
    pub fn new_directory(perm: u32, owner: Credentials) -> Self {
        Self {
            meta: Metadata::new(S_IFDIR | (perm & PERM_MASK), 2, owner),
            content: Content::Directory(DirContent::default()),
        }
    }

    /// Empty regular file: link count 1, all timestamps now.
    pub fn new_file(perm: u32, owner: Credentials) -> Self {
        Self {
            meta: Metadata::new(S_IFREG | (perm & PERM_MASK), 1, owner),
            content: Content::File(FileContent::default()),
        }
    }

    pub fn kind(&self) -> FileType {
        match self.content {
            Content::File(_) => FileType::File,
            Content::Directory(_) => FileType::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.content, Content::Directory(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self.content, Content::File(_))
    }

    /// Content length for files; 0 for directories.
    pub fn size(&self) -> u64 {
        match &self.content {
            Content::File(file) => file.len() as u64,
            Content::Directory(_) => 0,
        }
    }

    pub fn as_dir(&self) -> Option<&DirContent> {
        match &self.content {
            Content::Directory(dir) => Some(dir),
            Content::File(_) => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut DirContent> {
        match &mut self.content {
            Content::Directory(dir) => Some(dir),
            Content::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileContent> {
        match &self.content {
            Content::File(file) => Some(file),
            Content::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileContent> {
        match &mut self.content {
            Content::File(file) => Some(file),
            Content::Directory(_) => None,
        }
    }

    /// Metadata snapshot.
    pub fn attr(&self) -> FileAttr {
        FileAttr {
            kind: self.kind(),
            mode: self.meta.mode,
            nlink: self.meta.nlink,
            uid: self.meta.uid,
            gid: self.meta.gid,
            atime: self.meta.atime,
            mtime: self.meta.mtime,
            ctime: self.meta.ctime,
            size: self.size(),
        }
    }

    /// Count of inodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        match &self.content {
            Content::File(_) => 1,
            Content::Directory(dir) => {
                1 + dir.entries().iter().map(|e| e.inode.subtree_len()).sum::<usize>()
            }
        }
    }
}
