//! Attribute and listing types handed across the engine boundary.
//!
//! These are snapshots: they never borrow from the tree, so they can be
//! returned after the filesystem lock has been released.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Directory type bits of `st_mode`.
pub const S_IFDIR: u32 = 0o040000;
/// Regular-file type bits of `st_mode`.
pub const S_IFREG: u32 = 0o100000;
/// Mask selecting the file-type bits of `st_mode`.
pub const S_IFMT: u32 = 0o170000;
/// Mask selecting the permission bits of `st_mode`.
pub const PERM_MASK: u32 = 0o7777;

/// `SystemTime` as a signed `(secs, nanos)` pair relative to the epoch.
///
/// Serde's own `SystemTime` impl rejects times before the epoch, which
/// `utimens` may store.
pub mod epoch_time {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};
    use std::time::SystemTime;

    use crate::codec::{join_time, split_time};

    pub fn serialize<S: Serializer>(time: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        split_time(*time).map_err(ser::Error::custom)?.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let (secs, nanos) = <(i64, u32)>::deserialize(d)?;
        join_time(secs, nanos).map_err(de::Error::custom)
    }
}

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// The `st_mode` type bits for this kind.
    pub fn mode_bits(&self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }
}

/// Snapshot of every stored metadata field of an inode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    /// File type.
    pub kind: FileType,
    /// Full `st_mode`: type bits | permission bits.
    pub mode: u32,
    /// Number of hard links.
    pub nlink: u32,
    /// Owning user ID.
    pub uid: u32,
    /// Owning group ID.
    pub gid: u32,
    /// Last access time.
    #[serde(with = "epoch_time")]
    pub atime: SystemTime,
    /// Last modification time.
    #[serde(with = "epoch_time")]
    pub mtime: SystemTime,
    /// Last metadata/content change time.
    #[serde(with = "epoch_time")]
    pub ctime: SystemTime,
    /// Size in bytes. Always 0 for directories.
    pub size: u64,
}

impl FileAttr {
    /// Permission bits only (e.g. `0o644`).
    pub fn perm(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path). `.` and `..` for the synthetic entries.
    pub name: String,
    /// Metadata of the entry's inode at listing time.
    pub attr: FileAttr,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, attr: FileAttr) -> Self {
        Self {
            name: name.into(),
            attr,
        }
    }

    /// Entry type.
    pub fn kind(&self) -> FileType {
        self.attr.kind
    }
}

/// Identity recorded as owner of newly created inodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

impl Credentials {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Real user and group of the running process.
    pub fn current() -> Self {
        // SAFETY: getuid/getgid have no preconditions and cannot fail.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { uid, gid }
    }
}

/// Filesystem statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFs {
    /// Total blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Available blocks (to non-root).
    pub bavail: u64,
    /// Inodes in use.
    pub files: u64,
    /// Free inodes.
    pub ffree: u64,
    /// Block size.
    pub bsize: u32,
    /// Maximum name length.
    pub namelen: u32,
    /// Fragment size.
    pub frsize: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(kind: FileType, perm: u32) -> FileAttr {
        let now = SystemTime::now();
        FileAttr {
            kind,
            mode: kind.mode_bits() | perm,
            nlink: if kind.is_dir() { 2 } else { 1 },
            uid: 1000,
            gid: 1000,
            atime: now,
            mtime: now,
            ctime: now,
            size: 0,
        }
    }

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
        assert_eq!(FileType::Directory.mode_bits() & S_IFMT, S_IFDIR);
        assert_eq!(FileType::File.mode_bits() & S_IFMT, S_IFREG);
    }

    #[test]
    fn test_perm_strips_type_bits() {
        let dir = attr(FileType::Directory, 0o755);
        assert_eq!(dir.perm(), 0o755);
        assert_eq!(dir.mode & S_IFMT, S_IFDIR);

        let file = attr(FileType::File, 0o644);
        assert_eq!(file.perm(), 0o644);
        assert!(file.is_file());
    }

    #[test]
    fn test_attr_times_serialize_as_secs_nanos() {
        let mut before = attr(FileType::File, 0o644);
        before.atime = SystemTime::UNIX_EPOCH - std::time::Duration::from_millis(1500);
        before.mtime = SystemTime::UNIX_EPOCH + std::time::Duration::new(7, 5);

        let json = serde_json::to_value(&before).unwrap();
        assert_eq!(json["atime"], serde_json::json!([-2, 500_000_000]));
        assert_eq!(json["mtime"], serde_json::json!([7, 5]));

        let after: FileAttr = serde_json::from_value(json).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn test_dir_entry() {
        let entry = DirEntry::new("notes.txt", attr(FileType::File, 0o600));
        assert_eq!(entry.name, "notes.txt");
        assert!(entry.kind().is_file());
    }
}
