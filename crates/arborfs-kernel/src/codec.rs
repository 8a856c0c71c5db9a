//! Image codec: the whole tree as one pre-order byte stream.
//!
//! ```text
//! header  magic "ARBR" | version u16 | content capacity u32
//! inode   tag u8 ('F' | 'D')
//!         mode u32 | nlink u32 | uid u32 | gid u32
//!         atime, mtime, ctime (i64 secs + u32 nanos each)
//!         size u64
//!   'F'   capacity bytes of content, zero past `size`
//!   'D'   count u32, then per entry: name len u32 | name | child inode
//! ```
//!
//! All integers are little-endian. Decoding trusts nothing: every length is
//! bounded by the bytes actually present before anything is allocated for it.

use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::inode::{Content, DirContent, Dentry, FileContent, Inode, Metadata};

pub const MAGIC: [u8; 4] = *b"ARBR";
pub const VERSION: u16 = 1;

const TAG_FILE: u8 = b'F';
const TAG_DIR: u8 = b'D';

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Image encode/decode errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream ended inside a record.
    #[error("truncated image")]
    Truncated,

    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("unsupported image version {0}")]
    UnsupportedVersion(u16),

    #[error("unknown inode tag {0:#04x}")]
    UnknownTag(u8),

    /// A file claims more bytes than the image's content width.
    #[error("file size {size} exceeds image capacity {capacity}")]
    SizeOutOfRange { size: u64, capacity: u64 },

    #[error("image root is not a directory")]
    RootNotDirectory,

    #[error("invalid entry name: {0}")]
    InvalidName(String),

    #[error("timestamp out of range")]
    InvalidTimestamp,

    /// A value does not fit its fixed-width field.
    #[error("{0} does not fit in the image format")]
    TooLarge(&'static str),

    #[error("image I/O: {0}")]
    Io(io::Error),
}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Io(e)
        }
    }
}

/// Write the image header and the tree under `root`.
///
/// `capacity` is the fixed width of every file body; it must be at least the
/// length of the largest file in the tree.
pub fn write_image<W: Write>(w: &mut W, root: &Inode, capacity: usize) -> Result<(), CodecError> {
    let width = u32::try_from(capacity).map_err(|_| CodecError::TooLarge("content capacity"))?;
    w.write_all(&MAGIC)?;
    w.write_u16::<LittleEndian>(VERSION)?;
    w.write_u32::<LittleEndian>(width)?;
    write_inode(w, root, capacity)?;
    w.flush()?;
    Ok(())
}

/// Read an image, returning the root inode and the image's content width.
pub fn read_image<R: Read>(r: &mut R) -> Result<(Inode, usize), CodecError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let version = r.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let capacity = r.read_u32::<LittleEndian>()? as usize;
    let root = read_inode(r, capacity)?;
    if !root.is_dir() {
        return Err(CodecError::RootNotDirectory);
    }
    Ok((root, capacity))
}

fn write_inode<W: Write>(w: &mut W, inode: &Inode, capacity: usize) -> Result<(), CodecError> {
    let tag = if inode.is_dir() { TAG_DIR } else { TAG_FILE };
    w.write_u8(tag)?;

    let meta = &inode.meta;
    w.write_u32::<LittleEndian>(meta.mode)?;
    w.write_u32::<LittleEndian>(meta.nlink)?;
    w.write_u32::<LittleEndian>(meta.uid)?;
    w.write_u32::<LittleEndian>(meta.gid)?;
    for time in [meta.atime, meta.mtime, meta.ctime] {
        write_time(w, time)?;
    }
    w.write_u64::<LittleEndian>(inode.size())?;

    match &inode.content {
        Content::File(file) => {
            if file.len() > capacity {
                return Err(CodecError::SizeOutOfRange {
                    size: file.len() as u64,
                    capacity: capacity as u64,
                });
            }
            w.write_all(file.as_bytes())?;
            io::copy(&mut io::repeat(0).take((capacity - file.len()) as u64), w)?;
        }
        Content::Directory(dir) => {
            let count =
                u32::try_from(dir.len()).map_err(|_| CodecError::TooLarge("entry count"))?;
            w.write_u32::<LittleEndian>(count)?;
            for entry in dir.entries() {
                let len = u32::try_from(entry.name.len())
                    .map_err(|_| CodecError::TooLarge("entry name"))?;
                w.write_u32::<LittleEndian>(len)?;
                w.write_all(entry.name.as_bytes())?;
                write_inode(w, &entry.inode, capacity)?;
            }
        }
    }
    Ok(())
}

fn read_inode<R: Read>(r: &mut R, capacity: usize) -> Result<Inode, CodecError> {
    let tag = r.read_u8()?;
    if tag != TAG_FILE && tag != TAG_DIR {
        return Err(CodecError::UnknownTag(tag));
    }

    let mode = r.read_u32::<LittleEndian>()?;
    let nlink = r.read_u32::<LittleEndian>()?;
    let uid = r.read_u32::<LittleEndian>()?;
    let gid = r.read_u32::<LittleEndian>()?;
    let atime = read_time(r)?;
    let mtime = read_time(r)?;
    let ctime = read_time(r)?;
    let size = r.read_u64::<LittleEndian>()?;
    let meta = Metadata {
        mode,
        nlink,
        uid,
        gid,
        atime,
        mtime,
        ctime,
    };

    let content = if tag == TAG_FILE {
        if size > capacity as u64 {
            return Err(CodecError::SizeOutOfRange {
                size,
                capacity: capacity as u64,
            });
        }
        let body = read_exact_vec(r, size as usize)?;
        skip_exact(r, capacity as u64 - size)?;
        Content::File(FileContent::from_bytes(body))
    } else {
        let count = r.read_u32::<LittleEndian>()?;
        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for _ in 0..count {
            let name = read_name(r)?;
            if !seen.insert(name.clone()) {
                return Err(CodecError::InvalidName(format!("duplicate entry {name:?}")));
            }
            let child = read_inode(r, capacity)?;
            entries.push(Dentry::new(name, child));
        }
        Content::Directory(DirContent::from_entries(entries))
    };

    Ok(Inode { meta, content })
}

fn read_name<R: Read>(r: &mut R) -> Result<String, CodecError> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let bytes = read_exact_vec(r, len)?;
    let name = String::from_utf8(bytes)
        .map_err(|_| CodecError::InvalidName("not UTF-8".to_string()))?;
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(CodecError::InvalidName(format!("{name:?}")));
    }
    Ok(name)
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_exact_vec<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(CodecError::Truncated);
    }
    Ok(buf)
}

/// Consume and discard exactly `len` bytes of padding.
fn skip_exact<R: Read>(r: &mut R, len: u64) -> Result<(), CodecError> {
    if io::copy(&mut r.by_ref().take(len), &mut io::sink())? != len {
        return Err(CodecError::Truncated);
    }
    Ok(())
}

/// Split a time into whole seconds and sub-second nanos relative to the
/// epoch. Nanos are always non-negative, so pre-epoch times floor the
/// seconds.
pub(crate) fn split_time(time: SystemTime) -> Result<(i64, u32), CodecError> {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = i64::try_from(d.as_secs()).map_err(|_| CodecError::InvalidTimestamp)?;
            Ok((secs, d.subsec_nanos()))
        }
        Err(e) => {
            let d = e.duration();
            let secs = i64::try_from(d.as_secs()).map_err(|_| CodecError::InvalidTimestamp)?;
            match d.subsec_nanos() {
                0 => Ok((-secs, 0)),
                n => Ok((-secs - 1, NANOS_PER_SEC - n)),
            }
        }
    }
}

pub(crate) fn join_time(secs: i64, nanos: u32) -> Result<SystemTime, CodecError> {
    if nanos >= NANOS_PER_SEC {
        return Err(CodecError::InvalidTimestamp);
    }
    let base = if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_secs(secs as u64))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(secs.unsigned_abs()))
    };
    base.and_then(|t| t.checked_add(Duration::from_nanos(nanos as u64)))
        .ok_or(CodecError::InvalidTimestamp)
}

fn write_time<W: Write>(w: &mut W, time: SystemTime) -> Result<(), CodecError> {
    let (secs, nanos) = split_time(time)?;
    w.write_i64::<LittleEndian>(secs)?;
    w.write_u32::<LittleEndian>(nanos)?;
    Ok(())
}

fn read_time<R: Read>(r: &mut R) -> Result<SystemTime, CodecError> {
    let secs = r.read_i64::<LittleEndian>()?;
    let nanos = r.read_u32::<LittleEndian>()?;
    join_time(secs, nanos)
}
