//! Filesystem error types.

use std::io;
use thiserror::Error;

use crate::codec::CodecError;

/// Filesystem error type.
///
/// Every variant maps to a POSIX errno via [`FsError::errno`]; the
/// kernel-bridge adapter replies with the negated value.
#[derive(Debug, Error)]
pub enum FsError {
    /// No entry at that path component.
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected a directory, found a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file, found a directory.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Name collision on create.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Parent directory has no free entry slots.
    #[error("directory full: {0}")]
    DirectoryFull(String),

    /// Directory still has entries.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// Read/write offset outside the valid range.
    #[error("offset out of bounds: {0}")]
    InvalidOffset(i64),

    /// Argument outside the valid range (e.g. truncate size).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Write would exceed the per-file content capacity.
    #[error("write exceeds file size limit ({capacity} bytes)")]
    OutOfSpace { capacity: usize },

    /// Path cannot be resolved or split.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Entry name longer than the configured limit.
    #[error("file name too long: {0}")]
    NameTooLong(String),

    /// Image encode/decode failure.
    #[error("image error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error while reading or writing the image.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::NotAFile(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a DirectoryFull error.
    pub fn directory_full(path: impl Into<String>) -> Self {
        Self::DirectoryFull(path.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty(path.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a NameTooLong error.
    pub fn name_too_long(name: impl Into<String>) -> Self {
        Self::NameTooLong(name.into())
    }

    /// Positive POSIX errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::NotAFile(_) => libc::EISDIR,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::DirectoryFull(_) => libc::ENOSPC,
            FsError::NotEmpty(_) => libc::ENOTEMPTY,
            FsError::InvalidOffset(_) => libc::EINVAL,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::OutOfSpace { .. } => libc::ENOSPC,
            FsError::InvalidPath(_) => libc::EINVAL,
            FsError::NameTooLong(_) => libc::ENAMETOOLONG,
            FsError::Codec(_) | FsError::Io(_) => libc::EIO,
        }
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            FsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            FsError::NotAFile(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            FsError::NotEmpty(msg) => io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg),
            FsError::DirectoryFull(msg) => io::Error::new(io::ErrorKind::StorageFull, msg),
            e @ FsError::OutOfSpace { .. } => {
                io::Error::new(io::ErrorKind::StorageFull, e.to_string())
            }
            e @ FsError::InvalidOffset(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            FsError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::NameTooLong(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::Codec(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            FsError::Io(e) => e,
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;

/// Fold a result into the signed status convention used by kernel bridges:
/// a non-negative count on success, the negated errno on failure.
pub fn status(result: FsResult<usize>) -> i64 {
    match result {
        Ok(n) => n as i64,
        Err(e) => -(e.errno() as i64),
    }
}
