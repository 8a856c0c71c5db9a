//! FUSE adapter: translates kernel requests into [`FsOps`] calls.

use std::ffi::OsStr;
use std::os::raw::c_int;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arborfs_kernel::{Credentials, Engine, FileAttr, FileType, FsError, FsOps, FsResult};
use fuser::{
    Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::inodes::{InodeTable, join};

/// Attribute and entry cache lifetime handed to the kernel.
const TTL: Duration = Duration::from_secs(1);

const BLOCK_SIZE: u32 = 512;

/// `fuser::Filesystem` over an [`Engine`].
pub struct ArborFs {
    engine: Arc<Engine>,
    inodes: InodeTable,
    on_destroy: Option<oneshot::Sender<FsResult<()>>>,
}

impl ArborFs {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            inodes: InodeTable::new(),
            on_destroy: None,
        }
    }

    /// Send the outcome of the final save on `tx` once the kernel tears the
    /// mount down.
    pub fn notify_on_destroy(mut self, tx: oneshot::Sender<FsResult<()>>) -> Self {
        self.on_destroy = Some(tx);
        self
    }

    fn path(&self, ino: u64) -> Result<String, c_int> {
        self.inodes.path(ino).map(str::to_owned).ok_or(libc::ENOENT)
    }

    fn child(&self, parent: u64, name: &OsStr) -> Result<String, c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        self.inodes.child_path(parent, name).ok_or(libc::ENOENT)
    }

    /// Attributes for `path`, with the inode number allocated if new.
    fn attr(&mut self, path: &str, attr: &FileAttr) -> fuser::FileAttr {
        let ino = self.inodes.ino_for(path);
        to_fuse_attr(ino, attr)
    }

    fn setattr_inner(
        &mut self,
        ino: u64,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
    ) -> Result<fuser::FileAttr, c_int> {
        let path = self.path(ino)?;
        if let Some(size) = size {
            let size = i64::try_from(size).map_err(|_| libc::EINVAL)?;
            self.engine.truncate(&path, size).map_err(errno)?;
        }
        if atime.is_some() || mtime.is_some() {
            let current = self.engine.getattr(&path).map_err(errno)?;
            let atime = atime.map_or(current.atime, resolve_time);
            let mtime = mtime.map_or(current.mtime, resolve_time);
            self.engine.utimens(&path, atime, mtime).map_err(errno)?;
        }
        let attr = self.engine.getattr(&path).map_err(errno)?;
        Ok(to_fuse_attr(ino, &attr))
    }
}

fn errno(e: FsError) -> c_int {
    e.errno()
}

fn resolve_time(t: TimeOrNow) -> SystemTime {
    match t {
        TimeOrNow::SpecificTime(t) => t,
        TimeOrNow::Now => SystemTime::now(),
    }
}

fn to_fuse_kind(kind: FileType) -> fuser::FileType {
    match kind {
        FileType::File => fuser::FileType::RegularFile,
        FileType::Directory => fuser::FileType::Directory,
    }
}

pub(crate) fn to_fuse_attr(ino: u64, attr: &FileAttr) -> fuser::FileAttr {
    fuser::FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(BLOCK_SIZE as u64),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: to_fuse_kind(attr.kind),
        perm: attr.perm() as u16,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn caller(req: &Request<'_>) -> Credentials {
    Credentials::new(req.uid(), req.gid())
}

impl Filesystem for ArborFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!(image = %self.engine.image_path().display(), "filesystem mounted");
        Ok(())
    }

    fn destroy(&mut self) {
        let result = self.engine.save();
        match &result {
            Ok(()) => info!("image saved on unmount"),
            Err(e) => error!(error = %e, "failed to save image on unmount"),
        }
        if let Some(tx) = self.on_destroy.take() {
            let _ = tx.send(result);
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.getattr(&path) {
            Ok(attr) => {
                let attr = self.attr(&path, &attr);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &to_fuse_attr(ino, &attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // Stored mode and ownership are fixed at creation.
        if mode.is_some() || uid.is_some() || gid.is_some() {
            debug!(ino, "rejecting chmod/chown");
            return reply.error(libc::EPERM);
        }
        match self.setattr_inner(ino, size, atime, mtime) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.mkdir(&path, mode & !umask, caller(req)) {
            Ok(attr) => {
                let attr = self.attr(&path, &attr);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.rmdir(&path) {
            Ok(()) => {
                self.inodes.forget(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.create(&path, mode & !umask, caller(req)) {
            Ok(attr) => {
                let attr = self.attr(&path, &attr);
                reply.created(&TTL, &attr, 0, 0, flags as u32);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.unlink(&path) {
            Ok(()) => {
                self.inodes.forget(&path);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        // No handle table: every read and write re-resolves the path.
        match self.engine.open(&path) {
            Ok(()) => reply.opened(0, flags as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.read_vec(&path, offset, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        match self.engine.write(&path, data, offset) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        let entries = match self.engine.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.errno()),
        };

        for (i, entry) in entries.iter().enumerate().skip(offset.max(0) as usize) {
            let entry_ino = match entry.name.as_str() {
                "." => ino,
                ".." => self.inodes.parent_ino(ino).unwrap_or(ino),
                name => self.inodes.ino_for(&join(&path, name)),
            };
            if reply.add(entry_ino, (i + 1) as i64, to_fuse_kind(entry.kind()), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.engine.statfs() {
            Ok(st) => reply.statfs(
                st.blocks, st.bfree, st.bavail, st.files, st.ffree, st.bsize, st.namelen,
                st.frsize,
            ),
            Err(e) => reply.error(e.errno()),
        }
    }
}

/// Mount options for an arborfs mount.
pub fn mount_options(allow_other: bool) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName("arborfs".to_owned()),
        MountOption::AutoUnmount,
    ];
    if allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

/// Mount in a background thread. Dropping or joining the session unmounts.
pub fn spawn_mount(
    fs: ArborFs,
    mountpoint: &Path,
    allow_other: bool,
) -> std::io::Result<fuser::BackgroundSession> {
    fuser::spawn_mount2(fs, mountpoint, &mount_options(allow_other))
}
