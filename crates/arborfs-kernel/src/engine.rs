//! Engine facade: the single process-wide filesystem handle.
//!
//! One `parking_lot::Mutex` guards the whole tree. Every [`FsOps`] method
//! holds it for its full body; persistence only happens at start-up and
//! shutdown.

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::config::{FsConfig, Limits};
use crate::error::{FsError, FsResult};
use crate::ops::FsOps;
use crate::tree::{Tree, TreeStats};
use crate::types::{Credentials, DirEntry, FileAttr, StatFs};

/// In-memory filesystem backed by a single image file.
#[derive(Debug)]
pub struct Engine {
    tree: Mutex<Tree>,
    image_path: PathBuf,
}

impl Engine {
    /// Load the image at `config.image_path`, or start from an empty root
    /// owned by the running process if no image exists yet.
    ///
    /// A present but unreadable or malformed image is an error; the caller
    /// cannot serve requests without a valid tree.
    pub fn init(config: FsConfig) -> FsResult<Self> {
        let FsConfig { image_path, limits } = config;
        let tree = match File::open(&image_path) {
            Ok(file) => {
                let (root, capacity) = codec::read_image(&mut BufReader::new(file))?;
                info!(
                    path = %image_path.display(),
                    inodes = root.subtree_len(),
                    capacity,
                    "loaded image"
                );
                if capacity > limits.max_file_size {
                    warn!(
                        capacity,
                        max_file_size = limits.max_file_size,
                        "image content width exceeds configured file size limit"
                    );
                }
                Tree::new(root, limits)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %image_path.display(), "no image found, starting empty");
                Tree::fresh(limits, Credentials::current())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            tree: Mutex::new(tree),
            image_path,
        })
    }

    /// Empty filesystem owned by `owner`; nothing is read from disk.
    pub fn fresh(config: FsConfig, owner: Credentials) -> Self {
        Self {
            tree: Mutex::new(Tree::fresh(config.limits, owner)),
            image_path: config.image_path,
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn limits(&self) -> Limits {
        *self.tree.lock().limits()
    }

    pub fn stats(&self) -> TreeStats {
        self.tree.lock().stats()
    }

    /// Run `f` against the locked tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.tree.lock())
    }

    /// Write the whole tree to the image path.
    ///
    /// The image is written to a sibling `.tmp` file and renamed into place,
    /// so a failed save leaves the previous image intact.
    pub fn save(&self) -> FsResult<()> {
        let (bytes, stats) = {
            let tree = self.tree.lock();
            let stats = tree.stats();
            let capacity = tree.limits().max_file_size.max(stats.largest_file as usize);
            let mut bytes = Vec::new();
            codec::write_image(&mut bytes, tree.root(), capacity)?;
            (bytes, stats)
        };

        let tmp = temp_path(&self.image_path)?;
        let written = write_synced(&tmp, &bytes).and_then(|()| fs::rename(&tmp, &self.image_path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            path = %self.image_path.display(),
            inodes = stats.inodes,
            bytes = bytes.len(),
            "saved image"
        );
        Ok(())
    }

    /// Save and release the tree.
    pub fn destroy(self) -> FsResult<()> {
        let result = self.save();
        if let Err(e) = &result {
            error!(path = %self.image_path.display(), error = %e, "failed to save image");
        }
        result
    }
}

/// `<image>.tmp` next to the image.
fn temp_path(image: &Path) -> FsResult<PathBuf> {
    let name = image
        .file_name()
        .ok_or_else(|| FsError::invalid_path(image.display().to_string()))?;
    let mut tmp = name.to_os_string();
    tmp.push(".tmp");
    Ok(image.with_file_name(tmp))
}

/// Create `path`, write `bytes`, and flush them to disk.
fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Log a failed operation at debug level and pass the result through.
fn logged<T>(op: &'static str, path: &str, result: FsResult<T>) -> FsResult<T> {
    if let Err(e) = &result {
        debug!(op, path, error = %e, "operation failed");
    }
    result
}

impl FsOps for Engine {
    fn getattr(&self, path: &str) -> FsResult<FileAttr> {
        logged("getattr", path, self.tree.lock().get_attributes(path))
    }

    fn readdir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        let tree = self.tree.lock();
        logged("readdir", path, tree.list_directory(path).map(Iterator::collect))
    }

    fn open(&self, path: &str) -> FsResult<()> {
        logged("open", path, self.tree.lock().open(path))
    }

    fn read(&self, path: &str, buf: &mut [u8], offset: i64) -> FsResult<usize> {
        logged("read", path, self.tree.lock().read(path, buf, offset))
    }

    fn write(&self, path: &str, data: &[u8], offset: i64) -> FsResult<usize> {
        logged("write", path, self.tree.lock().write(path, data, offset))
    }

    fn create(&self, path: &str, mode: u32, owner: Credentials) -> FsResult<FileAttr> {
        logged("create", path, self.tree.lock().create_file(path, mode, owner))
    }

    fn mkdir(&self, path: &str, mode: u32, owner: Credentials) -> FsResult<FileAttr> {
        logged("mkdir", path, self.tree.lock().create_directory(path, mode, owner))
    }

    fn unlink(&self, path: &str) -> FsResult<()> {
        logged("unlink", path, self.tree.lock().remove_file(path))
    }

    fn rmdir(&self, path: &str) -> FsResult<()> {
        logged("rmdir", path, self.tree.lock().remove_directory(path))
    }

    fn truncate(&self, path: &str, size: i64) -> FsResult<()> {
        logged("truncate", path, self.tree.lock().truncate(path, size))
    }

    fn utimens(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        logged("utimens", path, self.tree.lock().set_times(path, atime, mtime))
    }

    fn statfs(&self) -> FsResult<StatFs> {
        Ok(self.tree.lock().statfs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> Credentials {
        Credentials::new(1000, 1000)
    }

    fn engine() -> Engine {
        Engine::fresh(FsConfig::with_image("unused.img"), me())
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn test_ops_through_trait_object() {
        let engine = engine();
        let fs: &dyn FsOps = &engine;
        fs.mkdir("/a", 0o755, me()).unwrap();
        fs.create("/a/f", 0o644, me()).unwrap();
        assert_eq!(fs.write("/a/f", b"data", 0).unwrap(), 4);
        assert_eq!(fs.read_all("/a/f").unwrap(), b"data");
        assert_eq!(fs.read_vec("/a/f", 2, 10).unwrap(), b"ta");
        assert!(fs.exists("/a/f"));
        assert!(!fs.exists("/a/g"));
    }

    #[test]
    fn test_readdir_collects_listing() {
        let engine = engine();
        engine.create("/x", 0o644, me()).unwrap();
        let names: Vec<_> = engine
            .readdir("/")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, [".", "..", "x"]);
    }

    #[test]
    fn test_statfs_and_stats() {
        let engine = engine();
        engine.mkdir("/d", 0o755, me()).unwrap();
        assert_eq!(engine.stats().directories, 2);
        assert_eq!(engine.statfs().unwrap().files, 2);
        assert_eq!(engine.limits(), Limits::default());
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/var/lib/fs.img")).unwrap(),
            PathBuf::from("/var/lib/fs.img.tmp")
        );
        assert_eq!(
            temp_path(Path::new("fs.img")).unwrap(),
            PathBuf::from("fs.img.tmp")
        );
        assert!(temp_path(Path::new("/")).is_err());
    }
}
