//! Path resolution.
//!
//! Paths are absolute, `/`-separated byte strings as delivered by the
//! kernel bridge. Resolution walks the tree top-down from the root; there
//! are no parent back-pointers.

use crate::config::Limits;
use crate::error::{FsError, FsResult};
use crate::inode::Inode;

/// Components of an absolute path, in order.
///
/// Empty components (repeated or trailing separators) are skipped, so
/// `/a/` and `/a//` resolve like `/a`.
pub fn components(path: &str) -> FsResult<impl Iterator<Item = &str>> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| FsError::invalid_path(path))?;
    Ok(rest.split('/').filter(|c| !c.is_empty()))
}

/// Split a path into `(parent_path, final_component)`.
///
/// Fails with `InvalidPath` when there is no usable split point: the root
/// itself, a relative path, or a path ending in a separator.
pub fn split_parent(path: &str) -> FsResult<(&str, &str)> {
    let idx = path.rfind('/').ok_or_else(|| FsError::invalid_path(path))?;
    let name = &path[idx + 1..];
    if name.is_empty() || !path.starts_with('/') {
        return Err(FsError::invalid_path(path));
    }
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Ok((parent, name))
}

/// Check a new entry name against the configured limits.
pub fn validate_name(name: &str, limits: &Limits) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FsError::invalid_path(name));
    }
    if name.len() > limits.max_name_len {
        return Err(FsError::name_too_long(name));
    }
    Ok(())
}

/// Resolve `path` to the inode it denotes.
pub fn resolve<'a>(root: &'a Inode, path: &str) -> FsResult<&'a Inode> {
    let mut current = root;
    for name in components(path)? {
        let dir = current
            .as_dir()
            .ok_or_else(|| FsError::not_a_directory(path))?;
        current = dir.get(name).ok_or_else(|| FsError::not_found(path))?;
    }
    Ok(current)
}

/// Resolve `path` to the inode it denotes, mutably.
pub fn resolve_mut<'a>(root: &'a mut Inode, path: &str) -> FsResult<&'a mut Inode> {
    let mut current = root;
    for name in components(path)? {
        let dir = match current.as_dir_mut() {
            Some(dir) => dir,
            None => return Err(FsError::not_a_directory(path)),
        };
        current = match dir.get_mut(name) {
            Some(child) => child,
            None => return Err(FsError::not_found(path)),
        };
    }
    Ok(current)
}

/// Resolve the directory containing `path`'s final component.
///
/// The root is its own parent.
pub fn resolve_parent<'a>(root: &'a Inode, path: &str) -> FsResult<&'a Inode> {
    let names: Vec<&str> = components(path)?.collect();
    let mut current = root;
    for name in names.iter().take(names.len().saturating_sub(1)) {
        let dir = current
            .as_dir()
            .ok_or_else(|| FsError::not_a_directory(path))?;
        current = dir.get(name).ok_or_else(|| FsError::not_found(path))?;
    }
    Ok(current)
}
