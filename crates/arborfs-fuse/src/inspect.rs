//! `arborfs inspect`: dump an image as JSON without mounting it.

use arborfs_kernel::{Engine, FileAttr, FsResult, Tree, TreeStats};
use serde::Serialize;

use crate::inodes::join;

/// One inode with its path and, for directories, its children.
#[derive(Debug, Serialize)]
pub struct Node {
    pub path: String,
    #[serde(flatten)]
    pub attr: FileAttr,
    /// Permission bits as an octal string, e.g. `"0644"`.
    pub perm: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub image: String,
    pub stats: TreeStats,
    pub root: Node,
}

/// Walk the whole tree under the engine lock.
pub fn report(engine: &Engine) -> FsResult<Report> {
    let root = engine.with_tree(|tree| node(tree, "/"))?;
    Ok(Report {
        image: engine.image_path().display().to_string(),
        stats: engine.stats(),
        root,
    })
}

fn node(tree: &Tree, path: &str) -> FsResult<Node> {
    let attr = tree.get_attributes(path)?;
    let mut children = Vec::new();
    if attr.is_dir() {
        let names: Vec<String> = tree
            .list_directory(path)?
            .skip(2)
            .map(|entry| entry.name)
            .collect();
        for name in names {
            children.push(node(tree, &join(path, &name))?);
        }
    }
    Ok(Node {
        path: path.to_owned(),
        perm: format!("{:04o}", attr.perm()),
        attr,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arborfs_kernel::{Credentials, FsConfig, FsOps};

    #[test]
    fn test_report_shape() {
        let me = Credentials::new(1000, 1000);
        let engine = Engine::fresh(FsConfig::with_image("shown.img"), me);
        engine.mkdir("/a", 0o750, me).unwrap();
        engine.create("/a/b.txt", 0o644, me).unwrap();
        engine.write("/a/b.txt", b"hello", 0).unwrap();

        let report = report(&engine).unwrap();
        assert_eq!(report.image, "shown.img");
        assert_eq!(report.stats.inodes, 3);
        assert_eq!(report.root.children.len(), 1);
        let a = &report.root.children[0];
        assert_eq!(a.path, "/a");
        assert_eq!(a.perm, "0750");
        assert_eq!(a.children[0].path, "/a/b.txt");
        assert_eq!(a.children[0].attr.size, 5);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["root"]["children"][0]["children"][0]["size"], 5);
        assert_eq!(json["root"]["kind"], "Directory");
        assert!(json["root"]["children"][0]["children"][0].get("children").is_none());
    }

    #[test]
    fn test_report_with_pre_epoch_times() {
        use std::time::{Duration, SystemTime};

        let me = Credentials::new(1000, 1000);
        let engine = Engine::fresh(FsConfig::with_image("old.img"), me);
        engine.create("/old", 0o644, me).unwrap();
        let year_before = SystemTime::UNIX_EPOCH - Duration::from_secs(365 * 86_400);
        engine.utimens("/old", year_before, year_before).unwrap();

        let text = serde_json::to_string_pretty(&report(&engine).unwrap()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let old = &json["root"]["children"][0];
        assert_eq!(old["path"], "/old");
        assert_eq!(old["atime"], serde_json::json!([-31_536_000, 0]));
        assert_eq!(old["mtime"], serde_json::json!([-31_536_000, 0]));
    }
}
