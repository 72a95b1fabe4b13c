use std::path::Path;

use ignore::WalkBuilder;
use log::{debug, info};

use super::Source;
use crate::error::ArchiveError;

/// Externally enumerated hierarchy, the input of `Tree::add_handle`.
#[derive(Debug)]
pub enum Handle {
    File { name: String, source: Source },
    Dir { name: String, children: Vec<Handle> },
}

/// Static ignore list: dot files and `node_modules`.
pub fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || name == "node_modules"
}

impl Handle {
    pub fn name(&self) -> &str {
        match self {
            Handle::File { name, .. } | Handle::Dir { name, .. } => name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir { .. })
    }

    /// Enumerate `path` one directory level at a time, entries sorted by
    /// name. Ignored names are not descended into.
    pub fn from_path(path: &Path, follow_links: bool) -> Result<Handle, ArchiveError> {
        let meta = if follow_links {
            std::fs::metadata(path)?
        } else {
            std::fs::symlink_metadata(path)?
        };

        // "." and friends have no file name of their own
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => path
                .canonicalize()?
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ArchiveError::Contract(format!("{} has no name", path.display())))?,
        };

        if meta.is_file() {
            return Ok(Handle::File {
                name,
                source: Source::from_path(path)?,
            });
        }
        if !meta.is_dir() {
            return Err(ArchiveError::Contract(format!(
                "{} is neither a file nor a directory",
                path.display()
            )));
        }

        let walker = WalkBuilder::new(path)
            .max_depth(Some(1))
            .standard_filters(false)
            .follow_links(follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut children = vec![];
        for entry in walker {
            let entry = entry.map_err(|e| {
                ArchiveError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let child_name = entry.file_name().to_string_lossy();
            if is_ignored(&child_name) {
                debug!("SKIP: {}", entry.path().display());
                continue;
            }

            match entry.file_type() {
                Some(ft) if ft.is_dir() => children.push(Handle::from_path(entry.path(), follow_links)?),
                Some(ft) if ft.is_file() => children.push(Handle::File {
                    name: child_name.into_owned(),
                    source: Source::from_path(entry.path())?,
                }),
                _ => info!("SKIP: {}", entry.path().display()),
            }
        }

        Ok(Handle::Dir { name, children })
    }
}

#[cfg(test)]
mod test_handle {
    use super::*;
    use crate::cancel::{CancelToken, NoProgress};
    use crate::tree::{Tree, ROOT};
    use std::fs;

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        fs::create_dir_all(root.join("src/deep")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();

        fs::write(root.join("zeta.txt"), b"zz").unwrap();
        fs::write(root.join("alpha.txt"), b"a").unwrap();
        fs::write(root.join(".env"), b"secret").unwrap();
        fs::write(root.join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(root.join("src/deep/x"), b"xyz").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), b"junk").unwrap();
        fs::write(root.join(".git/HEAD"), b"ref").unwrap();
        dir
    }

    #[test]
    fn ignore_list() {
        assert!(is_ignored(".git"));
        assert!(is_ignored(".env"));
        assert!(is_ignored("node_modules"));
        assert!(!is_ignored("node_modules2"));
        assert!(!is_ignored("a.b"));
    }

    #[test]
    fn files_before_dirs() {
        let dir = layout();
        let handle = Handle::from_path(&dir.path().join("proj"), false).unwrap();

        let mut tree = Tree::new();
        tree.add_handle(ROOT, handle).unwrap();
        tree.build_index(ROOT, 0).unwrap();

        let paths: Vec<String> = tree.flatten_entries(false).into_iter().map(|f| f.path).collect();
        assert_eq!(
            paths,
            vec![
                "proj/",
                "proj/alpha.txt",
                "proj/zeta.txt",
                "proj/src/",
                "proj/src/main.rs",
                "proj/src/deep/",
                "proj/src/deep/x",
            ]
        );

        let data = tree.load_data(&CancelToken::new(), &mut NoProgress).unwrap();
        assert_eq!(data, b"azzfn main() {}xyz".to_vec());
    }

    #[test]
    fn add_handle_skips_ignored() {
        let mut tree = Tree::new();
        let handle = Handle::Dir {
            name: "d".to_string(),
            children: vec![
                Handle::Dir {
                    name: "node_modules".to_string(),
                    children: vec![],
                },
                Handle::File {
                    name: ".hidden".to_string(),
                    source: Source::Bytes(vec![1]),
                },
                Handle::File {
                    name: "kept".to_string(),
                    source: Source::Bytes(vec![2, 3]),
                },
            ],
        };
        let id = tree.add_handle(ROOT, handle).unwrap().unwrap();
        assert_eq!(tree.children(id).unwrap().len(), 1);
        assert_eq!(tree.total_size(), 2);

        let ignored = Handle::Dir {
            name: ".cache".to_string(),
            children: vec![],
        };
        assert!(tree.add_handle(ROOT, ignored).unwrap().is_none());
    }

    #[test]
    fn single_file() {
        let dir = layout();
        let handle = Handle::from_path(&dir.path().join("proj/alpha.txt"), false).unwrap();
        assert_eq!(handle.name(), "alpha.txt");
        assert!(!handle.is_dir());
    }
}
