//! Manifest tree
//!
//! An arena of entries addressed by [`EntryId`], the root directory is always
//! [`ROOT`]. Directories hold their children ids in order, and every offset
//! and size is settled by one pre-order pass ([`Tree::build_index`]) so
//! nothing ever walks back up from a child to its parent.
//!
//! Offsets are into the flattened content buffer: every non-excluded file
//! occupies `[offset, offset + size)` and files follow each other in
//! pre-order. An excluded entry keeps the offset its position implies but
//! takes no space, and neither does anything below it.
mod handle;
mod index;

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use log::{debug, info};

use wcore::buf::read_into;

use crate::cancel::{CancelToken, Progress};
use crate::error::ArchiveError;

pub use handle::{is_ignored, Handle};
pub use index::IndexNode;

pub type EntryId = usize;

pub const ROOT: EntryId = 0;

// Read granularity for load_data, cancellation and progress are per block
const READ_BLOCK: usize = 64 * 1024;

/// Raw bytes behind a file leaf.
#[derive(Debug)]
pub enum Source {
    Bytes(Vec<u8>),
    File { path: PathBuf, size: u64 },
}

impl Source {
    pub fn from_path(path: &Path) -> std::io::Result<Source> {
        let size = std::fs::metadata(path)?.len();
        Ok(Source::File {
            path: path.to_path_buf(),
            size,
        })
    }

    pub fn size(&self) -> u64 {
        match self {
            Source::Bytes(b) => b.len() as u64,
            Source::File { size, .. } => *size,
        }
    }

    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        match self {
            Source::Bytes(b) => Ok(Box::new(Cursor::new(b.as_slice()))),
            Source::File { path, .. } => Ok(Box::new(File::open(path)?)),
        }
    }
}

#[derive(Debug)]
pub enum Kind {
    /// `source` is empty for trees rebuilt from an index
    File { source: Option<Source> },
    Dir { children: Vec<EntryId> },
}

#[derive(Debug)]
pub struct Entry {
    pub name: String,
    pub size: u64,
    pub offset: u64,
    pub excluded: bool,
    pub kind: Kind,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, Kind::Dir { .. })
    }

    pub fn source(&self) -> Option<&Source> {
        match &self.kind {
            Kind::File { source } => source.as_ref(),
            Kind::Dir { .. } => None,
        }
    }
}

/// One row of [`Tree::flatten_entries`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatEntry {
    pub id: EntryId,
    /// `a/b/file` for files, `a/b/` for directories
    pub path: String,
    pub size: u64,
    pub offset: u64,
    pub is_dir: bool,
    /// Set when the entry or any of its ancestors is excluded
    pub excluded: bool,
}

#[derive(Debug)]
pub struct Tree {
    entries: Vec<Entry>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

fn index_overflow() -> ArchiveError {
    ArchiveError::Format("index sizes overflow".to_string())
}

fn check_name(name: &str) -> Result<(), ArchiveError> {
    if name.is_empty() || name.contains('/') {
        return Err(ArchiveError::Contract(format!("invalid entry name {:?}", name)));
    }
    Ok(())
}

impl Tree {
    pub fn new() -> Tree {
        Tree {
            entries: vec![Entry {
                name: String::new(),
                size: 0,
                offset: 0,
                excluded: false,
                kind: Kind::Dir { children: vec![] },
            }],
        }
    }

    pub fn root(&self) -> &Entry {
        &self.entries[ROOT]
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    fn entry(&self, id: EntryId) -> Result<&Entry, ArchiveError> {
        self.entries
            .get(id)
            .ok_or_else(|| ArchiveError::Contract(format!("no entry {}", id)))
    }

    pub fn children(&self, id: EntryId) -> Result<&[EntryId], ArchiveError> {
        match &self.entry(id)?.kind {
            Kind::Dir { children } => Ok(children),
            Kind::File { .. } => Err(ArchiveError::Contract(format!(
                "{:?} is not a directory",
                self.entries[id].name
            ))),
        }
    }

    /// Total content size as of the last [`Tree::build_index`].
    pub fn total_size(&self) -> u64 {
        self.entries[ROOT].size
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether any file survives exclusion
    pub fn has_files(&self) -> bool {
        self.flatten_entries(true).iter().any(|f| !f.excluded)
    }

    fn push_child(&mut self, dir: EntryId, entry: Entry) -> Result<EntryId, ArchiveError> {
        self.children(dir)?;

        let id = self.entries.len();
        self.entries.push(entry);
        if let Kind::Dir { children } = &mut self.entries[dir].kind {
            children.push(id);
        }
        Ok(id)
    }

    /// Append a file leaf to `dir`. The leaf lands right after what `dir`
    /// already holds; ancestors catch up on the next `build_index`.
    pub fn add_source(&mut self, dir: EntryId, name: &str, source: Source) -> Result<EntryId, ArchiveError> {
        check_name(name)?;
        let parent = self.entry(dir)?;
        let offset = parent.offset + parent.size;
        let size = source.size();

        let id = self.push_child(
            dir,
            Entry {
                name: name.to_string(),
                size,
                offset,
                excluded: false,
                kind: Kind::File {
                    source: Some(source),
                },
            },
        )?;
        self.entries[dir].size += size;
        Ok(id)
    }

    pub fn add_dir(&mut self, parent: EntryId, name: &str) -> Result<EntryId, ArchiveError> {
        check_name(name)?;
        let dir = self.entry(parent)?;
        let offset = dir.offset + dir.size;

        self.push_child(
            parent,
            Entry {
                name: name.to_string(),
                size: 0,
                offset,
                excluded: false,
                kind: Kind::Dir { children: vec![] },
            },
        )
    }

    /// Ingest an enumerated hierarchy under `parent`. At every level the
    /// files go in before the subdirectories. Ignored names are dropped
    /// entirely, `None` is returned when `handle` itself is ignored.
    pub fn add_handle(&mut self, parent: EntryId, handle: Handle) -> Result<Option<EntryId>, ArchiveError> {
        if is_ignored(handle.name()) {
            debug!("ignoring {:?}", handle.name());
            return Ok(None);
        }

        match handle {
            Handle::File { name, source } => self.add_source(parent, &name, source).map(Some),
            Handle::Dir { name, children } => {
                let dir = self.add_dir(parent, &name)?;

                let (files, dirs): (Vec<Handle>, Vec<Handle>) =
                    children.into_iter().partition(|h| !h.is_dir());
                for child in files.into_iter().chain(dirs) {
                    self.add_handle(dir, child)?;
                }

                let size = self.entries[dir].size;
                self.entries[parent].size += size;
                Ok(Some(dir))
            }
        }
    }

    pub fn set_excluded(&mut self, id: EntryId, excluded: bool) -> Result<(), ArchiveError> {
        if id == ROOT {
            return Err(ArchiveError::Contract("the root cannot be excluded".to_string()));
        }
        self.entry(id)?;
        self.entries[id].excluded = excluded;
        Ok(())
    }

    /// Recompute every offset and size below `id` starting at `base`, then
    /// project the subtree. Idempotent while the structure is unchanged.
    pub fn build_index(&mut self, id: EntryId, base: u64) -> Result<IndexNode, ArchiveError> {
        self.entry(id)?;
        let size = self.layout(id, base);
        info!("index built, {} entries, {} bytes", self.entries.len(), size);
        Ok(self.project(id))
    }

    fn layout(&mut self, id: EntryId, offset: u64) -> u64 {
        self.entries[id].offset = offset;

        let children = match &self.entries[id].kind {
            Kind::Dir { children } => children.clone(),
            Kind::File { .. } => return self.entries[id].size,
        };

        let mut size = 0;
        for child in children {
            let child_size = self.layout(child, offset + size);
            if !self.entries[child].excluded {
                size += child_size;
            }
        }
        self.entries[id].size = size;
        size
    }

    fn project(&self, id: EntryId) -> IndexNode {
        let entry = &self.entries[id];
        match &entry.kind {
            Kind::File { .. } => IndexNode::File {
                name: entry.name.clone(),
                size: entry.size,
            },
            Kind::Dir { children } => IndexNode::Dir {
                name: entry.name.clone(),
                size: entry.size,
                children: children
                    .iter()
                    .filter(|c| !self.entries[**c].excluded)
                    .map(|c| self.project(*c))
                    .collect(),
            },
        }
    }

    /// Rebuild a tree from its index projection, rejecting any directory
    /// whose children do not add up to its recorded size.
    pub fn import_index(root: &IndexNode) -> Result<Tree, ArchiveError> {
        let children = match root {
            IndexNode::Dir { children, .. } => children,
            IndexNode::File { name, .. } => {
                return Err(ArchiveError::Format(format!("index root {:?} is not a directory", name)))
            }
        };

        let mut tree = Tree::new();
        tree.entries[ROOT].name = root.name().to_string();

        let mut size = 0u64;
        for child in children {
            let child_size = tree.import_node(ROOT, child, size)?;
            size = size.checked_add(child_size).ok_or_else(index_overflow)?;
        }
        if size != root.size() {
            return Err(ArchiveError::Format(format!(
                "index root declares {} bytes, children hold {}",
                root.size(),
                size
            )));
        }
        tree.entries[ROOT].size = size;
        Ok(tree)
    }

    fn import_node(&mut self, parent: EntryId, node: &IndexNode, offset: u64) -> Result<u64, ArchiveError> {
        if node.name().is_empty() || node.name().contains('/') {
            return Err(ArchiveError::Format(format!("invalid entry name {:?}", node.name())));
        }

        let id = self.entries.len();
        self.entries.push(Entry {
            name: node.name().to_string(),
            size: node.size(),
            offset,
            excluded: false,
            kind: match node {
                IndexNode::File { .. } => Kind::File { source: None },
                IndexNode::Dir { .. } => Kind::Dir { children: vec![] },
            },
        });
        if let Kind::Dir { children } = &mut self.entries[parent].kind {
            children.push(id);
        }

        if let IndexNode::Dir { name, size, children } = node {
            let mut sum = 0u64;
            for child in children {
                let child_offset = offset.checked_add(sum).ok_or_else(index_overflow)?;
                let child_size = self.import_node(id, child, child_offset)?;
                sum = sum.checked_add(child_size).ok_or_else(index_overflow)?;
            }
            if sum != *size {
                return Err(ArchiveError::Format(format!(
                    "directory {:?} declares {} bytes, children hold {}",
                    name, size, sum
                )));
            }
        }
        Ok(node.size())
    }

    /// Pre-order listing below the root, files in the order their bytes
    /// sit in the content buffer. Directory rows are dropped with `skip_dirs`.
    pub fn flatten_entries(&self, skip_dirs: bool) -> Vec<FlatEntry> {
        let mut out = vec![];
        if let Kind::Dir { children } = &self.entries[ROOT].kind {
            for child in children {
                self.flatten_into(*child, "", false, skip_dirs, &mut out);
            }
        }
        out
    }

    fn flatten_into(&self, id: EntryId, prefix: &str, excluded: bool, skip_dirs: bool, out: &mut Vec<FlatEntry>) {
        let entry = &self.entries[id];
        let excluded = excluded || entry.excluded;

        match &entry.kind {
            Kind::File { .. } => out.push(FlatEntry {
                id,
                path: format!("{}{}", prefix, entry.name),
                size: entry.size,
                offset: entry.offset,
                is_dir: false,
                excluded,
            }),
            Kind::Dir { children } => {
                let path = format!("{}{}/", prefix, entry.name);
                if !skip_dirs {
                    out.push(FlatEntry {
                        id,
                        path: path.clone(),
                        size: entry.size,
                        offset: entry.offset,
                        is_dir: true,
                        excluded,
                    });
                }
                for child in children {
                    self.flatten_into(*child, &path, excluded, skip_dirs, out);
                }
            }
        }
    }

    /// Find a file by its `a/b/file` path.
    pub fn find(&self, path: &str) -> Option<EntryId> {
        let mut id = ROOT;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            id = *self
                .children(id)
                .ok()?
                .iter()
                .find(|c| self.entries[**c].name == part)?;
        }
        if id == ROOT {
            None
        } else {
            Some(id)
        }
    }

    /// Read every non-excluded leaf into one buffer of the root's size, each
    /// at its assigned offset. Call after `build_index`.
    pub fn load_data<P: Progress>(&self, cancel: &CancelToken, progress: &mut P) -> Result<Vec<u8>, ArchiveError> {
        let root = &self.entries[ROOT];
        if root.offset != 0 {
            return Err(ArchiveError::Contract("root offset must be 0".to_string()));
        }

        let total = usize::try_from(root.size)
            .map_err(|_| ArchiveError::Contract(format!("{} bytes do not fit in memory", root.size)))?;
        let mut buf = vec![0u8; total];
        let mut loaded = 0u64;

        for flat in self.flatten_entries(true) {
            cancel.check()?;
            if flat.excluded {
                continue;
            }

            let source = self.entries[flat.id].source().ok_or_else(|| {
                ArchiveError::Contract(format!("{} has no source to read from", flat.path))
            })?;
            if source.size() != flat.size {
                return Err(ArchiveError::Integrity(format!(
                    "{} was {} bytes, source now holds {}",
                    flat.path,
                    flat.size,
                    source.size()
                )));
            }

            let start = flat.offset as usize;
            let end = start
                .checked_add(flat.size as usize)
                .filter(|end| *end <= buf.len())
                .ok_or_else(|| ArchiveError::Integrity(format!("{} lies outside of the content", flat.path)))?;

            self.read_leaf(&flat.path, source, &mut buf[start..end], cancel, progress)?;
            loaded += flat.size;
        }

        if loaded != root.size {
            return Err(ArchiveError::Integrity(format!(
                "read {} bytes, expected {}",
                loaded, root.size
            )));
        }
        Ok(buf)
    }

    fn read_leaf<P: Progress>(
        &self,
        path: &str,
        source: &Source,
        dest: &mut [u8],
        cancel: &CancelToken,
        progress: &mut P,
    ) -> Result<(), ArchiveError> {
        let mut reader = source.open()?;
        let mut pos = 0;

        while pos < dest.len() {
            cancel.check()?;
            let end = (pos + READ_BLOCK).min(dest.len());
            let read = read_into(&mut reader, &mut dest[pos..end])?;
            let short = pos + read < end;
            pos += read;
            progress.report(path, pos as f64 / dest.len() as f64);

            if short {
                return Err(ArchiveError::Integrity(format!(
                    "{} ended after {} of {} bytes",
                    path,
                    pos,
                    dest.len()
                )));
            }
        }

        // Anything left over means the source grew
        let mut extra = [0u8; 1];
        if read_into(&mut reader, &mut extra)? != 0 {
            return Err(ArchiveError::Integrity(format!(
                "{} is longer than {} bytes",
                path,
                dest.len()
            )));
        }
        if dest.is_empty() {
            progress.report(path, 1.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_tree {
    use super::*;
    use crate::cancel::NoProgress;
    use wcore::msgpack;

    fn bytes(n: usize, fill: u8) -> Source {
        Source::Bytes(vec![fill; n])
    }

    fn sample() -> Tree {
        let mut tree = Tree::new();
        tree.add_source(ROOT, "a", bytes(3, 1)).unwrap();
        let dir = tree.add_dir(ROOT, "d").unwrap();
        tree.add_source(dir, "b", bytes(4, 2)).unwrap();
        tree.add_source(dir, "c", bytes(5, 3)).unwrap();
        tree.add_source(ROOT, "e", bytes(2, 4)).unwrap();
        tree
    }

    #[test]
    fn add_source_running_offset() {
        let mut tree = Tree::new();
        let a = tree.add_source(ROOT, "a", bytes(10, 0)).unwrap();
        let b = tree.add_source(ROOT, "b", bytes(7, 0)).unwrap();
        assert_eq!(tree.get(a).unwrap().offset, 0);
        assert_eq!(tree.get(b).unwrap().offset, 10);
        assert_eq!(tree.total_size(), 17);
    }

    #[test]
    fn add_source_to_file_is_contract() {
        let mut tree = Tree::new();
        let a = tree.add_source(ROOT, "a", bytes(1, 0)).unwrap();
        let err = tree.add_source(a, "b", bytes(1, 0)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Contract);
    }

    #[test]
    fn bad_names() {
        let mut tree = Tree::new();
        assert!(tree.add_source(ROOT, "", bytes(1, 0)).is_err());
        assert!(tree.add_dir(ROOT, "a/b").is_err());
    }

    #[test]
    fn build_index_layout() {
        let mut tree = sample();
        let index = tree.build_index(ROOT, 0).unwrap();
        assert_eq!(index.size(), 14);

        let flat = tree.flatten_entries(false);
        let rows: Vec<(&str, u64, u64)> = flat.iter().map(|f| (f.path.as_str(), f.offset, f.size)).collect();
        assert_eq!(
            rows,
            vec![("a", 0, 3), ("d/", 3, 9), ("d/b", 3, 4), ("d/c", 7, 5), ("e", 12, 2)]
        );
    }

    #[test]
    fn build_index_idempotent() {
        let mut tree = sample();
        let first = tree.build_index(ROOT, 0).unwrap();
        let second = tree.build_index(ROOT, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn excluded_entries() {
        let mut tree = sample();
        let d = tree.find("d").unwrap();
        tree.set_excluded(d, true).unwrap();
        let index = tree.build_index(ROOT, 0).unwrap();

        assert_eq!(index.size(), 5);
        let e = tree.get(tree.find("e").unwrap()).unwrap();
        // d keeps its slot but takes no room
        assert_eq!(tree.get(d).unwrap().offset, 3);
        assert_eq!(e.offset, 3);

        let flat = tree.flatten_entries(true);
        let excluded: Vec<&str> = flat.iter().filter(|f| f.excluded).map(|f| f.path.as_str()).collect();
        assert_eq!(excluded, vec!["d/b", "d/c"]);

        match index {
            IndexNode::Dir { children, .. } => assert_eq!(children.len(), 2),
            _ => panic!("root is a dir"),
        }

        let data = tree.load_data(&CancelToken::new(), &mut NoProgress).unwrap();
        assert_eq!(data, vec![1, 1, 1, 4, 4]);
    }

    #[test]
    fn root_cannot_be_excluded() {
        let mut tree = sample();
        assert!(tree.set_excluded(ROOT, true).is_err());
    }

    #[test]
    fn import_roundtrip() {
        let mut tree = sample();
        let index = tree.build_index(ROOT, 0).unwrap();
        let imported = Tree::import_index(&index).unwrap();

        let strip = |t: &Tree| -> Vec<(String, u64, u64)> {
            t.flatten_entries(false)
                .into_iter()
                .map(|f| (f.path, f.offset, f.size))
                .collect()
        };
        assert_eq!(strip(&imported), strip(&tree));
    }

    #[test]
    fn import_size_mismatch() {
        let index = IndexNode::Dir {
            name: String::new(),
            size: 10,
            children: vec![IndexNode::Dir {
                name: "d".to_string(),
                size: 4,
                children: vec![IndexNode::File {
                    name: "f".to_string(),
                    size: 5,
                }],
            }],
        };
        let err = Tree::import_index(&index).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }

    #[test]
    fn empty_dirs_survive_index_bytes() {
        let mut tree = Tree::new();
        tree.add_source(ROOT, "a", bytes(3, 1)).unwrap();
        tree.add_dir(ROOT, "empty").unwrap();
        let hidden = tree.add_dir(ROOT, "hidden").unwrap();
        let f = tree.add_source(hidden, "f", bytes(2, 2)).unwrap();
        tree.set_excluded(f, true).unwrap();

        let index = tree.build_index(ROOT, 0).unwrap();
        let bytes = msgpack::to_vec(&index.to_value()).unwrap();
        let value = msgpack::from_slice(&bytes).unwrap();
        let imported = Tree::import_index(&IndexNode::from_root_value(&value).unwrap()).unwrap();

        let rows: Vec<(String, bool)> = imported
            .flatten_entries(false)
            .into_iter()
            .map(|f| (f.path, f.is_dir))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("a".to_string(), false),
                ("empty/".to_string(), true),
                ("hidden/".to_string(), true),
            ]
        );
    }

    #[test]
    fn import_size_overflow() {
        let file = |name: &str, size| IndexNode::File {
            name: name.to_string(),
            size,
        };
        let flat = IndexNode::Dir {
            name: String::new(),
            size: 0,
            children: vec![file("a", u64::MAX), file("b", 1)],
        };
        let err = Tree::import_index(&flat).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);

        let nested = IndexNode::Dir {
            name: String::new(),
            size: 0,
            children: vec![IndexNode::Dir {
                name: "d".to_string(),
                size: 0,
                children: vec![file("a", u64::MAX), file("b", 1)],
            }],
        };
        let err = Tree::import_index(&nested).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);

        // children fit, their offsets do not
        let shifted = IndexNode::Dir {
            name: String::new(),
            size: 0,
            children: vec![
                file("a", u64::MAX),
                IndexNode::Dir {
                    name: "d".to_string(),
                    size: 2,
                    children: vec![file("b", 1), file("c", 1)],
                },
            ],
        };
        let err = Tree::import_index(&shifted).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
    }

    #[test]
    fn import_file_root() {
        let index = IndexNode::File {
            name: "f".to_string(),
            size: 1,
        };
        assert!(Tree::import_index(&index).is_err());
    }

    #[test]
    fn load_data_offsets() {
        let mut tree = sample();
        tree.build_index(ROOT, 0).unwrap();

        let mut reports = vec![];
        let mut sink = |path: &str, f: f64| reports.push((path.to_string(), f));
        let data = tree.load_data(&CancelToken::new(), &mut sink).unwrap();

        assert_eq!(data, vec![1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 3, 4, 4]);
        let done: Vec<&str> = reports.iter().filter(|r| r.1 == 1.0).map(|r| r.0.as_str()).collect();
        assert_eq!(done, vec!["a", "d/b", "d/c", "e"]);
    }

    #[test]
    fn load_data_cancelled() {
        let mut tree = sample();
        tree.build_index(ROOT, 0).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = tree.load_data(&cancel, &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Cancelled);
    }

    #[test]
    fn load_data_without_source() {
        let mut tree = sample();
        let index = tree.build_index(ROOT, 0).unwrap();
        let imported = Tree::import_index(&index).unwrap();
        let err = imported.load_data(&CancelToken::new(), &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Contract);
    }

    #[test]
    fn load_data_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"12345").unwrap();

        let mut tree = Tree::new();
        tree.add_source(ROOT, "f", Source::from_path(&path).unwrap()).unwrap();
        tree.build_index(ROOT, 0).unwrap();

        // Shrinks behind our back
        std::fs::write(&path, b"123").unwrap();
        let err = tree.load_data(&CancelToken::new(), &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Integrity);

        // Grows behind our back
        std::fs::write(&path, b"1234567").unwrap();
        let err = tree.load_data(&CancelToken::new(), &mut NoProgress).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Integrity);
    }

    #[test]
    fn find_paths() {
        let tree = sample();
        assert!(tree.find("d/c").is_some());
        assert!(tree.find("d/x").is_none());
        assert!(tree.find("a/b").is_none());
        assert!(tree.find("").is_none());
    }
}

#[cfg(test)]
mod test_tree_props {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use wcore::msgpack;

    // (size, excluded) per file, grouped in directories of up to 4 levels
    #[derive(Clone, Debug)]
    enum Shape {
        File(usize, bool),
        Dir(Vec<Shape>, bool),
    }

    fn arb_shape() -> impl Strategy<Value = Shape> {
        let leaf = (0usize..64, prop::bool::weighted(0.1)).prop_map(|(s, e)| Shape::File(s, e));
        leaf.prop_recursive(4, 48, 6, |inner| {
            (vec(inner, 0..6), prop::bool::weighted(0.1)).prop_map(|(c, e)| Shape::Dir(c, e))
        })
    }

    fn grow(tree: &mut Tree, dir: EntryId, shapes: &[Shape]) {
        for (i, shape) in shapes.iter().enumerate() {
            let name = format!("n{}", i);
            match shape {
                Shape::File(size, excluded) => {
                    let id = tree.add_source(dir, &name, Source::Bytes(vec![i as u8; *size])).unwrap();
                    tree.set_excluded(id, *excluded).unwrap();
                }
                Shape::Dir(children, excluded) => {
                    let id = tree.add_dir(dir, &name).unwrap();
                    grow(tree, id, children);
                    tree.set_excluded(id, *excluded).unwrap();
                }
            }
        }
    }

    proptest! {
        #[test]
        fn offsets_and_sizes(shapes in vec(arb_shape(), 0..6)) {
            let mut tree = Tree::new();
            grow(&mut tree, ROOT, &shapes);
            let first = tree.build_index(ROOT, 0).unwrap();

            // directory size is the sum of its non-excluded children
            for id in 0..tree.entry_count() {
                let entry = tree.get(id).unwrap();
                if let Kind::Dir { children } = &entry.kind {
                    let sum: u64 = children
                        .iter()
                        .map(|c| tree.get(*c).unwrap())
                        .filter(|c| !c.excluded)
                        .map(|c| c.size)
                        .sum();
                    prop_assert_eq!(entry.size, sum);
                }
            }

            // included files tile the buffer in pre-order
            let mut next = 0;
            for flat in tree.flatten_entries(true).iter().filter(|f| !f.excluded) {
                prop_assert_eq!(flat.offset, next);
                next += flat.size;
            }
            prop_assert_eq!(next, tree.total_size());
            prop_assert_eq!(tree.root().offset, 0);

            let second = tree.build_index(ROOT, 0).unwrap();
            prop_assert_eq!(&first, &second);

            // the index survives its byte form with every included row intact
            let bytes = msgpack::to_vec(&first.to_value()).unwrap();
            let value = msgpack::from_slice(&bytes).unwrap();
            let imported = Tree::import_index(&IndexNode::from_root_value(&value).unwrap()).unwrap();

            let rows = |flat: Vec<FlatEntry>| -> Vec<(String, u64, u64, bool)> {
                flat.into_iter()
                    .filter(|f| !f.excluded)
                    .map(|f| (f.path, f.offset, f.size, f.is_dir))
                    .collect()
            };
            prop_assert_eq!(rows(imported.flatten_entries(false)), rows(tree.flatten_entries(false)));
            prop_assert_eq!(imported.total_size(), tree.total_size());
        }
    }
}
