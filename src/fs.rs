//! Filesystem collaborator
//!
//! Everything the crate reads goes through [`FileSystem`]. Two implementations ship:
//! - [`DiskFileSystem`] reads the real disk and walks directories with `ignore`
//!   (gitignore rules honored, dependency directories pruned)
//! - [`MemoryFileSystem`] serves pre-loaded contents for no-disk runs

use crate::paths::CanonicalPath;
use ignore::WalkBuilder;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::io;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

pub trait FileSystem: Send + Sync + Debug {
    fn read_file(&self, path: &CanonicalPath) -> io::Result<String>;

    fn read_dir(&self, path: &CanonicalPath) -> io::Result<Vec<DirEntry>>;

    fn exists(&self, path: &CanonicalPath) -> bool;

    fn is_dir(&self, path: &CanonicalPath) -> bool;

    fn is_file(&self, path: &CanonicalPath) -> bool {
        self.exists(path) && !self.is_dir(path)
    }

    /// Recursively list regular files under `root`, sorted.
    ///
    /// Directories whose name appears in `skip_dirs` are not descended into.
    fn walk_files(&self, root: &CanonicalPath, skip_dirs: &[String]) -> io::Result<Vec<CanonicalPath>> {
        if !self.is_dir(root) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {root}"),
            ));
        }
        let mut files = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in self.read_dir(&dir)? {
                let path = dir.join(&entry.name);
                if entry.is_dir {
                    if !skip_dirs.iter().any(|skip| skip == &entry.name) {
                        pending.push(path);
                    }
                } else {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Reads straight from the local disk.
#[derive(Debug, Default, Clone)]
pub struct DiskFileSystem;

impl DiskFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for DiskFileSystem {
    fn read_file(&self, path: &CanonicalPath) -> io::Result<String> {
        std::fs::read_to_string(path.to_path_buf())
    }

    fn read_dir(&self, path: &CanonicalPath) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path.to_path_buf())? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort();
        Ok(entries)
    }

    fn exists(&self, path: &CanonicalPath) -> bool {
        path.to_path_buf().exists()
    }

    fn is_dir(&self, path: &CanonicalPath) -> bool {
        path.to_path_buf().is_dir()
    }

    fn walk_files(&self, root: &CanonicalPath, skip_dirs: &[String]) -> io::Result<Vec<CanonicalPath>> {
        let root_path = root.to_path_buf();
        if !root_path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {root}"),
            ));
        }

        let skip: Vec<String> = skip_dirs.to_vec();
        let mut builder = WalkBuilder::new(&root_path);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                name != ".git" && !skip.iter().any(|s| *s == name)
            });

        let mut files: Vec<CanonicalPath> = builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| CanonicalPath::new(entry.path()))
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Serves request-supplied contents; directories are implied by file paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryFileSystem {
    files: BTreeMap<CanonicalPath, String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<CanonicalPath>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn with_file(mut self, path: impl Into<CanonicalPath>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn children_of<'a>(&'a self, dir: &'a CanonicalPath) -> impl Iterator<Item = &'a CanonicalPath> {
        self.files
            .keys()
            .filter(move |path| path.starts_with(dir) && *path != dir)
    }
}

impl<P: Into<CanonicalPath>, S: Into<String>> FromIterator<(P, S)> for MemoryFileSystem {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let mut fs = MemoryFileSystem::new();
        for (path, contents) in iter {
            fs.insert(path, contents);
        }
        fs
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_file(&self, path: &CanonicalPath) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no in-memory contents for {path}"))
        })
    }

    fn read_dir(&self, path: &CanonicalPath) -> io::Result<Vec<DirEntry>> {
        if !self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {path}"),
            ));
        }
        let mut entries = BTreeSet::new();
        for child in self.children_of(path) {
            let Some(rest) = child.strip_prefix(path) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => entries.insert(DirEntry {
                    name: dir.to_string(),
                    is_dir: true,
                }),
                None => entries.insert(DirEntry {
                    name: rest.to_string(),
                    is_dir: false,
                }),
            };
        }
        Ok(entries.into_iter().collect())
    }

    fn exists(&self, path: &CanonicalPath) -> bool {
        self.files.contains_key(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &CanonicalPath) -> bool {
        self.children_of(path).next().is_some()
    }

    fn walk_files(&self, root: &CanonicalPath, skip_dirs: &[String]) -> io::Result<Vec<CanonicalPath>> {
        if !self.is_dir(root) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {root}"),
            ));
        }
        Ok(self
            .children_of(root)
            .filter(|path| {
                let rest = path.strip_prefix(root).unwrap_or_default();
                let mut dirs: Vec<&str> = rest.split('/').collect();
                dirs.pop();
                !dirs.iter().any(|d| skip_dirs.iter().any(|s| s == d))
            })
            .cloned()
            .collect())
    }
}
