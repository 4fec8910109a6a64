//! Canonical, OS-independent path representation.
//!
//! Every path that crosses a component boundary (store keys, cache keys, file
//! lists returned to callers) is a [`CanonicalPath`]: forward slashes only,
//! `.` and `..` segments resolved lexically, no trailing slash. Lexical
//! normalization keeps in-memory mode working without touching the disk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// Normalize any platform path into canonical form.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::from_unix(&path.as_ref().to_string_lossy())
    }

    /// Normalize a string path. Backslashes are treated as separators.
    pub fn from_unix(raw: &str) -> Self {
        Self(normalize(&raw.replace('\\', "/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/') || drive_prefix(&self.0).is_some()
    }

    /// The filesystem root this path lives under (`/` or `C:/`).
    pub fn root(&self) -> CanonicalPath {
        match drive_prefix(&self.0) {
            Some(drive) => Self(format!("{drive}/")),
            None => Self("/".to_string()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/" || (drive_prefix(&self.0).is_some() && self.0.len() == 3)
    }

    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Extension without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        let dot = name.rfind('.')?;
        (dot > 0).then(|| &name[dot + 1..])
    }

    pub fn parent(&self) -> Option<CanonicalPath> {
        if self.is_root() {
            return None;
        }
        let idx = self.0.rfind('/')?;
        let parent = &self.0[..idx];
        if parent.is_empty() {
            Some(Self("/".to_string()))
        } else if drive_prefix(parent).is_some() && parent.len() == 2 {
            Some(Self(format!("{parent}/")))
        } else {
            Some(Self(parent.to_string()))
        }
    }

    /// Join a relative or absolute path onto this one.
    pub fn join(&self, other: &str) -> CanonicalPath {
        let other = other.replace('\\', "/");
        if other.starts_with('/') || drive_prefix(&other).is_some() {
            return Self(normalize(&other));
        }
        Self(normalize(&format!("{}/{other}", self.0)))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Segment-wise prefix check, so `/a/bc` does not start with `/a/b`.
    pub fn starts_with(&self, prefix: &CanonicalPath) -> bool {
        if prefix.is_root() {
            return self.root() == *prefix;
        }
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
    }

    pub fn has_segment(&self, segment: &str) -> bool {
        self.segments().any(|s| s == segment)
    }

    /// Path of `self` relative to `base`, when `self` lives under `base`.
    pub fn strip_prefix(&self, base: &CanonicalPath) -> Option<&str> {
        if !self.starts_with(base) {
            return None;
        }
        Some(self.0[base.0.len()..].trim_start_matches('/'))
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalPath {
    fn from(value: &str) -> Self {
        Self::from_unix(value)
    }
}

impl From<&Path> for CanonicalPath {
    fn from(value: &Path) -> Self {
        Self::new(value)
    }
}

impl From<PathBuf> for CanonicalPath {
    fn from(value: PathBuf) -> Self {
        Self::new(value)
    }
}

fn drive_prefix(path: &str) -> Option<&str> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if bytes.len() == 2 || bytes[2] == b'/' {
            return Some(&path[..2]);
        }
    }
    None
}

fn normalize(path: &str) -> String {
    let (prefix, rest) = match drive_prefix(path) {
        Some(drive) => (format!("{}/", drive.to_ascii_uppercase()), &path[2..]),
        None if path.starts_with('/') => ("/".to_string(), path),
        None => (String::new(), path),
    };
    let absolute = !prefix.is_empty();

    let mut stack: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match stack.last() {
                Some(last) if *last != ".." => {
                    stack.pop();
                }
                _ if absolute => {}
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }

    if absolute {
        format!("{prefix}{}", stack.join("/"))
    } else if stack.is_empty() {
        ".".to_string()
    } else {
        stack.join("/")
    }
}
