//! Project configuration discovery and selection
//!
//! Answers "which tsconfig governs this file?":
//! - [`store::ConfigStore`] indexes the configuration files found under a root
//! - [`selector::ConfigSelector`] orders them for one target file and always
//!   ends with a synthetic single-file configuration

pub mod memo;
pub mod selector;
pub mod sha;
pub mod store;

pub use memo::ResolutionMemo;
pub use selector::{Candidates, ConfigSelector};
pub use store::ConfigStore;

use crate::paths::CanonicalPath;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(pub String);

impl Sha256Hash {
    /// First `len` hex characters, for display and file naming.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

/// Compiler options given to every synthetic configuration.
const SYNTHETIC_COMPILER_OPTIONS: [(&str, bool); 2] = [("allowJs", true), ("noImplicitAny", true)];

/// One configuration file, discovered on disk or synthesized for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: CanonicalPath,
    pub contents: String,
    pub is_synthetic: bool,
    pub content_hash: Sha256Hash,
}

impl ConfigFile {
    pub fn new(path: CanonicalPath, contents: impl Into<String>) -> Self {
        let contents = contents.into();
        let content_hash = sha::compute_sha256(&contents);
        Self {
            path,
            contents,
            is_synthetic: false,
            content_hash,
        }
    }

    /// A configuration restricted to exactly `file`.
    ///
    /// Named `tsconfig-<hash>.json` next to the file; the hash is derived from
    /// the file path so the same file always maps to the same synthetic path.
    pub fn synthetic_for(file: &CanonicalPath) -> Self {
        let name_hash = sha::compute_sha256(file.as_str());
        let dir = file.parent().unwrap_or_else(|| file.root());
        let path = dir.join(&format!("tsconfig-{}.json", name_hash.short(16)));

        let compiler_options: serde_json::Map<String, serde_json::Value> = SYNTHETIC_COMPILER_OPTIONS
            .iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::Bool(*value)))
            .collect();
        let contents = serde_json::json!({
            "compilerOptions": compiler_options,
            "files": [file.as_str()],
        })
        .to_string();

        Self {
            is_synthetic: true,
            ..Self::new(path, contents)
        }
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or_default()
    }

    pub fn directory(&self) -> CanonicalPath {
        self.path.parent().unwrap_or_else(|| self.path.root())
    }
}
