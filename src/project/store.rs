//! Index of the configuration files discovered under a project root

use super::ConfigFile;
use crate::error::{ConfigError, ConfigResult};
use crate::fs::FileSystem;
use crate::paths::CanonicalPath;
use crate::tsconfig::is_config_file_name;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// How an entry entered the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Scanned,
    Loaded,
}

#[derive(Debug)]
struct Entry {
    config: Arc<ConfigFile>,
    origin: Origin,
}

/// Configuration files keyed by canonical path, iterated in discovery order.
#[derive(Debug)]
pub struct ConfigStore {
    fs: Arc<dyn FileSystem>,
    skip_dirs: Vec<String>,
    entries: HashMap<CanonicalPath, Entry>,
    order: Vec<CanonicalPath>,
}

impl ConfigStore {
    pub fn new(fs: Arc<dyn FileSystem>, skip_dirs: Vec<String>) -> Self {
        Self {
            fs,
            skip_dirs,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Walk `root` and upsert every configuration file found.
    ///
    /// Returns whether the index changed: an entry was added, its content
    /// changed, or a previously scanned entry under `root` disappeared.
    pub fn scan(&mut self, root: &CanonicalPath) -> ConfigResult<bool> {
        let files = self
            .fs
            .walk_files(root, &self.skip_dirs)
            .map_err(|source| ConfigError::Discovery {
                root: root.clone(),
                source,
            })?;

        let mut changed = false;
        let mut found = HashSet::new();
        for path in files {
            if !path.file_name().is_some_and(is_config_file_name) {
                continue;
            }
            let contents = match self.fs.read_file(&path) {
                Ok(contents) => contents,
                Err(e) => {
                    debug!("Skipping unreadable configuration {path}: {e}");
                    continue;
                }
            };
            found.insert(path.clone());
            changed |= self.upsert_with_origin(ConfigFile::new(path, contents), Origin::Scanned);
        }

        let vanished: Vec<CanonicalPath> = self
            .entries
            .iter()
            .filter(|(path, entry)| {
                entry.origin == Origin::Scanned && path.starts_with(root) && !found.contains(*path)
            })
            .map(|(path, _)| path.clone())
            .collect();
        for path in vanished {
            self.remove(&path);
            changed = true;
        }

        info!("Indexed {} configuration file(s) under {root}", found.len());
        Ok(changed)
    }

    pub fn get(&self, path: &CanonicalPath) -> Option<Arc<ConfigFile>> {
        self.entries.get(path).map(|entry| Arc::clone(&entry.config))
    }

    /// Return the entry for `path`, reading and caching it on first use.
    pub fn load(&mut self, path: &CanonicalPath) -> ConfigResult<Arc<ConfigFile>> {
        if let Some(config) = self.get(path) {
            return Ok(config);
        }
        let contents = self
            .fs
            .read_file(path)
            .map_err(|e| ConfigError::read(path.clone(), e))?;
        self.upsert_with_origin(ConfigFile::new(path.clone(), contents), Origin::Loaded);
        self.get(path)
            .ok_or_else(|| ConfigError::parse(path, "configuration vanished after loading"))
    }

    /// Insert or replace an entry; returns whether anything changed.
    pub fn upsert(&mut self, config: ConfigFile) -> bool {
        self.upsert_with_origin(config, Origin::Loaded)
    }

    fn upsert_with_origin(&mut self, config: ConfigFile, origin: Origin) -> bool {
        if config.is_synthetic {
            return false;
        }
        match self.entries.get_mut(&config.path) {
            Some(existing) if existing.config.content_hash == config.content_hash => {
                if origin == Origin::Scanned {
                    existing.origin = Origin::Scanned;
                }
                false
            }
            Some(existing) => {
                debug!("Configuration changed: {}", config.path);
                existing.config = Arc::new(config);
                existing.origin = origin;
                true
            }
            None => {
                debug!("Configuration discovered: {}", config.path);
                self.order.push(config.path.clone());
                self.entries.insert(
                    config.path.clone(),
                    Entry {
                        config: Arc::new(config),
                        origin,
                    },
                );
                true
            }
        }
    }

    pub fn remove(&mut self, path: &CanonicalPath) -> Option<Arc<ConfigFile>> {
        let entry = self.entries.remove(path)?;
        self.order.retain(|p| p != path);
        Some(entry.config)
    }

    /// Entries in discovery order
    pub fn iter(&self) -> impl Iterator<Item = Arc<ConfigFile>> + '_ {
        self.order
            .iter()
            .filter_map(|path| self.entries.get(path))
            .map(|entry| Arc::clone(&entry.config))
    }

    pub fn paths(&self) -> Vec<CanonicalPath> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
