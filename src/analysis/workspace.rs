//! Session state shared by the runs of one project
//!
//! A [`Workspace`] owns the configuration index, the program builder, the
//! program cache and the file → configuration memo. Nothing here is global:
//! dropping the workspace tears everything down.
//!
//! The program cache sits behind its own lock so program lookups can be
//! served by [`Workspace::shared_cache`] while a run holds the workspace.

use crate::config::Settings;
use crate::error::{ConfigResult, ProgramError, ProgramResult};
use crate::fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
use crate::paths::CanonicalPath;
use crate::program::{
    CompiledProgram, ProgramBuilder, ProgramCache, ProgramConstructor, ProgramHandle,
    ResolvedOptions,
};
use crate::project::{ConfigFile, ConfigSelector, ConfigStore, ResolutionMemo};
use crate::tsconfig::{PathPattern, TSCONFIG_JSON, is_config_file_name};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Changed,
    Deleted,
}

/// A change observed on the filesystem by whoever watches it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: CanonicalPath,
    pub kind: FsEventKind,
}

impl FsEvent {
    pub fn new(path: impl Into<CanonicalPath>, kind: FsEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A handle together with a strong reference to its program
#[derive(Debug, Clone)]
pub struct ResolvedProgram {
    pub handle: Arc<ProgramHandle>,
    pub program: Arc<dyn CompiledProgram>,
}

/// Configuration a file was last resolved to
#[derive(Debug, Clone)]
struct FileBinding {
    config_path: CanonicalPath,
    is_synthetic: bool,
}

#[derive(Debug)]
pub struct Workspace {
    settings: Arc<Settings>,
    default_fs: Arc<dyn FileSystem>,
    fs: Arc<dyn FileSystem>,
    /// Contents of the active in-memory filesystem, if one is active
    memory: Option<Arc<MemoryFileSystem>>,
    constructor: Arc<dyn ProgramConstructor>,
    selector: ConfigSelector,
    store: ConfigStore,
    builder: ProgramBuilder,
    cache: Arc<Mutex<ProgramCache>>,
    file_configs: ResolutionMemo<CanonicalPath, FileBinding>,
    /// Configurations that failed to build, with the warning they produced
    failed: HashMap<CanonicalPath, String>,
    scanned_root: Option<CanonicalPath>,
    needs_rescan: bool,
}

impl Workspace {
    pub fn new(
        settings: Arc<Settings>,
        fs: Arc<dyn FileSystem>,
        constructor: Arc<dyn ProgramConstructor>,
    ) -> Self {
        let dependency_dirs = settings.analysis.dependency_dirs.clone();
        Self {
            store: ConfigStore::new(Arc::clone(&fs), dependency_dirs.clone()),
            builder: ProgramBuilder::new(Arc::clone(&fs), Arc::clone(&constructor), dependency_dirs),
            cache: Arc::new(Mutex::new(ProgramCache::new(settings.analysis.max_cached_programs))),
            default_fs: Arc::clone(&fs),
            fs,
            memory: None,
            constructor,
            selector: ConfigSelector::new(),
            settings,
            file_configs: ResolutionMemo::new(),
            failed: HashMap::new(),
            scanned_root: None,
            needs_rescan: false,
        }
    }

    /// Workspace over the local disk
    pub fn on_disk(settings: Arc<Settings>, constructor: Arc<dyn ProgramConstructor>) -> Self {
        Self::new(settings, Arc::new(DiskFileSystem::new()), constructor)
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn cache(&self) -> MutexGuard<'_, ProgramCache> {
        self.cache.lock()
    }

    /// The program cache, usable without holding the workspace
    pub fn shared_cache(&self) -> Arc<Mutex<ProgramCache>> {
        Arc::clone(&self.cache)
    }

    /// Switch to another filesystem. Everything cached so far is dropped.
    pub fn use_file_system(&mut self, fs: Arc<dyn FileSystem>) {
        let dependency_dirs = self.settings.analysis.dependency_dirs.clone();
        self.store = ConfigStore::new(Arc::clone(&fs), dependency_dirs.clone());
        self.builder = ProgramBuilder::new(Arc::clone(&fs), Arc::clone(&self.constructor), dependency_dirs);
        self.fs = fs;
        self.memory = None;
        self.reset_programs();
        self.scanned_root = None;
        self.needs_rescan = false;
    }

    /// Serve request-supplied contents. Identical contents keep every cached program.
    pub fn use_memory_file_system(&mut self, memory: MemoryFileSystem) {
        if self.memory.as_deref() == Some(&memory) {
            debug!("In-memory contents unchanged, keeping cached programs");
            return;
        }
        let memory = Arc::new(memory);
        self.use_file_system(Arc::clone(&memory) as Arc<dyn FileSystem>);
        self.memory = Some(memory);
    }

    /// Return to the filesystem the workspace was created with.
    pub fn use_default_file_system(&mut self) {
        if !Arc::ptr_eq(&self.fs, &self.default_fs) {
            self.use_file_system(Arc::clone(&self.default_fs));
        }
    }

    /// Scan `root` unless it is already indexed and nothing was invalidated.
    pub fn ensure_scanned(&mut self, root: &CanonicalPath) -> ConfigResult<()> {
        if !self.needs_rescan && self.scanned_root.as_ref() == Some(root) {
            return Ok(());
        }
        let changed = self.store.scan(root)?;
        if changed {
            if !self.cache.lock().is_empty() {
                info!("Configuration files changed under {root}, dropping cached programs");
            }
            self.reset_programs();
        }
        self.scanned_root = Some(root.clone());
        self.needs_rescan = false;
        Ok(())
    }

    /// Full cache clear; the next run rescans the configuration files.
    pub fn invalidate_configuration_cache(&mut self) {
        info!("Configuration cache invalidated");
        self.store.clear();
        self.reset_programs();
        self.needs_rescan = true;
    }

    fn reset_programs(&mut self) {
        self.cache.lock().clear();
        self.builder.clear();
        self.file_configs.clear();
        self.failed.clear();
    }

    /// React to changes reported by a filesystem watcher.
    pub fn apply_fs_events(&mut self, events: &[FsEvent]) {
        for event in events {
            let is_config = event.path.file_name().is_some_and(is_config_file_name);
            if is_config {
                debug!("Configuration {:?}: {}", event.kind, event.path);
                if event.kind == FsEventKind::Deleted {
                    self.store.remove(&event.path);
                }
                self.reset_programs();
                self.needs_rescan = true;
            } else if event.kind != FsEventKind::Changed
                && event
                    .path
                    .file_name()
                    .is_some_and(|name| self.settings.analysis.is_analyzed_file_name(name))
            {
                // Program file lists are stale once sources come or go
                debug!("Source file {:?}: {}", event.kind, event.path);
                self.cache.lock().clear();
                self.file_configs.clear();
                self.failed.clear();
            }
        }
    }

    /// Turn configured paths and glob patterns into configuration paths.
    ///
    /// Plain entries are resolved against `base_dir`; a directory stands for
    /// its `tsconfig.json`. Patterns are matched against indexed configurations.
    pub fn resolve_overrides(&self, base_dir: &CanonicalPath, entries: &[String]) -> Vec<CanonicalPath> {
        let mut resolved: Vec<CanonicalPath> = Vec::new();
        for entry in entries {
            if entry.contains(['*', '?']) {
                let pattern = match PathPattern::include(base_dir, entry, base_dir) {
                    Ok(pattern) => pattern,
                    Err(e) => {
                        warn!("Ignoring tsconfig pattern '{entry}': {e}");
                        continue;
                    }
                };
                for path in self.store.paths() {
                    if pattern.is_match(&path) && !resolved.contains(&path) {
                        resolved.push(path);
                    }
                }
                continue;
            }

            let path = base_dir.join(entry);
            let path = if self.fs.is_dir(&path) {
                path.join(TSCONFIG_JSON)
            } else {
                path
            };
            if self.fs.is_file(&path) && !resolved.contains(&path) {
                resolved.push(path);
            }
        }

        if !entries.is_empty() && resolved.is_empty() {
            error!("Failed to find any of the provided tsconfig.json files: {}", entries.join(", "));
        }
        resolved
    }

    /// Options for the configuration at `path`, without building a program
    pub fn resolve_options(&mut self, path: &CanonicalPath) -> ConfigResult<Arc<ResolvedOptions>> {
        let config = self.store.load(path)?;
        self.builder.resolve_options(&config)
    }

    /// Build (or reuse) the program of one configuration.
    ///
    /// `contents` replaces what is on disk for this call only. The store keeps
    /// the indexed contents and the program built from them is not cached, so
    /// later lookups of `path` rebuild from disk.
    pub fn open_program(
        &mut self,
        path: &CanonicalPath,
        contents: Option<String>,
    ) -> ProgramResult<ResolvedProgram> {
        let mut cache = self.cache.lock();
        let builder = &self.builder;
        match contents {
            Some(contents) => {
                let config = ConfigFile::new(path.clone(), contents);
                if cache.invalidate(path) {
                    self.file_configs.clear();
                }
                let handle = cache.get_or_build(path, false, || builder.build(&config));
                cache.invalidate(path);
                strong(handle?)
            }
            None => {
                let config = self.store.load(path)?;
                strong(cache.get_or_build(path, false, || builder.build(&config))?)
            }
        }
    }

    /// The program that governs `file`.
    ///
    /// Candidates come from the selector; the first whose program actually
    /// contains the file wins. Candidates that fail to build add a warning to
    /// `warnings` and are skipped. The synthetic fallback always comes last.
    pub fn program_for_file(
        &mut self,
        file: &CanonicalPath,
        overrides: &[CanonicalPath],
        warnings: &mut Vec<String>,
    ) -> ProgramResult<ResolvedProgram> {
        if let Some(resolved) = self.remembered_program(file) {
            return Ok(resolved);
        }

        let candidates = self.selector.candidates_for(&mut self.store, file, overrides);
        for config in candidates {
            if let Some(message) = self.failed.get(&config.path) {
                warnings.push(message.clone());
                continue;
            }

            let builder = &self.builder;
            let built = self
                .cache
                .lock()
                .get_or_build(&config.path, config.is_synthetic, || builder.build(&config));
            match built {
                Ok(handle) if handle.contains(file) => {
                    self.file_configs.insert(
                        file.clone(),
                        FileBinding {
                            config_path: config.path.clone(),
                            is_synthetic: config.is_synthetic,
                        },
                    );
                    debug!("{file} is governed by {}", config.path);
                    return strong(handle);
                }
                Ok(_) => {}
                Err(e) => {
                    let message = format!("Failed to create program from {}: {e}", config.path);
                    warn!("{message}");
                    warnings.push(message.clone());
                    self.failed.insert(config.path.clone(), message);
                }
            }
        }

        Err(ProgramError::NoProgramForFile { path: file.clone() })
    }

    /// Fast path through the file → configuration memo
    fn remembered_program(&mut self, file: &CanonicalPath) -> Option<ResolvedProgram> {
        let binding = self.file_configs.get(file)?;
        let config = if binding.is_synthetic {
            Arc::new(ConfigFile::synthetic_for(file))
        } else {
            self.store.get(&binding.config_path)?
        };
        let builder = &self.builder;
        let handle = self
            .cache
            .lock()
            .get_or_build(&binding.config_path, binding.is_synthetic, || builder.build(&config))
            .ok()
            .filter(|handle| handle.contains(file));
        match handle {
            Some(handle) => strong(handle).ok(),
            None => {
                self.file_configs.remove(file);
                None
            }
        }
    }
}

fn strong(handle: Arc<ProgramHandle>) -> ProgramResult<ResolvedProgram> {
    match handle.program() {
        Some(program) => Ok(ResolvedProgram { handle, program }),
        None => Err(ProgramError::NotFound {
            id: handle.id.clone(),
        }),
    }
}
