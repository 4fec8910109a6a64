//! Program cache with bounded strong retention
//!
//! Handles are keyed by configuration path. Only the `capacity` most recently
//! used programs are owned by the cache; every other handle merely observes its
//! program through a `Weak` and is rebuilt on demand once the program is gone.
//! Dead observers are swept lazily on the next `get_or_build`.

use super::builder::BuiltProgram;
use super::{CompiledProgram, ProgramId};
use crate::error::{ProgramError, ProgramResult};
use crate::paths::CanonicalPath;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Cheap, cacheable view of a compiled program and its metadata.
#[derive(Debug)]
pub struct ProgramHandle {
    pub id: ProgramId,
    pub config_path: CanonicalPath,
    pub files: Vec<CanonicalPath>,
    pub project_references: Vec<CanonicalPath>,
    pub missing_config: bool,
    pub is_fallback: bool,
    pub warnings: Vec<String>,
    program: Weak<dyn CompiledProgram>,
    file_set: HashSet<CanonicalPath>,
}

impl ProgramHandle {
    fn new(id: ProgramId, config_path: CanonicalPath, is_fallback: bool, built: &BuiltProgram) -> Self {
        Self {
            id,
            config_path,
            file_set: built.files.iter().cloned().collect(),
            files: built.files.clone(),
            project_references: built.project_references.clone(),
            missing_config: built.missing_config,
            is_fallback,
            warnings: built.warnings.clone(),
            program: Arc::downgrade(&built.program),
        }
    }

    /// The program, unless it has been reclaimed.
    pub fn program(&self) -> Option<Arc<dyn CompiledProgram>> {
        self.program.upgrade()
    }

    pub fn is_live(&self) -> bool {
        self.program.strong_count() > 0
    }

    pub fn contains(&self, file: &CanonicalPath) -> bool {
        self.file_set.contains(file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub live: usize,
    pub retained: usize,
    pub capacity: usize,
}

#[derive(Debug)]
pub struct ProgramCache {
    capacity: usize,
    handles: HashMap<CanonicalPath, Arc<ProgramHandle>>,
    ids: HashMap<ProgramId, CanonicalPath>,
    /// Owning references, most recently used at the back
    recent: VecDeque<(CanonicalPath, Arc<dyn CompiledProgram>)>,
    next_id: u64,
}

impl ProgramCache {
    /// A capacity of zero is raised to one so a fresh build survives its own lookup.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            handles: HashMap::new(),
            ids: HashMap::new(),
            recent: VecDeque::new(),
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the live handle for `config_path`, building it if needed.
    ///
    /// A handle whose program was reclaimed is rebuilt under the same id.
    pub fn get_or_build<F>(
        &mut self,
        config_path: &CanonicalPath,
        is_fallback: bool,
        build: F,
    ) -> ProgramResult<Arc<ProgramHandle>>
    where
        F: FnOnce() -> ProgramResult<BuiltProgram>,
    {
        self.sweep(Some(config_path));

        let previous_id = match self.handles.get(config_path) {
            Some(handle) => match handle.program() {
                Some(program) => {
                    let handle = Arc::clone(handle);
                    self.promote(config_path, program);
                    return Ok(handle);
                }
                None => {
                    debug!("Program for {config_path} was reclaimed, rebuilding");
                    Some(handle.id.clone())
                }
            },
            None => None,
        };

        let built = build()?;
        let id = previous_id.unwrap_or_else(|| self.allocate_id());
        let handle = Arc::new(ProgramHandle::new(
            id.clone(),
            config_path.clone(),
            is_fallback,
            &built,
        ));
        self.handles.insert(config_path.clone(), Arc::clone(&handle));
        self.ids.insert(id, config_path.clone());
        self.promote(config_path, built.program);
        Ok(handle)
    }

    pub fn get(&self, config_path: &CanonicalPath) -> Option<Arc<ProgramHandle>> {
        self.handles.get(config_path).cloned()
    }

    pub fn get_by_id(&self, id: &ProgramId) -> ProgramResult<Arc<ProgramHandle>> {
        self.ids
            .get(id)
            .and_then(|path| self.handles.get(path))
            .cloned()
            .ok_or_else(|| ProgramError::NotFound { id: id.clone() })
    }

    /// Drop the entry for `config_path`; the next access rebuilds.
    pub fn invalidate(&mut self, config_path: &CanonicalPath) -> bool {
        let Some(handle) = self.handles.remove(config_path) else {
            return false;
        };
        self.ids.remove(&handle.id);
        self.recent.retain(|(path, _)| path != config_path);
        debug!("Invalidated program {} for {config_path}", handle.id);
        true
    }

    pub fn remove_by_id(&mut self, id: &ProgramId) -> bool {
        match self.ids.get(id).cloned() {
            Some(path) => self.invalidate(&path),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.handles.clear();
        self.ids.clear();
        self.recent.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Configuration paths currently owned, least recently used first
    pub fn retained(&self) -> Vec<CanonicalPath> {
        self.recent.iter().map(|(path, _)| path.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.handles.len(),
            live: self.handles.values().filter(|h| h.is_live()).count(),
            retained: self.recent.len(),
            capacity: self.capacity,
        }
    }

    fn allocate_id(&mut self) -> ProgramId {
        let id = ProgramId::from(format!("program-{}", self.next_id));
        self.next_id += 1;
        id
    }

    fn promote(&mut self, config_path: &CanonicalPath, program: Arc<dyn CompiledProgram>) {
        if let Some(position) = self.recent.iter().position(|(path, _)| path == config_path) {
            self.recent.remove(position);
        }
        self.recent.push_back((config_path.clone(), program));
        while self.recent.len() > self.capacity {
            if let Some((evicted, _)) = self.recent.pop_front() {
                debug!("Releasing ownership of program for {evicted}");
            }
        }
    }

    /// Remove observers whose program is gone, except the one for `keep`.
    fn sweep(&mut self, keep: Option<&CanonicalPath>) {
        let dead: Vec<CanonicalPath> = self
            .handles
            .iter()
            .filter(|(path, handle)| Some(*path) != keep && !handle.is_live())
            .map(|(path, _)| path.clone())
            .collect();
        for path in dead {
            if let Some(handle) = self.handles.remove(&path) {
                self.ids.remove(&handle.id);
            }
        }
    }
}
