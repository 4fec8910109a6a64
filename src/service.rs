//! Operations exposed to a transport layer
//!
//! [`AnalysisService`] wraps one [`Workspace`] and one orchestrator behind
//! locks so a server can share it across request handlers. Runs are
//! serialized, and operations that change the workspace (program creation,
//! file listing, invalidation, watcher events) wait for a running analysis.
//! Program lookup, deletion and cancellation only take the program cache
//! lock and never wait for a run.

use crate::analysis::{
    AnalysisRequest, FinalResult, FsEvent, IncrementalResult, ProjectAnalysisOrchestrator,
    ResolvedProgram, ResultSink, RuleEngine, Workspace,
};
use crate::config::Settings;
use crate::error::{AnalysisResult, ProgramError, ProgramResult};
use crate::fs::{DiskFileSystem, FileSystem};
use crate::paths::CanonicalPath;
use crate::program::{
    CompiledProgram, ImportGraphConstructor, ProgramCache, ProgramConstructor, ProgramId,
};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramSummary {
    pub program_id: ProgramId,
    pub files: Vec<CanonicalPath>,
    pub project_references: Vec<CanonicalPath>,
    pub missing_config: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredFiles {
    pub files: Vec<CanonicalPath>,
    pub project_references: Vec<CanonicalPath>,
}

#[derive(Debug)]
pub struct AnalysisService {
    workspace: Mutex<Workspace>,
    /// The workspace's program cache, shared so lookups bypass the workspace lock
    cache: Arc<Mutex<ProgramCache>>,
    orchestrator: ProjectAnalysisOrchestrator,
    /// Programs created explicitly, alive until deleted
    created: Mutex<HashMap<ProgramId, ResolvedProgram>>,
}

impl AnalysisService {
    pub fn new(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        constructor: Arc<dyn ProgramConstructor>,
        engine: Arc<dyn RuleEngine>,
    ) -> Self {
        let workspace = Workspace::new(Arc::new(settings), fs, constructor);
        Self {
            cache: workspace.shared_cache(),
            workspace: Mutex::new(workspace),
            orchestrator: ProjectAnalysisOrchestrator::new(engine),
            created: Mutex::new(HashMap::new()),
        }
    }

    /// Disk-backed service with the built-in import graph constructor
    pub fn with_defaults(settings: Settings, engine: Arc<dyn RuleEngine>) -> Self {
        Self::new(
            settings,
            Arc::new(DiskFileSystem::new()),
            Arc::new(ImportGraphConstructor::new()),
            engine,
        )
    }

    pub fn create_program(
        &self,
        config_path: &CanonicalPath,
        contents: Option<String>,
    ) -> ProgramResult<ProgramSummary> {
        let resolved = self.workspace.lock().open_program(config_path, contents)?;
        let handle = Arc::clone(&resolved.handle);
        self.created.lock().insert(handle.id.clone(), resolved);
        debug!("Created program {} for {config_path}", handle.id);

        Ok(ProgramSummary {
            program_id: handle.id.clone(),
            files: handle.files.clone(),
            project_references: handle.project_references.clone(),
            missing_config: handle.missing_config,
        })
    }

    pub fn get_program_by_id(&self, id: &ProgramId) -> ProgramResult<Arc<dyn CompiledProgram>> {
        if let Some(resolved) = self.created.lock().get(id) {
            return Ok(Arc::clone(&resolved.program));
        }
        let handle = self.cache.lock().get_by_id(id)?;
        handle
            .program()
            .ok_or_else(|| ProgramError::NotFound { id: id.clone() })
    }

    /// Forget a program. Unknown ids are ignored.
    pub fn delete_program(&self, id: &ProgramId) {
        let removed = self.created.lock().remove(id).is_some();
        let evicted = self.cache.lock().remove_by_id(id);
        if removed || evicted {
            debug!("Deleted program {id}");
        }
    }

    /// Root files and references of a configuration; empty when it cannot be parsed.
    pub fn list_configured_files(&self, config_path: &CanonicalPath) -> ConfiguredFiles {
        match self.workspace.lock().resolve_options(config_path) {
            Ok(options) => ConfiguredFiles {
                files: options.root_names.clone(),
                project_references: options.project_references.clone(),
            },
            Err(e) => {
                warn!("Cannot list files of {config_path}: {e}");
                ConfiguredFiles::default()
            }
        }
    }

    pub fn analyze_project(
        &self,
        request: AnalysisRequest,
        sink: Option<&mut dyn ResultSink>,
    ) -> AnalysisResult<FinalResult> {
        let mut workspace = self.workspace.lock();
        self.orchestrator.analyze(&mut workspace, request, sink)
    }

    /// Run the analysis on a worker thread and stream its messages.
    ///
    /// The channel is bounded, so a slow consumer slows the run down.
    /// Dropping the receiver cancels the run.
    pub fn analyze_project_stream(self: &Arc<Self>, request: AnalysisRequest) -> Receiver<IncrementalResult> {
        let capacity = self.workspace.lock().settings().analysis.stream_capacity.max(1);
        let (mut sender, receiver) = crossbeam_channel::bounded(capacity);
        let service = Arc::clone(self);
        thread::spawn(move || {
            if let Err(e) = service.analyze_project(request, Some(&mut sender)) {
                debug!("Streamed analysis ended with an error: {e}");
            }
        });
        receiver
    }

    pub fn cancel_analysis(&self) {
        self.orchestrator.cancel();
    }

    /// Drop every configuration and program, including explicitly created ones.
    pub fn invalidate_configuration_cache(&self) {
        self.workspace.lock().invalidate_configuration_cache();
        self.created.lock().clear();
    }

    pub fn apply_fs_events(&self, events: &[FsEvent]) {
        self.workspace.lock().apply_fs_events(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::NoopRuleEngine;
    use crate::fs::MemoryFileSystem;

    fn service(fs: MemoryFileSystem) -> AnalysisService {
        AnalysisService::new(
            Settings::default(),
            Arc::new(fs),
            Arc::new(ImportGraphConstructor::new()),
            Arc::new(NoopRuleEngine),
        )
    }

    #[test]
    fn created_programs_survive_cache_pressure() {
        let mut fs = MemoryFileSystem::new();
        for index in 0..8 {
            fs.insert(format!("/p{index}/tsconfig.json").as_str(), "{}");
            fs.insert(format!("/p{index}/main.ts").as_str(), "");
        }
        let service = service(fs);

        let first = service.create_program(&"/p0/tsconfig.json".into(), None).unwrap();
        for index in 1..8 {
            let path = CanonicalPath::from(format!("/p{index}/tsconfig.json").as_str());
            service.create_program(&path, None).unwrap();
        }

        let program = service.get_program_by_id(&first.program_id).unwrap();
        assert_eq!(program.source_files(), vec![CanonicalPath::from("/p0/main.ts")]);
    }

    #[test]
    fn deleted_programs_are_not_found() {
        let service = service(
            MemoryFileSystem::new()
                .with_file("/p/tsconfig.json", "{}")
                .with_file("/p/a.ts", ""),
        );
        let summary = service.create_program(&"/p/tsconfig.json".into(), None).unwrap();
        service.delete_program(&summary.program_id);

        let error = service.get_program_by_id(&summary.program_id).unwrap_err();
        assert_eq!(error.to_string(), format!("Failed to find program {}", summary.program_id));
    }

    #[test]
    fn invalidation_forgets_created_programs() {
        let service = service(
            MemoryFileSystem::new()
                .with_file("/p/tsconfig.json", "{}")
                .with_file("/p/a.ts", ""),
        );
        let summary = service.create_program(&"/p/tsconfig.json".into(), None).unwrap();
        assert!(service.get_program_by_id(&summary.program_id).is_ok());

        service.invalidate_configuration_cache();

        let error = service.get_program_by_id(&summary.program_id).unwrap_err();
        assert!(matches!(error, ProgramError::NotFound { .. }));
    }
}
