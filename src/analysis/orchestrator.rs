//! Whole-project analysis runs
//!
//! One run walks its files strictly in sorted order. Before each file the
//! run's cancellation token is polled; a file already being checked always
//! finishes. Results are pushed to the caller's [`ResultSink`] as they are
//! produced, and a sink that reports its consumer gone cancels the run.
//!
//! ```text
//! Idle -> Running -> Completed
//!                 -> Cancelled
//! ```

use super::files::{discover_source_files, select_source_files};
use super::workspace::{ResolvedProgram, Workspace};
use super::{
    AnalysisRequest, FileResult, FileType, FinalResult, IncrementalResult, InputFile, ResultSink,
    RuleConfig, RuleEngine, RunState, SourceFile,
};
use crate::error::{AnalysisError, AnalysisResult, ConfigError};
use crate::fs::MemoryFileSystem;
use crate::paths::CanonicalPath;
use crate::program::CompiledProgram;
use crate::tsconfig::MISSING_EXTENDED_TSCONFIG;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct ProjectAnalysisOrchestrator {
    engine: Arc<dyn RuleEngine>,
    state: Mutex<RunState>,
    /// Token of the run in progress, if any
    signal: Mutex<Option<CancellationToken>>,
}

/// Warnings in first-seen order, without duplicates
#[derive(Debug, Default)]
struct WarningSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl WarningSet {
    fn add(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if self.seen.insert(warning.clone()) {
            self.ordered.push(warning);
        }
    }

    fn extend(&mut self, warnings: impl IntoIterator<Item = String>) {
        for warning in warnings {
            self.add(warning);
        }
    }
}

/// Per-run bookkeeping
struct Run<'a> {
    token: CancellationToken,
    sink: Option<&'a mut dyn ResultSink>,
    warnings: WarningSet,
    /// Programs used so far, kept alive until the run ends
    pinned: HashMap<CanonicalPath, Arc<dyn CompiledProgram>>,
    missing_config: bool,
}

impl Run<'_> {
    /// Forward to the sink; a consumer that went away cancels the run
    fn emit(&mut self, result: IncrementalResult) {
        if let Some(sink) = self.sink.as_mut() {
            if !sink.emit(result) && !self.token.is_cancelled() {
                debug!("Result consumer went away, cancelling analysis");
                self.token.cancel();
            }
        }
    }
}

impl ProjectAnalysisOrchestrator {
    pub fn new(engine: Arc<dyn RuleEngine>) -> Self {
        Self {
            engine,
            state: Mutex::new(RunState::Idle),
            signal: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Cancel the run in progress. Idempotent; a no-op when nothing runs.
    pub fn cancel(&self) {
        if let Some(token) = self.signal.lock().as_ref() {
            if !token.is_cancelled() {
                info!("Analysis cancellation requested");
            }
            token.cancel();
        }
    }

    /// Analyze every file of `request` against `workspace`.
    ///
    /// Per-file failures end up in that file's result. Only an invalid
    /// request, a failed configuration scan or a failed file enumeration
    /// abort the run; those also emit an `Error` message.
    pub fn analyze(
        &self,
        workspace: &mut Workspace,
        request: AnalysisRequest,
        sink: Option<&mut dyn ResultSink>,
    ) -> AnalysisResult<FinalResult> {
        let token = {
            let mut state = self.state.lock();
            if *state == RunState::Running {
                return Err(AnalysisError::AlreadyRunning);
            }
            *state = RunState::Running;
            let token = CancellationToken::new();
            *self.signal.lock() = Some(token.clone());
            token
        };

        let mut run = Run {
            token,
            sink,
            warnings: WarningSet::default(),
            pinned: HashMap::new(),
            missing_config: false,
        };
        let outcome = self.run(workspace, request, &mut run);

        *self.signal.lock() = None;
        *self.state.lock() = match &outcome {
            Ok(result) if result.cancelled => RunState::Cancelled,
            _ => RunState::Completed,
        };
        outcome
    }

    fn run(
        &self,
        workspace: &mut Workspace,
        request: AnalysisRequest,
        run: &mut Run<'_>,
    ) -> AnalysisResult<FinalResult> {
        let base_dir = request.base_dir.clone();
        let inputs: HashMap<CanonicalPath, InputFile> = request
            .files
            .iter()
            .flatten()
            .map(|file| (file.path.clone(), file.clone()))
            .collect();

        if let Err(e) = prepare(workspace, &request, &base_dir) {
            error!("Analysis aborted: {e}");
            run.emit(IncrementalResult::Error {
                message: e.to_string(),
            });
            return Err(e);
        }

        let settings = Arc::clone(workspace.settings());
        let files = match &request.files {
            Some(files) => select_source_files(files.iter().map(|f| f.path.clone()), &settings.analysis),
            None => match discover_source_files(workspace.file_system().as_ref(), &base_dir, &settings.analysis) {
                Ok(files) => files,
                Err(source) => {
                    let e = AnalysisError::Enumeration { base_dir, source };
                    error!("Analysis aborted: {e}");
                    run.emit(IncrementalResult::Error {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
            },
        };

        let limit = settings.analysis.max_files_for_type_checking;
        let type_checking = files.len() <= limit;
        if !type_checking {
            let message = format!(
                "Type checking is disabled: the project has {} files, more than the limit of {limit}",
                files.len()
            );
            warn!("{message}");
            run.warnings.add(message);
        }

        let overrides_source = if request.options.tsconfig_paths.is_empty() {
            &settings.analysis.tsconfig_paths
        } else {
            &request.options.tsconfig_paths
        };
        let overrides = workspace.resolve_overrides(&base_dir, overrides_source);

        info!("Analyzing {} file(s) under {base_dir}", files.len());
        let mut results = Vec::with_capacity(files.len());
        for path in files {
            if run.token.is_cancelled() {
                info!("Analysis cancelled after {} file(s)", results.len());
                run.emit(IncrementalResult::Cancelled);
                return Ok(FinalResult {
                    files: results,
                    warnings: std::mem::take(&mut run.warnings.ordered),
                    cancelled: true,
                });
            }

            let input = inputs.get(&path);
            let result = self.analyze_file(workspace, &path, input, &request.rules, &overrides, type_checking, run);
            run.emit(IncrementalResult::FileResult(result.clone()));
            results.push(result);
        }

        if run.missing_config {
            run.warnings.add(MISSING_EXTENDED_TSCONFIG);
        }
        let warnings = std::mem::take(&mut run.warnings.ordered);
        run.emit(IncrementalResult::Meta {
            warnings: warnings.clone(),
        });
        info!("Analysis completed: {} file(s), {} warning(s)", results.len(), warnings.len());

        Ok(FinalResult {
            files: results,
            warnings,
            cancelled: false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn analyze_file(
        &self,
        workspace: &mut Workspace,
        path: &CanonicalPath,
        input: Option<&InputFile>,
        rules: &[RuleConfig],
        overrides: &[CanonicalPath],
        type_checking: bool,
        run: &mut Run<'_>,
    ) -> FileResult {
        let file_type = input.map(|i| i.file_type).unwrap_or(FileType::Main);
        let content = match input.and_then(|i| i.content.clone()) {
            Some(content) => content,
            None => match workspace.file_system().read_file(path) {
                Ok(content) => content,
                Err(e) => return FileResult::failed(path.clone(), format!("Failed to read {path}: {e}")),
            },
        };

        let program = if type_checking {
            let mut warnings = Vec::new();
            let resolved = workspace.program_for_file(path, overrides, &mut warnings);
            run.warnings.extend(warnings);
            match resolved {
                Ok(resolved) => Some(self.pin(run, resolved)),
                Err(e) => return FileResult::failed(path.clone(), e.to_string()),
            }
        } else {
            None
        };

        let active: Vec<RuleConfig> = rules
            .iter()
            .filter(|rule| rule.applies_to(file_type))
            .cloned()
            .collect();
        let source = SourceFile {
            path: path.clone(),
            content,
            file_type,
        };

        let compiled = program.as_ref().map(|p| p.program.as_ref());
        match self.engine.check(&source, compiled, &active) {
            Ok(check) => FileResult {
                path: path.clone(),
                issues: check.issues,
                warnings: check.warnings,
                error: None,
                program_id: program.as_ref().map(|p| p.handle.id.clone()),
                config_path: program.as_ref().map(|p| p.handle.config_path.clone()),
            },
            Err(e) => {
                warn!("Rule engine failed on {path}: {e}");
                FileResult::failed(path.clone(), e.to_string())
            }
        }
    }

    fn pin(&self, run: &mut Run<'_>, resolved: ResolvedProgram) -> ResolvedProgram {
        let handle = &resolved.handle;
        if !run.pinned.contains_key(&handle.config_path) {
            run.warnings.extend(handle.warnings.iter().cloned());
            run.missing_config |= handle.missing_config;
            run.pinned
                .insert(handle.config_path.clone(), Arc::clone(&resolved.program));
        }
        resolved
    }
}

/// Pick the filesystem for the request and index its configurations.
fn prepare(workspace: &mut Workspace, request: &AnalysisRequest, base_dir: &CanonicalPath) -> AnalysisResult<()> {
    if request.options.no_fs {
        let files = request.files.as_ref().ok_or_else(|| AnalysisError::InvalidRequest {
            reason: "a file list is required when the filesystem is disabled".to_string(),
        })?;
        let mut memory = MemoryFileSystem::new();
        for file in files {
            let content = file.content.clone().ok_or_else(|| AnalysisError::InvalidRequest {
                reason: format!("missing content for {}", file.path),
            })?;
            memory.insert(file.path.clone(), content);
        }
        workspace.use_memory_file_system(memory);
    } else {
        workspace.use_default_file_system();
    }
    workspace.ensure_scanned(base_dir).map_err(|e| match e {
        ConfigError::Discovery { root, source } => AnalysisError::Enumeration {
            base_dir: root,
            source,
        },
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::NoopRuleEngine;
    use crate::config::Settings;
    use crate::program::ImportGraphConstructor;

    fn workspace(fs: MemoryFileSystem) -> Workspace {
        Workspace::new(
            Arc::new(Settings::default()),
            Arc::new(fs),
            Arc::new(ImportGraphConstructor::new()),
        )
    }

    #[test]
    fn completed_run_ends_with_meta() {
        let mut ws = workspace(
            MemoryFileSystem::new()
                .with_file("/p/tsconfig.json", "{}")
                .with_file("/p/a.ts", "")
                .with_file("/p/b.ts", ""),
        );
        let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(NoopRuleEngine));
        let mut messages: Vec<IncrementalResult> = Vec::new();

        let result = orchestrator
            .analyze(&mut ws, AnalysisRequest::new("/p"), Some(&mut messages))
            .unwrap();

        assert!(!result.cancelled);
        assert_eq!(result.files.len(), 2);
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages.last(), Some(IncrementalResult::Meta { .. })));
        assert_eq!(orchestrator.state(), RunState::Completed);
        assert_eq!(ws.cache().len(), 1);
    }

    #[test]
    fn cancel_without_a_run_is_a_no_op() {
        let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(NoopRuleEngine));
        orchestrator.cancel();
        orchestrator.cancel();
        assert_eq!(orchestrator.state(), RunState::Idle);
    }

    #[test]
    fn no_fs_requires_contents() {
        let mut ws = workspace(MemoryFileSystem::new());
        let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(NoopRuleEngine));
        let mut request = AnalysisRequest::new("/p");
        request.options.no_fs = true;
        request.files = Some(vec![InputFile::new("/p/a.ts")]);

        let error = orchestrator.analyze(&mut ws, request, None).unwrap_err();
        assert_eq!(error.status_code(), "ANALYSIS_INVALID_REQUEST");
        assert_eq!(orchestrator.state(), RunState::Completed);
    }

    #[test]
    fn oversized_projects_skip_type_checking() {
        let mut settings = Settings::default();
        settings.analysis.max_files_for_type_checking = 1;
        let mut ws = Workspace::new(
            Arc::new(settings),
            Arc::new(
                MemoryFileSystem::new()
                    .with_file("/p/a.ts", "")
                    .with_file("/p/b.ts", ""),
            ),
            Arc::new(ImportGraphConstructor::new()),
        );
        let orchestrator = ProjectAnalysisOrchestrator::new(Arc::new(NoopRuleEngine));

        let result = orchestrator.analyze(&mut ws, AnalysisRequest::new("/p"), None).unwrap();
        assert!(result.files.iter().all(|f| f.program_id.is_none() && f.error.is_none()));
        assert_eq!(result.warnings.len(), 1);
        assert!(ws.cache().is_empty());
    }
}
