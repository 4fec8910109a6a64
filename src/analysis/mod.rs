//! Whole-project analysis runs
//!
//! Request and result types shared by the [`orchestrator`], the session state
//! in [`workspace`] and the rule-engine seam in [`engine`].

pub mod engine;
pub mod files;
pub mod orchestrator;
pub mod workspace;

pub use engine::{NoopRuleEngine, RuleEngine};
pub use orchestrator::ProjectAnalysisOrchestrator;
pub use workspace::{FsEvent, FsEventKind, ResolvedProgram, Workspace};

use crate::paths::CanonicalPath;
use crate::program::ProgramId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    #[default]
    Main,
    Test,
}

/// One file named by the caller, optionally with its content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    pub path: CanonicalPath,
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl InputFile {
    pub fn new(path: impl Into<CanonicalPath>) -> Self {
        Self {
            path: path.into(),
            file_type: FileType::Main,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Never touch the disk; every file must arrive with its content
    #[serde(default)]
    pub no_fs: bool,
    /// Explicit configurations tried before discovered ones
    #[serde(default)]
    pub tsconfig_paths: Vec<String>,
}

/// An active rule and where it applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    pub key: String,
    #[serde(default)]
    pub configurations: Vec<serde_json::Value>,
    /// Empty means every file type
    #[serde(default)]
    pub file_type_targets: Vec<FileType>,
}

impl RuleConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            configurations: Vec::new(),
            file_type_targets: Vec::new(),
        }
    }

    pub fn applies_to(&self, file_type: FileType) -> bool {
        self.file_type_targets.is_empty() || self.file_type_targets.contains(&file_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub base_dir: CanonicalPath,
    /// `None` discovers files under `base_dir`
    #[serde(default)]
    pub files: Option<Vec<InputFile>>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    pub fn new(base_dir: impl Into<CanonicalPath>) -> Self {
        Self {
            base_dir: base_dir.into(),
            files: None,
            rules: Vec::new(),
            options: AnalysisOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub rule_id: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// What the rule engine gets to see of a file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: CanonicalPath,
    pub content: String,
    pub file_type: FileType,
}

/// Rule engine output for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCheck {
    pub issues: Vec<Issue>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub path: CanonicalPath,
    pub issues: Vec<Issue>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<ProgramId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<CanonicalPath>,
}

impl FileResult {
    fn failed(path: CanonicalPath, error: impl Into<String>) -> Self {
        Self {
            path,
            issues: Vec::new(),
            warnings: Vec::new(),
            error: Some(error.into()),
            program_id: None,
            config_path: None,
        }
    }
}

/// One streamed message of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IncrementalResult {
    FileResult(FileResult),
    Meta { warnings: Vec<String> },
    Cancelled,
    Error { message: String },
}

/// Aggregate of a run, returned once it ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    pub files: Vec<FileResult>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Receives streamed results. Returning `false` means the consumer went away.
pub trait ResultSink {
    fn emit(&mut self, result: IncrementalResult) -> bool;
}

impl<F> ResultSink for F
where
    F: FnMut(IncrementalResult) -> bool,
{
    fn emit(&mut self, result: IncrementalResult) -> bool {
        self(result)
    }
}

impl ResultSink for Vec<IncrementalResult> {
    fn emit(&mut self, result: IncrementalResult) -> bool {
        self.push(result);
        true
    }
}

/// Blocks while the channel is full
impl ResultSink for crossbeam_channel::Sender<IncrementalResult> {
    fn emit(&mut self, result: IncrementalResult) -> bool {
        self.send(result).is_ok()
    }
}
