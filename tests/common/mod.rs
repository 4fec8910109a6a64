#![allow(dead_code)]

use lintbridge::analysis::{FileCheck, Issue, RuleConfig, RuleEngine, SourceFile};
use lintbridge::program::{ConstructError, ResolvedOptions};
use lintbridge::{
    CanonicalPath, CompiledProgram, FileSystem, ImportGraphConstructor, MemoryFileSystem,
    ProgramConstructor, RuleEngineError, Settings, Workspace,
};
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn root(&self) -> CanonicalPath {
        CanonicalPath::new(self.dir.path())
    }

    pub fn path(&self, relative: &str) -> CanonicalPath {
        self.root().join(relative)
    }
}

pub fn memory_fs(files: &[(&str, &str)]) -> MemoryFileSystem {
    files.iter().map(|(path, contents)| (*path, *contents)).collect()
}

/// Import graph constructor that records every configuration it builds
#[derive(Debug, Default)]
pub struct CountingConstructor {
    inner: ImportGraphConstructor,
    built: Mutex<Vec<CanonicalPath>>,
}

impl CountingConstructor {
    pub fn builds(&self) -> usize {
        self.built.lock().len()
    }

    pub fn builds_of(&self, config: &str) -> usize {
        let config = CanonicalPath::from(config);
        self.built.lock().iter().filter(|path| **path == config).count()
    }
}

impl ProgramConstructor for CountingConstructor {
    fn construct(
        &self,
        options: &ResolvedOptions,
        fs: &dyn FileSystem,
    ) -> Result<Arc<dyn CompiledProgram>, ConstructError> {
        self.built.lock().push(options.config_path.clone());
        self.inner.construct(options, fs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checked {
    pub path: CanonicalPath,
    pub had_program: bool,
    pub rules: Vec<String>,
}

/// Rule engine that reports one issue per active rule and remembers what it saw
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub checked: Mutex<Vec<Checked>>,
    pub fail_on: Vec<CanonicalPath>,
}

impl RecordingEngine {
    pub fn failing_on(paths: &[&str]) -> Self {
        Self {
            checked: Mutex::new(Vec::new()),
            fail_on: paths.iter().map(|p| CanonicalPath::from(*p)).collect(),
        }
    }

    pub fn checked_count(&self) -> usize {
        self.checked.lock().len()
    }
}

impl RuleEngine for RecordingEngine {
    fn check(
        &self,
        file: &SourceFile,
        program: Option<&dyn CompiledProgram>,
        rules: &[RuleConfig],
    ) -> Result<FileCheck, RuleEngineError> {
        self.checked.lock().push(Checked {
            path: file.path.clone(),
            had_program: program.is_some(),
            rules: rules.iter().map(|rule| rule.key.clone()).collect(),
        });
        if self.fail_on.contains(&file.path) {
            return Err(RuleEngineError::new(format!("Parse error in {}", file.path)));
        }
        Ok(FileCheck {
            issues: rules
                .iter()
                .map(|rule| Issue {
                    rule_id: rule.key.clone(),
                    line: 1,
                    column: 0,
                    message: format!("{} checked", rule.key),
                })
                .collect(),
            warnings: Vec::new(),
        })
    }
}

pub fn workspace_with(fs: MemoryFileSystem, constructor: Arc<dyn ProgramConstructor>) -> Workspace {
    Workspace::new(Arc::new(Settings::default()), Arc::new(fs), constructor)
}

pub fn workspace(fs: MemoryFileSystem) -> Workspace {
    workspace_with(fs, Arc::new(ImportGraphConstructor::new()))
}
