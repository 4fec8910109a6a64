/// The main library module for lintbridge
pub mod analysis;
pub mod config;
pub mod error;
pub mod fs;
pub mod paths;
pub mod program;
pub mod project;
pub mod service;
pub mod tsconfig;

// Explicit exports for better API clarity
pub use analysis::{
    AnalysisOptions, AnalysisRequest, FileResult, FileType, FinalResult, FsEvent, FsEventKind,
    IncrementalResult, InputFile, Issue, NoopRuleEngine, ProjectAnalysisOrchestrator, ResultSink,
    RuleConfig, RuleEngine, RunState, SourceFile, Workspace,
};
pub use config::Settings;
pub use error::{
    AnalysisError, AnalysisResult, ConfigError, ConfigResult, ProgramError, ProgramResult,
    RuleEngineError,
};
pub use fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
pub use paths::CanonicalPath;
pub use program::{
    CompiledProgram, ImportGraphConstructor, ProgramBuilder, ProgramCache, ProgramConstructor,
    ProgramHandle, ProgramId,
};
pub use project::{ConfigFile, ConfigSelector, ConfigStore};
pub use service::{AnalysisService, ConfiguredFiles, ProgramSummary};
