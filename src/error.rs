//! Error types for configuration resolution, program building and analysis runs
//!
//! Structured errors built with thiserror. Each enum exposes a stable
//! `status_code()` for JSON responses and `recovery_suggestions()` for humans.

use crate::paths::CanonicalPath;
use crate::program::ProgramId;
use thiserror::Error;

/// Errors raised while discovering, reading or parsing configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Root directory missing or unreadable during a scan
    #[error("Failed to discover configuration files under '{root}': {source}")]
    Discovery {
        root: CanonicalPath,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: CanonicalPath,
        #[source]
        source: std::io::Error,
    },

    /// Malformed content, unknown options, unresolvable extends targets
    #[error("Invalid configuration file '{path}': {reason}")]
    Parse { path: CanonicalPath, reason: String },

    #[error("Circular extends chain detected at '{path}'")]
    CircularExtends { path: CanonicalPath },
}

impl ConfigError {
    pub fn read(path: CanonicalPath, source: std::io::Error) -> Self {
        Self::Read { path, source }
    }

    pub fn parse(path: &CanonicalPath, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Stable code for programmatic handling in JSON responses
    pub fn status_code(&self) -> String {
        match self {
            Self::Discovery { .. } => "CONFIG_DISCOVERY_ERROR",
            Self::Read { .. } => "CONFIG_READ_ERROR",
            Self::Parse { .. } => "CONFIG_PARSE_ERROR",
            Self::CircularExtends { .. } => "CONFIG_CIRCULAR_EXTENDS",
        }
        .to_string()
    }

    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Discovery { .. } => vec![
                "Check that the base directory exists and is readable",
                "Pass an absolute path when running outside the project",
            ],
            Self::Read { .. } => vec![
                "Check that the configuration file exists and you have read permissions",
            ],
            Self::Parse { .. } => vec![
                "Check JSON syntax, comments, and trailing commas",
                "Run 'npm install' so that extended configurations can be found",
            ],
            Self::CircularExtends { .. } => {
                vec!["Remove circular references between 'extends' entries"]
            }
        }
    }
}

/// Errors raised while building or looking up compiled programs
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The program-construction capability failed
    #[error("Failed to construct program for '{config_path}': {reason}")]
    Construct {
        config_path: CanonicalPath,
        reason: String,
    },

    #[error("Failed to find program {id}")]
    NotFound { id: ProgramId },

    #[error("Could not create a program containing {path}")]
    NoProgramForFile { path: CanonicalPath },
}

impl ProgramError {
    pub fn status_code(&self) -> String {
        match self {
            Self::Config(inner) => return inner.status_code(),
            Self::Construct { .. } => "PROGRAM_CONSTRUCTION_ERROR",
            Self::NotFound { .. } => "PROGRAM_NOT_FOUND",
            Self::NoProgramForFile { .. } => "NO_PROGRAM_FOR_FILE",
        }
        .to_string()
    }

    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Config(inner) => inner.recovery_suggestions(),
            Self::Construct { .. } => vec![
                "Check the compiler options of the configuration",
                "Invalidate the configuration cache and retry",
            ],
            Self::NotFound { .. } => vec![
                "The program was deleted or the cache was cleared; create it again",
            ],
            Self::NoProgramForFile { .. } => vec![
                "Add the file to a tsconfig.json 'include' or 'files' list",
            ],
        }
    }
}

/// Errors that abort a whole analysis run
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Target files could not be enumerated at all
    #[error("Failed to enumerate files under '{base_dir}': {source}")]
    Enumeration {
        base_dir: CanonicalPath,
        #[source]
        source: std::io::Error,
    },

    #[error("An analysis is already running")]
    AlreadyRunning,

    #[error("Analysis request is invalid: {reason}")]
    InvalidRequest { reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AnalysisError {
    pub fn status_code(&self) -> String {
        match self {
            Self::Enumeration { .. } => "ANALYSIS_ENUMERATION_ERROR",
            Self::AlreadyRunning => "ANALYSIS_ALREADY_RUNNING",
            Self::InvalidRequest { .. } => "ANALYSIS_INVALID_REQUEST",
            Self::Config(inner) => return inner.status_code(),
        }
        .to_string()
    }

    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Enumeration { .. } => vec![
                "Check that the base directory exists and is readable",
                "Pass the file list explicitly in the request",
            ],
            Self::AlreadyRunning => vec!["Cancel the running analysis or wait for it to finish"],
            Self::InvalidRequest { .. } => vec![
                "In no-fs mode every file must carry its content",
            ],
            Self::Config(inner) => inner.recovery_suggestions(),
        }
    }
}

/// Failure reported by the rule engine for a single file
#[derive(Error, Debug)]
#[error("{message}")]
pub struct RuleEngineError {
    pub message: String,
}

impl RuleEngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type ProgramResult<T> = Result<T, ProgramError>;

pub type AnalysisResult<T> = Result<T, AnalysisError>;
