//! Rule engine seam

use super::{FileCheck, RuleConfig, SourceFile};
use crate::error::RuleEngineError;
use crate::program::CompiledProgram;
use std::fmt::Debug;

/// Checks one file against the active rules.
///
/// `program` is absent when type checking is disabled for the run.
pub trait RuleEngine: Send + Sync + Debug {
    fn check(
        &self,
        file: &SourceFile,
        program: Option<&dyn CompiledProgram>,
        rules: &[RuleConfig],
    ) -> Result<FileCheck, RuleEngineError>;
}

/// Reports nothing. Used when only configuration and program resolution matter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRuleEngine;

impl RuleEngine for NoopRuleEngine {
    fn check(
        &self,
        _file: &SourceFile,
        _program: Option<&dyn CompiledProgram>,
        _rules: &[RuleConfig],
    ) -> Result<FileCheck, RuleEngineError> {
        Ok(FileCheck::default())
    }
}
