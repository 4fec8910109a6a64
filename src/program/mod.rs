//! Compiled programs: construction, building and caching
//!
//! A compiled program is the expensive artifact derived from one configuration.
//! Construction itself is delegated to a [`ProgramConstructor`]; this module
//! decides when to build one ([`builder::ProgramBuilder`]) and how long to keep
//! it alive ([`cache::ProgramCache`]).

pub mod builder;
pub mod cache;
pub mod constructor;

pub use builder::{BuiltProgram, ProgramBuilder, ResolvedOptions};
pub use cache::{CacheStats, ProgramCache, ProgramHandle};
pub use constructor::{ImportGraphConstructor, SourceProgram};

use crate::fs::FileSystem;
use crate::paths::CanonicalPath;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Stable identifier handed out for a cached program
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(String);

impl ProgramId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgramId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProgramId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The opaque product of a [`ProgramConstructor`].
pub trait CompiledProgram: Send + Sync + Debug + 'static {
    /// Every file the program contains, dependencies included
    fn source_files(&self) -> Vec<CanonicalPath>;

    /// Referenced projects as declared; may point at directories
    fn project_references(&self) -> Vec<CanonicalPath>;

    /// Lets a rule engine recover the concrete program type
    fn as_any(&self) -> &dyn Any;
}

/// Failure reported by a [`ProgramConstructor`]
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConstructError(pub String);

/// Turns resolved options into a compiled program.
pub trait ProgramConstructor: Send + Sync + Debug {
    fn construct(
        &self,
        options: &ResolvedOptions,
        fs: &dyn FileSystem,
    ) -> Result<Arc<dyn CompiledProgram>, ConstructError>;
}
