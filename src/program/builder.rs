//! Configuration → compiled program
//!
//! Building happens in two steps. [`ProgramBuilder::resolve_options`] turns a
//! configuration into [`ResolvedOptions`] (extends chain, root names) and is
//! memoized by content hash. [`ProgramBuilder::build`] hands those options to
//! the program constructor and post-processes the result.

use super::{CompiledProgram, ProgramConstructor};
use crate::error::{ConfigResult, ProgramError, ProgramResult};
use crate::fs::FileSystem;
use crate::paths::CanonicalPath;
use crate::project::sha::compute_sha256_parts;
use crate::project::{ConfigFile, ResolutionMemo, Sha256Hash};
use crate::tsconfig::{
    CompilerOptions, ExtendsResolver, TSCONFIG_JSON, expand_root_names, is_supported_source,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a program constructor needs to know about one configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    pub config_path: CanonicalPath,
    pub root_names: Vec<CanonicalPath>,
    pub compiler_options: CompilerOptions,
    /// Declared references, not yet checked for existence
    pub project_references: Vec<CanonicalPath>,
    pub missing_config: bool,
    pub warnings: Vec<String>,
}

/// A freshly constructed program with its post-processed metadata.
#[derive(Debug, Clone)]
pub struct BuiltProgram {
    pub files: Vec<CanonicalPath>,
    pub project_references: Vec<CanonicalPath>,
    pub missing_config: bool,
    pub warnings: Vec<String>,
    pub program: Arc<dyn CompiledProgram>,
}

#[derive(Debug)]
pub struct ProgramBuilder {
    fs: Arc<dyn FileSystem>,
    constructor: Arc<dyn ProgramConstructor>,
    dependency_dirs: Vec<String>,
    options_memo: ResolutionMemo<Sha256Hash, ResolvedOptions>,
}

impl ProgramBuilder {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        constructor: Arc<dyn ProgramConstructor>,
        dependency_dirs: Vec<String>,
    ) -> Self {
        Self {
            fs,
            constructor,
            dependency_dirs,
            options_memo: ResolutionMemo::new(),
        }
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Parse `config`, apply its extends chain and expand its root names.
    pub fn resolve_options(&self, config: &ConfigFile) -> ConfigResult<Arc<ResolvedOptions>> {
        let key = compute_sha256_parts(&[config.path.as_str(), &config.contents]);
        if let Some(cached) = self.options_memo.get(&key) {
            debug!("Resolved options cache hit for {}", config.path);
            return Ok(cached);
        }

        let resolved = ExtendsResolver::new(self.fs.as_ref()).resolve(config)?;
        let root_names = expand_root_names(self.fs.as_ref(), &resolved, &self.dependency_dirs)?;

        let options = ResolvedOptions {
            config_path: config.path.clone(),
            root_names,
            compiler_options: resolved.options,
            project_references: resolved.references,
            missing_config: resolved.missing_config,
            warnings: resolved.warnings,
        };
        Ok(self.options_memo.insert(key, options))
    }

    /// Construct the program for `config`.
    ///
    /// Missing project references are dropped with a warning; the file list
    /// keeps only source files outside dependency directories.
    pub fn build(&self, config: &ConfigFile) -> ProgramResult<BuiltProgram> {
        let options = self.resolve_options(config)?;

        let program = self
            .constructor
            .construct(&options, self.fs.as_ref())
            .map_err(|e| ProgramError::Construct {
                config_path: config.path.clone(),
                reason: e.to_string(),
            })?;

        let mut warnings = options.warnings.clone();
        let mut project_references = Vec::new();
        for reference in program.project_references() {
            match self.sanitize_reference(&reference) {
                Some(path) if !project_references.contains(&path) => project_references.push(path),
                Some(_) => {}
                None => {
                    let message = format!("Skipping missing referenced tsconfig.json: {reference}");
                    warn!("{message}");
                    warnings.push(message);
                }
            }
        }

        let files: Vec<CanonicalPath> = program
            .source_files()
            .into_iter()
            .filter(|file| self.is_analyzable(file))
            .collect();

        info!(
            "Built program for {} ({} file(s), {} reference(s))",
            config.path,
            files.len(),
            project_references.len()
        );

        Ok(BuiltProgram {
            files,
            project_references,
            missing_config: options.missing_config,
            warnings,
            program,
        })
    }

    /// Directories get `tsconfig.json` appended; anything that does not exist is dropped.
    fn sanitize_reference(&self, reference: &CanonicalPath) -> Option<CanonicalPath> {
        if self.fs.is_dir(reference) {
            let config = reference.join(TSCONFIG_JSON);
            return self.fs.is_file(&config).then_some(config);
        }
        self.fs.is_file(reference).then(|| reference.clone())
    }

    fn is_analyzable(&self, file: &CanonicalPath) -> bool {
        is_supported_source(file, true)
            && !file
                .segments()
                .any(|segment| self.dependency_dirs.iter().any(|dir| dir == segment))
    }

    /// Forget every memoized option resolution.
    pub fn clear(&self) {
        self.options_memo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::program::ConstructError;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Program whose contents are dictated by the test
    #[derive(Debug)]
    struct StubProgram {
        files: Vec<CanonicalPath>,
        references: Vec<CanonicalPath>,
    }

    impl CompiledProgram for StubProgram {
        fn source_files(&self) -> Vec<CanonicalPath> {
            self.files.clone()
        }
        fn project_references(&self) -> Vec<CanonicalPath> {
            self.references.clone()
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Echoes root names and references, plus a few files a real compiler would pull in
    #[derive(Debug, Default)]
    struct EchoConstructor {
        calls: AtomicUsize,
    }

    impl ProgramConstructor for EchoConstructor {
        fn construct(
            &self,
            options: &ResolvedOptions,
            _fs: &dyn FileSystem,
        ) -> Result<Arc<dyn CompiledProgram>, ConstructError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut files = options.root_names.clone();
            files.push("/p/node_modules/dep/index.d.ts".into());
            files.push("/p/data.json".into());
            Ok(Arc::new(StubProgram {
                files,
                references: options.project_references.clone(),
            }))
        }
    }

    #[derive(Debug)]
    struct FailingConstructor;

    impl ProgramConstructor for FailingConstructor {
        fn construct(
            &self,
            _options: &ResolvedOptions,
            _fs: &dyn FileSystem,
        ) -> Result<Arc<dyn CompiledProgram>, ConstructError> {
            Err(ConstructError("compiler crashed".to_string()))
        }
    }

    fn builder(fs: MemoryFileSystem, constructor: Arc<dyn ProgramConstructor>) -> ProgramBuilder {
        ProgramBuilder::new(Arc::new(fs), constructor, vec!["node_modules".to_string()])
    }

    fn config(fs: &MemoryFileSystem, path: &str) -> ConfigFile {
        let path = CanonicalPath::from(path);
        ConfigFile::new(path.clone(), fs.read_file(&path).unwrap())
    }

    #[test]
    fn build_filters_dependency_and_non_source_files() {
        let fs = MemoryFileSystem::new()
            .with_file("/p/tsconfig.json", "{}")
            .with_file("/p/src/a.ts", "");
        let cfg = config(&fs, "/p/tsconfig.json");
        let builder = builder(fs, Arc::new(EchoConstructor::default()));

        let built = builder.build(&cfg).unwrap();
        assert_eq!(built.files, vec![CanonicalPath::from("/p/src/a.ts")]);
        assert!(!built.missing_config);
    }

    #[test]
    fn references_to_directories_get_tsconfig_appended() {
        let fs = MemoryFileSystem::new()
            .with_file(
                "/p/tsconfig.json",
                r#"{ "files": [], "references": [{ "path": "./core" }, { "path": "./gone" }] }"#,
            )
            .with_file("/p/core/tsconfig.json", "{}")
            .with_file("/p/core/index.ts", "");
        let cfg = config(&fs, "/p/tsconfig.json");
        let builder = builder(fs, Arc::new(EchoConstructor::default()));

        let built = builder.build(&cfg).unwrap();
        assert_eq!(
            built.project_references,
            vec![CanonicalPath::from("/p/core/tsconfig.json")]
        );
        assert_eq!(
            built.warnings,
            vec!["Skipping missing referenced tsconfig.json: /p/gone".to_string()]
        );
    }

    #[test]
    fn resolve_options_is_memoized_by_content() {
        let fs = MemoryFileSystem::new()
            .with_file("/p/tsconfig.json", "{}")
            .with_file("/p/a.ts", "");
        let cfg = config(&fs, "/p/tsconfig.json");
        let builder = builder(fs, Arc::new(EchoConstructor::default()));

        let first = builder.resolve_options(&cfg).unwrap();
        let second = builder.resolve_options(&cfg).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let edited = ConfigFile::new(cfg.path.clone(), r#"{ "compilerOptions": { "strict": true } }"#);
        let third = builder.resolve_options(&edited).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.compiler_options.strict, Some(true));
    }

    #[test]
    fn parse_failures_surface_as_config_errors() {
        let fs = MemoryFileSystem::new().with_file("/p/tsconfig.json", "{ nope");
        let cfg = config(&fs, "/p/tsconfig.json");
        let builder = builder(fs, Arc::new(EchoConstructor::default()));

        let error = builder.build(&cfg).unwrap_err();
        assert!(matches!(error, ProgramError::Config(_)));
    }

    #[test]
    fn constructor_failures_surface_as_construct_errors() {
        let fs = MemoryFileSystem::new()
            .with_file("/p/tsconfig.json", "{}")
            .with_file("/p/a.ts", "");
        let cfg = config(&fs, "/p/tsconfig.json");
        let builder = builder(fs, Arc::new(FailingConstructor));

        let error = builder.build(&cfg).unwrap_err();
        assert_eq!(error.status_code(), "PROGRAM_CONSTRUCTION_ERROR");
        assert!(error.to_string().contains("compiler crashed"));
    }
}
