//! Default program constructor
//!
//! Builds a [`SourceProgram`] by following the import graph from the root
//! names: every file reachable through a relative import, a `paths` alias or a
//! `baseUrl`-relative specifier becomes part of the program. Bare package
//! imports are left to the package manager and are not followed.

use super::{CompiledProgram, ConstructError, ProgramConstructor, ResolvedOptions};
use crate::fs::FileSystem;
use crate::paths::CanonicalPath;
use crate::tsconfig::{CompilerOptions, PathAliasResolver, is_supported_source};
use regex::Regex;
use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// `import ... from 'x'`, `export ... from 'x'`, `import 'x'`, `require('x')`, `import('x')`
static IMPORT_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\b(?:import|export)\s+(?:[^'";]*?\s+from\s+)?['"]([^'"\n]+)['"])|(?:\b(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\))"#,
    )
    .expect("import specifier regex is valid")
});

const SOURCE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".d.ts", ".mts", ".cts", ".vue", ".js", ".jsx", ".mjs", ".cjs",
];

/// ESM-style `.js` imports that point at TypeScript sources
const JS_TO_TS: &[(&str, &[&str])] = &[
    (".js", &[".ts", ".tsx"]),
    (".jsx", &[".tsx"]),
    (".mjs", &[".mts"]),
    (".cjs", &[".cts"]),
];

/// One file of a [`SourceProgram`]
#[derive(Debug, Clone)]
pub struct ProgramFile {
    pub path: CanonicalPath,
    pub text: String,
    /// Resolved in-program imports, in source order
    pub imports: Vec<CanonicalPath>,
}

/// Program produced by [`ImportGraphConstructor`]
#[derive(Debug)]
pub struct SourceProgram {
    pub config_path: CanonicalPath,
    pub options: CompilerOptions,
    pub root_names: Vec<CanonicalPath>,
    pub files: Vec<ProgramFile>,
    pub references: Vec<CanonicalPath>,
}

impl SourceProgram {
    pub fn file(&self, path: &CanonicalPath) -> Option<&ProgramFile> {
        self.files.iter().find(|file| &file.path == path)
    }
}

impl CompiledProgram for SourceProgram {
    fn source_files(&self) -> Vec<CanonicalPath> {
        self.files.iter().map(|file| file.path.clone()).collect()
    }

    fn project_references(&self) -> Vec<CanonicalPath> {
        self.references.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportGraphConstructor;

impl ImportGraphConstructor {
    pub fn new() -> Self {
        Self
    }

    /// Extract raw import specifiers from source text
    pub fn import_specifiers(text: &str) -> Vec<&str> {
        IMPORT_SPECIFIER
            .captures_iter(text)
            .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
            .map(|m| m.as_str())
            .collect()
    }

    fn resolve_specifier(
        &self,
        fs: &dyn FileSystem,
        aliases: &PathAliasResolver,
        importer: &CanonicalPath,
        specifier: &str,
        allow_js: bool,
    ) -> Option<CanonicalPath> {
        let bases = if specifier.starts_with("./") || specifier.starts_with("../") {
            let dir = importer.parent()?;
            vec![dir.join(specifier)]
        } else if specifier.starts_with('/') {
            vec![CanonicalPath::from(specifier)]
        } else {
            aliases.resolve_import(specifier)
        };

        bases
            .iter()
            .find_map(|base| probe(fs, base, allow_js))
    }
}

/// Exact path, then extensions, then index files, then `.js` → `.ts` remapping
fn probe(fs: &dyn FileSystem, base: &CanonicalPath, allow_js: bool) -> Option<CanonicalPath> {
    let accept = |path: &CanonicalPath| fs.is_file(path) && is_supported_source(path, allow_js);

    if accept(base) {
        return Some(base.clone());
    }
    let raw = base.as_str();
    for ext in SOURCE_EXTENSIONS {
        let candidate = CanonicalPath::from(format!("{raw}{ext}").as_str());
        if accept(&candidate) {
            return Some(candidate);
        }
    }
    if fs.is_dir(base) {
        for ext in SOURCE_EXTENSIONS {
            let candidate = base.join(&format!("index{ext}"));
            if accept(&candidate) {
                return Some(candidate);
            }
        }
    }
    for (js, replacements) in JS_TO_TS {
        if let Some(stem) = raw.strip_suffix(js) {
            for ts in *replacements {
                let candidate = CanonicalPath::from(format!("{stem}{ts}").as_str());
                if accept(&candidate) {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

impl ProgramConstructor for ImportGraphConstructor {
    fn construct(
        &self,
        options: &ResolvedOptions,
        fs: &dyn FileSystem,
    ) -> Result<Arc<dyn CompiledProgram>, ConstructError> {
        let compiler_options = &options.compiler_options;
        let allow_js = compiler_options.allows_js();
        let aliases = PathAliasResolver::from_options(compiler_options, &options.config_path)
            .map_err(|e| ConstructError(e.to_string()))?;

        let mut seen: HashSet<CanonicalPath> = HashSet::new();
        let mut queue: VecDeque<CanonicalPath> = VecDeque::new();
        for root in &options.root_names {
            if seen.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        let mut files = Vec::new();
        while let Some(path) = queue.pop_front() {
            let text = match fs.read_file(&path) {
                Ok(text) => text,
                Err(e) => {
                    debug!("Leaving {path} out of the program: {e}");
                    continue;
                }
            };

            let mut imports = Vec::new();
            for specifier in Self::import_specifiers(&text) {
                let Some(target) = self.resolve_specifier(fs, &aliases, &path, specifier, allow_js)
                else {
                    continue;
                };
                if !imports.contains(&target) {
                    imports.push(target.clone());
                }
                if seen.insert(target.clone()) {
                    queue.push_back(target);
                }
            }

            files.push(ProgramFile {
                path,
                text,
                imports,
            });
        }

        debug!(
            "Constructed program for {} with {} file(s)",
            options.config_path,
            files.len()
        );

        Ok(Arc::new(SourceProgram {
            config_path: options.config_path.clone(),
            options: compiler_options.clone(),
            root_names: options.root_names.clone(),
            files,
            references: options.project_references.clone(),
        }))
    }
}
