//! `extends` chain resolution
//!
//! Follows TypeScript's rules:
//! 1. Relative specifiers resolve against the extending config, `.json` is implied
//! 2. Package specifiers are looked up in `node_modules` of every ancestor directory
//! 3. Child settings override parent settings, cycles are errors
//!
//! The last conventional lookup location (`/node_modules/<pkg>/tsconfig.json`
//! at the filesystem root) is special: when it is absent the extended config is
//! treated as `{}` and the result is flagged `missing_config`.

use super::{CompilerOptions, NODE_MODULES, TSCONFIG_JSON, parse_jsonc_tsconfig};
use crate::error::{ConfigError, ConfigResult};
use crate::fs::FileSystem;
use crate::paths::CanonicalPath;
use crate::project::ConfigFile;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Patterns together with the directory they are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedList {
    pub patterns: Vec<String>,
    pub base_dir: CanonicalPath,
}

/// A configuration with its whole `extends` chain applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub config_path: CanonicalPath,
    pub options: CompilerOptions,
    pub files: Option<ScopedList>,
    pub include: Option<ScopedList>,
    pub exclude: Option<ScopedList>,
    /// Referenced project paths as written, resolved against the config directory
    pub references: Vec<CanonicalPath>,
    pub missing_config: bool,
    pub warnings: Vec<String>,
}

impl ResolvedConfig {
    pub fn directory(&self) -> CanonicalPath {
        self.config_path
            .parent()
            .unwrap_or_else(|| self.config_path.root())
    }
}

#[derive(Debug, Default)]
struct Layer {
    options: CompilerOptions,
    files: Option<ScopedList>,
    include: Option<ScopedList>,
    exclude: Option<ScopedList>,
    references: Vec<CanonicalPath>,
}

impl Layer {
    /// Apply `child` on top of `self`. References are never inherited.
    fn overlay(self, child: Layer) -> Layer {
        Layer {
            options: self.options.merge(child.options),
            files: child.files.or(self.files),
            include: child.include.or(self.include),
            exclude: child.exclude.or(self.exclude),
            references: child.references,
        }
    }
}

#[derive(Debug, Default)]
struct ChainState {
    missing_config: bool,
    warnings: Vec<String>,
}

enum Located {
    Found(CanonicalPath),
    /// Nothing found and the final lookup location is a `tsconfig.json`
    MissingLastLookup(CanonicalPath),
}

pub struct ExtendsResolver<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> ExtendsResolver<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Resolve `config` and everything it extends.
    pub fn resolve(&self, config: &ConfigFile) -> ConfigResult<ResolvedConfig> {
        let mut visited = HashSet::new();
        let mut state = ChainState::default();
        let layer = self.resolve_layer(&config.path, &config.contents, &mut visited, &mut state)?;

        Ok(ResolvedConfig {
            config_path: config.path.clone(),
            options: layer.options,
            files: layer.files,
            include: layer.include,
            exclude: layer.exclude,
            references: layer.references,
            missing_config: state.missing_config,
            warnings: state.warnings,
        })
    }

    fn resolve_layer(
        &self,
        path: &CanonicalPath,
        contents: &str,
        visited: &mut HashSet<CanonicalPath>,
        state: &mut ChainState,
    ) -> ConfigResult<Layer> {
        if !visited.insert(path.clone()) {
            return Err(ConfigError::CircularExtends { path: path.clone() });
        }

        let doc = parse_jsonc_tsconfig(path, contents)?;
        let dir = path.parent().unwrap_or_else(|| path.root());

        let mut inherited = Layer::default();
        for specifier in &doc.extends {
            match self.locate(&dir, specifier, path)? {
                Located::Found(parent_path) => {
                    debug!("{path} extends {parent_path}");
                    let text = self
                        .fs
                        .read_file(&parent_path)
                        .map_err(|e| ConfigError::read(parent_path.clone(), e))?;
                    let parent = self.resolve_layer(&parent_path, &text, visited, state)?;
                    inherited = inherited.overlay(parent);
                }
                Located::MissingLastLookup(missing) => {
                    warn!("Could not find tsconfig.json: {missing}; falling back to an empty configuration.");
                    state.missing_config = true;
                    state.warnings.push(format!(
                        "Could not find tsconfig.json: {missing}; falling back to an empty configuration."
                    ));
                }
            }
        }

        let own = Layer {
            options: CompilerOptions::from_raw(&doc.compiler_options, &dir, path)?,
            files: doc.files.map(|patterns| ScopedList {
                patterns,
                base_dir: dir.clone(),
            }),
            include: doc.include.map(|patterns| ScopedList {
                patterns,
                base_dir: dir.clone(),
            }),
            exclude: doc.exclude.map(|patterns| ScopedList {
                patterns,
                base_dir: dir.clone(),
            }),
            references: doc.references.iter().map(|r| dir.join(r)).collect(),
        };

        visited.remove(path);
        Ok(inherited.overlay(own))
    }

    fn locate(&self, dir: &CanonicalPath, specifier: &str, from: &CanonicalPath) -> ConfigResult<Located> {
        let is_path = specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier == "."
            || specifier == ".."
            || CanonicalPath::from_unix(specifier).is_absolute();

        if is_path {
            let candidate = dir.join(specifier);
            if self.fs.is_file(&candidate) {
                return Ok(Located::Found(candidate));
            }
            if !specifier.ends_with(".json") {
                let with_extension = CanonicalPath::from_unix(&format!("{candidate}.json"));
                if self.fs.is_file(&with_extension) {
                    return Ok(Located::Found(with_extension));
                }
            }
            return Err(ConfigError::parse(from, format!("File '{specifier}' not found.")));
        }

        let mut current = Some(dir.clone());
        while let Some(directory) = current {
            let modules = directory.join(NODE_MODULES);
            if let Some(found) = self
                .package_candidates(&modules, specifier)
                .into_iter()
                .find(|candidate| self.fs.is_file(candidate))
            {
                return Ok(Located::Found(found));
            }
            current = directory.parent();
        }

        let root_modules = dir.root().join(NODE_MODULES);
        let last_lookup = if specifier.ends_with(".json") {
            root_modules.join(specifier)
        } else {
            root_modules.join(specifier).join(TSCONFIG_JSON)
        };
        if last_lookup.file_name() == Some(TSCONFIG_JSON) {
            Ok(Located::MissingLastLookup(last_lookup))
        } else {
            Err(ConfigError::parse(from, format!("File '{specifier}' not found.")))
        }
    }

    /// Locations tried for a package specifier inside one `node_modules`.
    fn package_candidates(&self, modules: &CanonicalPath, specifier: &str) -> Vec<CanonicalPath> {
        let base = modules.join(specifier);
        if specifier.ends_with(".json") {
            return vec![base];
        }

        let mut candidates = Vec::new();
        let manifest = base.join("package.json");
        if let Ok(text) = self.fs.read_file(&manifest) {
            if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&text) {
                if let Some(Value::String(entry)) = fields.get("tsconfig") {
                    candidates.push(base.join(entry));
                }
            }
        }
        candidates.push(base.join(TSCONFIG_JSON));
        candidates.push(CanonicalPath::from_unix(&format!("{base}.json")));
        candidates
    }
}
