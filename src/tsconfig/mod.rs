//! tsconfig.json document model
//!
//! A configuration is kept as a loosely typed JSON document plus a narrow,
//! validated subset of compiler options the rest of the crate relies on.
//! JSONC (comments, trailing commas) is parsed with json5.

pub mod extends;
pub mod matcher;
pub mod paths;

pub use extends::{ExtendsResolver, ResolvedConfig, ScopedList};
pub use matcher::{PathPattern, expand_root_names, is_supported_source};
pub use paths::PathAliasResolver;

use crate::error::{ConfigError, ConfigResult};
use crate::paths::CanonicalPath;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Canonical configuration file name
pub const TSCONFIG_JSON: &str = "tsconfig.json";

/// Conventional dependency directory searched for package `extends` targets
pub const NODE_MODULES: &str = "node_modules";

/// Surfaced once per run when an extended configuration could not be found
pub const MISSING_EXTENDED_TSCONFIG: &str = "At least one referenced/extended tsconfig.json was not found in the project. Please run 'npm install' for a more complete analysis. Check analysis logs for more details.";

/// Whether a file name looks like a project configuration (`tsconfig*.json`).
pub fn is_config_file_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("tsconfig") && lower.ends_with(".json")
}

/// One tsconfig file as written, before `extends` resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsConfigDocument {
    pub extends: Vec<String>,
    pub compiler_options: Map<String, Value>,
    pub files: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub references: Vec<String>,
}

/// Parse JSONC tsconfig content into a document.
pub fn parse_jsonc_tsconfig(path: &CanonicalPath, content: &str) -> ConfigResult<TsConfigDocument> {
    let content = content.trim_start_matches('\u{feff}');
    let value: Value = if content.trim().is_empty() {
        Value::Object(Map::new())
    } else {
        json5::from_str(content)
            .map_err(|e| ConfigError::parse(path, format!("Failed to parse tsconfig.json: {e}")))?
    };

    let Value::Object(root) = value else {
        return Err(ConfigError::parse(
            path,
            "The root value of a tsconfig.json file must be an object.",
        ));
    };

    let extends = match root.get("extends") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ConfigError::parse(path, "Compiler option 'extends' requires a value of type string or Array.")
            })?,
        Some(_) => {
            return Err(ConfigError::parse(
                path,
                "Compiler option 'extends' requires a value of type string or Array.",
            ));
        }
    };

    let compiler_options = match root.get("compilerOptions") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(options)) => options.clone(),
        Some(_) => {
            return Err(ConfigError::parse(
                path,
                "Compiler option 'compilerOptions' requires a value of type object.",
            ));
        }
    };
    if let Some(unknown) = compiler_options.keys().find(|key| !is_known_compiler_option(key)) {
        return Err(ConfigError::parse(path, format!("Unknown compiler option '{unknown}'.")));
    }

    let references = match root.get("references") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.get("path").and_then(Value::as_str).map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                ConfigError::parse(path, "Every project reference requires a 'path' of type string.")
            })?,
        Some(_) => {
            return Err(ConfigError::parse(
                path,
                "Compiler option 'references' requires a value of type Array.",
            ));
        }
    };

    Ok(TsConfigDocument {
        extends,
        compiler_options,
        files: string_list(&root, "files", path)?,
        include: string_list(&root, "include", path)?,
        exclude: string_list(&root, "exclude", path)?,
        references,
    })
}

fn string_list(root: &Map<String, Value>, key: &str, path: &CanonicalPath) -> ConfigResult<Option<Vec<String>>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(|| {
                ConfigError::parse(path, format!("Compiler option '{key}' requires a value of type Array."))
            }),
        Some(_) => Err(ConfigError::parse(
            path,
            format!("Compiler option '{key}' requires a value of type Array."),
        )),
    }
}

/// The validated subset of compiler options.
///
/// Path-valued options are resolved against the directory of the
/// configuration that declared them. Everything else stays in `raw`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    pub allow_js: Option<bool>,
    pub check_js: Option<bool>,
    pub strict: Option<bool>,
    pub no_implicit_any: Option<bool>,
    pub base_url: Option<CanonicalPath>,
    pub paths: Option<BTreeMap<String, Vec<String>>>,
    /// Directory that relative `paths` targets resolve against when `baseUrl` is unset
    #[serde(skip)]
    pub paths_base_dir: Option<CanonicalPath>,
    pub out_dir: Option<CanonicalPath>,
    pub root_dir: Option<CanonicalPath>,
    pub target: Option<String>,
    pub module: Option<String>,
    pub lib: Option<Vec<String>>,
    #[serde(skip)]
    pub raw: Map<String, Value>,
}

impl CompilerOptions {
    /// Validate `raw` as declared by the configuration living in `dir`.
    pub fn from_raw(raw: &Map<String, Value>, dir: &CanonicalPath, path: &CanonicalPath) -> ConfigResult<Self> {
        let paths = match raw.get("paths") {
            None | Some(Value::Null) => None,
            Some(Value::Object(entries)) => {
                let mut parsed = BTreeMap::new();
                for (pattern, targets) in entries {
                    let targets = targets
                        .as_array()
                        .and_then(|items| {
                            items
                                .iter()
                                .map(|t| t.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| {
                            ConfigError::parse(path, format!("Substitutions for pattern '{pattern}' should be an array."))
                        })?;
                    parsed.insert(pattern.clone(), targets);
                }
                Some(parsed)
            }
            Some(_) => {
                return Err(ConfigError::parse(
                    path,
                    "Compiler option 'paths' requires a value of type object.",
                ));
            }
        };

        Ok(Self {
            allow_js: bool_option(raw, "allowJs", path)?,
            check_js: bool_option(raw, "checkJs", path)?,
            strict: bool_option(raw, "strict", path)?,
            no_implicit_any: bool_option(raw, "noImplicitAny", path)?,
            base_url: string_option(raw, "baseUrl", path)?.map(|url| dir.join(&url)),
            paths_base_dir: paths.as_ref().map(|_| dir.clone()),
            paths,
            out_dir: string_option(raw, "outDir", path)?.map(|out| dir.join(&out)),
            root_dir: string_option(raw, "rootDir", path)?.map(|root| dir.join(&root)),
            target: string_option(raw, "target", path)?,
            module: string_option(raw, "module", path)?,
            lib: string_list_option(raw, "lib", path)?,
            raw: raw.clone(),
        })
    }

    /// Child options win option by option; `paths` is replaced as a whole.
    pub fn merge(self, child: CompilerOptions) -> CompilerOptions {
        let mut raw = self.raw;
        raw.extend(child.raw);
        let (paths, paths_base_dir) = if child.paths.is_some() {
            (child.paths, child.paths_base_dir)
        } else {
            (self.paths, self.paths_base_dir)
        };
        CompilerOptions {
            allow_js: child.allow_js.or(self.allow_js),
            check_js: child.check_js.or(self.check_js),
            strict: child.strict.or(self.strict),
            no_implicit_any: child.no_implicit_any.or(self.no_implicit_any),
            base_url: child.base_url.or(self.base_url),
            paths,
            paths_base_dir,
            out_dir: child.out_dir.or(self.out_dir),
            root_dir: child.root_dir.or(self.root_dir),
            target: child.target.or(self.target),
            module: child.module.or(self.module),
            lib: child.lib.or(self.lib),
            raw,
        }
    }

    /// `checkJs` implies `allowJs` unless `allowJs` is set explicitly.
    pub fn allows_js(&self) -> bool {
        self.allow_js.or(self.check_js).unwrap_or(false)
    }
}

fn type_error(path: &CanonicalPath, key: &str, expected: &str) -> ConfigError {
    ConfigError::parse(
        path,
        format!("Compiler option '{key}' requires a value of type {expected}."),
    )
}

fn bool_option(raw: &Map<String, Value>, key: &str, path: &CanonicalPath) -> ConfigResult<Option<bool>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(type_error(path, key, "boolean")),
    }
}

fn string_option(raw: &Map<String, Value>, key: &str, path: &CanonicalPath) -> ConfigResult<Option<String>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(type_error(path, key, "string")),
    }
}

fn string_list_option(raw: &Map<String, Value>, key: &str, path: &CanonicalPath) -> ConfigResult<Option<Vec<String>>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(|| type_error(path, key, "Array")),
        Some(_) => Err(type_error(path, key, "Array")),
    }
}

/// Compiler option names accepted in `compilerOptions`, compared case-insensitively.
const KNOWN_COMPILER_OPTIONS: &[&str] = &[
    "allowArbitraryExtensions",
    "allowImportingTsExtensions",
    "allowJs",
    "allowSyntheticDefaultImports",
    "allowUmdGlobalAccess",
    "allowUnreachableCode",
    "allowUnusedLabels",
    "alwaysStrict",
    "assumeChangesOnlyAffectDirectDependencies",
    "baseUrl",
    "charset",
    "checkJs",
    "composite",
    "customConditions",
    "declaration",
    "declarationDir",
    "declarationMap",
    "diagnostics",
    "disableReferencedProjectLoad",
    "disableSizeLimit",
    "disableSolutionSearching",
    "disableSourceOfProjectReferenceRedirect",
    "downlevelIteration",
    "emitBOM",
    "emitDeclarationOnly",
    "emitDecoratorMetadata",
    "erasableSyntaxOnly",
    "esModuleInterop",
    "exactOptionalPropertyTypes",
    "experimentalDecorators",
    "explainFiles",
    "extendedDiagnostics",
    "forceConsistentCasingInFileNames",
    "generateCpuProfile",
    "generateTrace",
    "ignoreDeprecations",
    "importHelpers",
    "importsNotUsedAsValues",
    "incremental",
    "inlineSourceMap",
    "inlineSources",
    "isolatedDeclarations",
    "isolatedModules",
    "jsx",
    "jsxFactory",
    "jsxFragmentFactory",
    "jsxImportSource",
    "keyofStringsOnly",
    "lib",
    "libReplacement",
    "listEmittedFiles",
    "listFiles",
    "locale",
    "mapRoot",
    "maxNodeModuleJsDepth",
    "module",
    "moduleDetection",
    "moduleResolution",
    "moduleSuffixes",
    "newLine",
    "noCheck",
    "noEmit",
    "noEmitHelpers",
    "noEmitOnError",
    "noErrorTruncation",
    "noFallthroughCasesInSwitch",
    "noImplicitAny",
    "noImplicitOverride",
    "noImplicitReturns",
    "noImplicitThis",
    "noImplicitUseStrict",
    "noLib",
    "noPropertyAccessFromIndexSignature",
    "noResolve",
    "noStrictGenericChecks",
    "noUncheckedIndexedAccess",
    "noUncheckedSideEffectImports",
    "noUnusedLocals",
    "noUnusedParameters",
    "out",
    "outDir",
    "outFile",
    "paths",
    "plugins",
    "preserveConstEnums",
    "preserveSymlinks",
    "preserveValueImports",
    "preserveWatchOutput",
    "pretty",
    "reactNamespace",
    "removeComments",
    "resolveJsonModule",
    "resolvePackageJsonExports",
    "resolvePackageJsonImports",
    "rewriteRelativeImportExtensions",
    "rootDir",
    "rootDirs",
    "skipDefaultLibCheck",
    "skipLibCheck",
    "sourceMap",
    "sourceRoot",
    "strict",
    "strictBindCallApply",
    "strictBuiltinIteratorReturn",
    "strictFunctionTypes",
    "strictNullChecks",
    "strictPropertyInitialization",
    "stripInternal",
    "suppressExcessPropertyErrors",
    "suppressImplicitAnyIndexErrors",
    "target",
    "traceResolution",
    "tsBuildInfoFile",
    "typeRoots",
    "types",
    "useDefineForClassFields",
    "useUnknownInCatchVariables",
    "verbatimModuleSyntax",
];

pub fn is_known_compiler_option(name: &str) -> bool {
    KNOWN_COMPILER_OPTIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name))
}
