//! `files` / `include` / `exclude` expansion into root file names
//!
//! Wildcards follow tsconfig conventions: `*` and `?` never cross a `/`,
//! `**/` spans any number of directories, and a pattern whose last segment
//! has neither wildcard nor extension names a directory (`dir/**/*`).

use super::ResolvedConfig;
use super::extends::ScopedList;
use crate::error::{ConfigError, ConfigResult};
use crate::fs::FileSystem;
use crate::paths::CanonicalPath;
use regex::Regex;
use std::collections::HashSet;

const TS_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts", ".vue"];
const JS_EXTENSIONS: &[&str] = &[".js", ".jsx", ".mjs", ".cjs"];
const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

/// Whether `path` is a source file a program may contain.
pub fn is_supported_source(path: &CanonicalPath, allow_js: bool) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    TS_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
        || (allow_js && JS_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
}

/// A compiled include or exclude pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    pub source: String,
    regex: Regex,
    /// Deepest directory without wildcards; walking starts here
    pub walk_root: CanonicalPath,
}

impl PathPattern {
    pub fn include(base_dir: &CanonicalPath, pattern: &str, config: &CanonicalPath) -> ConfigResult<Self> {
        Self::compile(base_dir, pattern, false, config)
    }

    /// Exclude patterns also match everything below a matched directory.
    pub fn exclude(base_dir: &CanonicalPath, pattern: &str, config: &CanonicalPath) -> ConfigResult<Self> {
        Self::compile(base_dir, pattern, true, config)
    }

    fn compile(base_dir: &CanonicalPath, pattern: &str, is_exclude: bool, config: &CanonicalPath) -> ConfigResult<Self> {
        let mut absolute = base_dir.join(pattern).as_str().to_string();
        let last = absolute.rsplit('/').next().unwrap_or_default().to_string();
        if !is_exclude && !has_wildcard(&last) && !last.contains('.') {
            absolute.push_str("/**/*");
        }

        let segments: Vec<&str> = absolute.split('/').collect();
        let mut expr = String::from("^");
        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();
            if *segment == "**" {
                expr.push_str(if is_last { ".*" } else { "(?:[^/]+/)*" });
                continue;
            }
            for ch in segment.chars() {
                match ch {
                    '*' => expr.push_str("[^/]*"),
                    '?' => expr.push_str("[^/]"),
                    other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
                }
            }
            if !is_last {
                expr.push('/');
            }
        }
        if is_exclude {
            expr.push_str("(?:/.*)?");
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| {
            ConfigError::parse(config, format!("Invalid file pattern '{pattern}': {e}"))
        })?;

        let literal = segments
            .iter()
            .position(|segment| has_wildcard(segment))
            .unwrap_or(segments.len().saturating_sub(1));
        let walk_root = match segments[..literal].join("/") {
            prefix if prefix.is_empty() => base_dir.root(),
            prefix => CanonicalPath::from_unix(&prefix),
        };

        Ok(Self {
            source: pattern.to_string(),
            regex,
            walk_root,
        })
    }

    pub fn is_match(&self, path: &CanonicalPath) -> bool {
        self.regex.is_match(path.as_str())
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// Expand a resolved configuration into its root file names.
///
/// Explicit `files` come first in declaration order, then include matches in
/// walk order. `skip_dirs` are never descended into.
pub fn expand_root_names(
    fs: &dyn FileSystem,
    resolved: &ResolvedConfig,
    skip_dirs: &[String],
) -> ConfigResult<Vec<CanonicalPath>> {
    let config = &resolved.config_path;
    let mut names = Vec::new();
    let mut seen = HashSet::new();

    if let Some(files) = &resolved.files {
        for file in &files.patterns {
            let path = files.base_dir.join(file);
            if seen.insert(path.clone()) {
                names.push(path);
            }
        }
    }

    let include = match (&resolved.include, &resolved.files) {
        (Some(include), _) => Some(include.clone()),
        (None, None) => Some(ScopedList {
            patterns: vec!["**/*".to_string()],
            base_dir: resolved.directory(),
        }),
        (None, Some(_)) => None,
    };

    if let Some(include) = &include {
        let excludes = exclude_patterns(resolved)?;
        let allow_js = resolved.options.allows_js();
        for pattern in &include.patterns {
            let compiled = PathPattern::include(&include.base_dir, pattern, config)?;
            if !fs.is_dir(&compiled.walk_root) {
                continue;
            }
            let candidates = fs
                .walk_files(&compiled.walk_root, skip_dirs)
                .map_err(|e| ConfigError::read(compiled.walk_root.clone(), e))?;
            for path in candidates {
                if compiled.is_match(&path)
                    && is_supported_source(&path, allow_js)
                    && !excludes.iter().any(|exclude| exclude.is_match(&path))
                    && seen.insert(path.clone())
                {
                    names.push(path);
                }
            }
        }
    }

    if names.is_empty() && resolved.references.is_empty() {
        let empty_files = resolved.files.as_ref().is_some_and(|f| f.patterns.is_empty());
        if empty_files && resolved.include.is_none() {
            return Err(ConfigError::parse(
                config,
                format!("The 'files' list in config file '{config}' is empty."),
            ));
        }
        let include_list = include.map(|i| i.patterns).unwrap_or_default();
        let exclude_list = resolved
            .exclude
            .as_ref()
            .map(|e| e.patterns.clone())
            .unwrap_or_default();
        return Err(ConfigError::parse(
            config,
            format!(
                "No inputs were found in config file '{config}'. Specified 'include' paths were '{include_list:?}' and 'exclude' paths were '{exclude_list:?}'."
            ),
        ));
    }

    Ok(names)
}

fn exclude_patterns(resolved: &ResolvedConfig) -> ConfigResult<Vec<PathPattern>> {
    let config = &resolved.config_path;
    match &resolved.exclude {
        Some(exclude) => exclude
            .patterns
            .iter()
            .map(|pattern| PathPattern::exclude(&exclude.base_dir, pattern, config))
            .collect(),
        None => {
            let dir = resolved.directory();
            let mut patterns: Vec<PathPattern> = DEFAULT_EXCLUDES
                .iter()
                .map(|pattern| PathPattern::exclude(&dir, pattern, config))
                .collect::<ConfigResult<_>>()?;
            if let Some(out_dir) = &resolved.options.out_dir {
                patterns.push(PathPattern::exclude(&dir, out_dir.as_str(), config)?);
            }
            Ok(patterns)
        }
    }
}
