//! `compilerOptions.paths` alias resolution for import specifiers

use super::CompilerOptions;
use crate::error::{ConfigError, ConfigResult};
use crate::paths::CanonicalPath;

/// One compiled `paths` entry
#[derive(Debug)]
pub struct PathRule {
    /// Original pattern (e.g., "@components/*")
    pub pattern: String,
    /// Target paths (e.g., ["src/components/*"])
    pub targets: Vec<String>,
    regex: regex::Regex,
}

impl PathRule {
    pub fn new(pattern: String, targets: Vec<String>, config: &CanonicalPath) -> ConfigResult<Self> {
        // "@components/*" becomes "^@components/(.*)$"
        let regex_pattern = format!("^{}$", regex::escape(&pattern).replace("\\*", "(.*)"));
        let regex = regex::Regex::new(&regex_pattern).map_err(|e| {
            ConfigError::parse(config, format!("Invalid path pattern '{pattern}': {e}"))
        })?;
        if targets.is_empty() {
            return Err(ConfigError::parse(
                config,
                format!("Substitutions for pattern '{pattern}' shouldn't be an empty array."),
            ));
        }
        Ok(Self {
            pattern,
            targets,
            regex,
        })
    }

    /// Every target with the wildcard capture substituted
    pub fn try_resolve(&self, specifier: &str) -> Option<Vec<String>> {
        let captures = self.regex.captures(specifier)?;
        let captured = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        Some(
            self.targets
                .iter()
                .map(|target| target.replacen('*', captured, 1))
                .collect(),
        )
    }
}

/// Resolves aliased import specifiers against `baseUrl` (or the declaring config directory)
#[derive(Debug)]
pub struct PathAliasResolver {
    pub base_dir: Option<CanonicalPath>,
    pub rules: Vec<PathRule>,
}

impl PathAliasResolver {
    pub fn from_options(options: &CompilerOptions, config: &CanonicalPath) -> ConfigResult<Self> {
        let mut rules = Vec::new();
        if let Some(paths) = &options.paths {
            // Longest prefix first, the order TypeScript matches patterns in
            let mut entries: Vec<_> = paths.iter().collect();
            entries.sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.find('*').unwrap_or(pattern.len())));
            for (pattern, targets) in entries {
                rules.push(PathRule::new(pattern.clone(), targets.clone(), config)?);
            }
        }
        Ok(Self {
            base_dir: options.base_url.clone().or_else(|| options.paths_base_dir.clone()),
            rules,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.base_dir.is_none()
    }

    /// Candidate paths (without extension probing) for a bare specifier
    pub fn resolve_import(&self, specifier: &str) -> Vec<CanonicalPath> {
        let Some(base) = &self.base_dir else {
            return Vec::new();
        };
        let mut candidates: Vec<CanonicalPath> = self
            .rules
            .iter()
            .find_map(|rule| rule.try_resolve(specifier))
            .unwrap_or_default()
            .iter()
            .map(|target| base.join(target))
            .collect();
        // Non-aliased bare specifiers still resolve against baseUrl
        candidates.push(base.join(specifier));
        candidates
    }
}
