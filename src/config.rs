//! Configuration module for the analysis backbone.
//!
//! Layered configuration:
//! - Default values
//! - TOML configuration file (`.lintbridge/settings.toml`, searched upward)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `LINTBRIDGE_` and use double
//! underscores to separate nested levels:
//! - `LINTBRIDGE_ANALYSIS__MAX_CACHED_PROGRAMS=10` sets `analysis.max_cached_programs`
//! - `LINTBRIDGE_DEBUG=true` sets `debug`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".lintbridge";
const ENV_PREFIX: &str = "LINTBRIDGE_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Analysis configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// Compiled programs kept strongly referenced by the program cache
    #[serde(default = "default_max_cached_programs")]
    pub max_cached_programs: usize,

    /// Directory names never descended into during discovery
    #[serde(default = "default_dependency_dirs")]
    pub dependency_dirs: Vec<String>,

    /// Explicit tsconfig paths or glob patterns, tried before discovered ones
    #[serde(default)]
    pub tsconfig_paths: Vec<String>,

    /// Above this many files, programs are not built at all
    #[serde(default = "default_max_files_for_type_checking")]
    pub max_files_for_type_checking: usize,

    /// Extensions (without dot) of the files an analysis run picks up
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Capacity of the bounded channel used to stream results
    #[serde(default = "default_stream_capacity")]
    pub stream_capacity: usize,
}

fn default_version() -> u32 {
    1
}
fn default_false() -> bool {
    false
}
fn default_max_cached_programs() -> usize {
    5
}
fn default_dependency_dirs() -> Vec<String> {
    vec!["node_modules".to_string()]
}
fn default_max_files_for_type_checking() -> usize {
    20_000
}
fn default_extensions() -> Vec<String> {
    ["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "vue"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}
fn default_stream_capacity() -> usize {
    64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_cached_programs: default_max_cached_programs(),
            dependency_dirs: default_dependency_dirs(),
            tsconfig_paths: Vec::new(),
            max_files_for_type_checking: default_max_files_for_type_checking(),
            extensions: default_extensions(),
            stream_capacity: default_stream_capacity(),
        }
    }
}

impl AnalysisConfig {
    /// Whether `name` ends with one of the analyzed extensions.
    pub fn is_analyzed_file_name(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.extensions.iter().any(|candidate| candidate == ext)
            }
            _ => false,
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nesting levels, single underscore stays in field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find `.lintbridge/settings.toml` from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = AnalysisConfig::default();
        let template = format!(
            r#"# lintbridge configuration

# Version of the configuration schema
version = 1

# Global debug mode
debug = false

[analysis]
# Compiled programs kept alive between files; older ones may be reclaimed
max_cached_programs = {}

# Directories never descended into while discovering files and tsconfigs
dependency_dirs = ["node_modules"]

# Explicit tsconfig paths or glob patterns, tried before discovered ones
tsconfig_paths = []

# Projects with more files than this are analyzed without programs
max_files_for_type_checking = {}

# Extensions picked up by a project analysis
extensions = ["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "vue"]

# Capacity of the result stream between the analysis and its consumer
stream_capacity = {}
"#,
            defaults.max_cached_programs,
            defaults.max_files_for_type_checking,
            defaults.stream_capacity,
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.analysis.max_cached_programs, 5);
        assert_eq!(settings.analysis.dependency_dirs, vec!["node_modules"]);
        assert!(settings.analysis.tsconfig_paths.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
debug = true

[analysis]
max_cached_programs = 2
tsconfig_paths = ["config/tsconfig.*.json"]
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.analysis.max_cached_programs, 2);
        assert_eq!(settings.analysis.tsconfig_paths, vec!["config/tsconfig.*.json"]);
        // Untouched fields keep their defaults
        assert_eq!(settings.analysis.max_files_for_type_checking, 20_000);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.analysis.max_cached_programs = 9;
        settings.analysis.dependency_dirs.push("bower_components".to_string());

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.analysis.max_cached_programs, 9);
        assert_eq!(
            loaded.analysis.dependency_dirs,
            vec!["node_modules", "bower_components"]
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[analysis]\nmax_files_for_type_checking = 10\n").unwrap();

        unsafe {
            std::env::set_var("LINTBRIDGE_ANALYSIS__MAX_FILES_FOR_TYPE_CHECKING", "42");
        }
        let settings = Settings::load_from(&config_path).unwrap();
        unsafe {
            std::env::remove_var("LINTBRIDGE_ANALYSIS__MAX_FILES_FOR_TYPE_CHECKING");
        }

        assert_eq!(settings.analysis.max_files_for_type_checking, 42);
    }

    #[test]
    fn test_analyzed_file_names() {
        let config = AnalysisConfig::default();
        assert!(config.is_analyzed_file_name("main.ts"));
        assert!(config.is_analyzed_file_name("types.d.ts"));
        assert!(config.is_analyzed_file_name("App.vue"));
        assert!(!config.is_analyzed_file_name("README.md"));
        assert!(!config.is_analyzed_file_name(".ts"));
    }
}
