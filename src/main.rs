//! CLI entry point for lintbridge.
//!
//! Inspects configuration discovery, builds programs and runs whole-project
//! analyses from the command line. Results go to stdout, logs to stderr.

use anyhow::{Context, Result};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use lintbridge::analysis::NoopRuleEngine;
use lintbridge::project::{ConfigSelector, ConfigStore};
use lintbridge::{
    AnalysisRequest, AnalysisService, CanonicalPath, DiskFileSystem, IncrementalResult, Settings,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Project configuration resolution and analysis orchestration
#[derive(Parser)]
#[command(
    name = "lintbridge",
    version = env!("CARGO_PKG_VERSION"),
    about = "Resolve tsconfig files, build programs and orchestrate JS/TS analyses",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .lintbridge directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .lintbridge/settings.toml")]
    Config,

    /// List discovered tsconfig files
    #[command(
        about = "List tsconfig files under a directory",
        after_help = "Examples:\n  lintbridge configs .\n  lintbridge configs . --file src/index.ts"
    )]
    Configs {
        /// Root directory to scan
        root: PathBuf,

        /// Show candidate order for this file instead
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Build the program of a tsconfig file
    #[command(about = "Build a program and print its files and references as JSON")]
    Program {
        /// Path to the tsconfig file
        tsconfig: PathBuf,
    },

    /// List the root files of a tsconfig file
    #[command(about = "Print the files a tsconfig file includes, without building a program")]
    Files {
        /// Path to the tsconfig file
        tsconfig: PathBuf,
    },

    /// Analyze a whole project
    #[command(
        about = "Run a whole-project analysis",
        after_help = "Examples:\n  lintbridge analyze .\n  lintbridge analyze . --tsconfig tsconfig.app.json --json"
    )]
    Analyze {
        /// Project base directory
        root: PathBuf,

        /// Explicit tsconfig paths or patterns, tried before discovered ones
        #[arg(long = "tsconfig")]
        tsconfig: Vec<String>,

        /// Print every streamed message as a JSON line
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path).map_err(|e| {
            anyhow::anyhow!("Configuration error loading from {}: {e}", path.display())
        })?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        }),
    };

    let level = if cli.debug || settings.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force).map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
        }

        Commands::Configs { root, file } => {
            let root = absolute(&root)?;
            let mut store = ConfigStore::new(
                Arc::new(DiskFileSystem::new()),
                settings.analysis.dependency_dirs.clone(),
            );
            store.scan(&root)?;
            match file {
                Some(file) => {
                    let file = absolute(&file)?;
                    for (rank, config) in ConfigSelector::new()
                        .candidates_for(&mut store, &file, &[])
                        .enumerate()
                    {
                        let marker = if config.is_synthetic { " (synthetic)" } else { "" };
                        println!("{:>3}. {}{marker}", rank + 1, config.path);
                    }
                }
                None => {
                    for path in store.paths() {
                        println!("{path}");
                    }
                    eprintln!("{} configuration file(s)", store.len());
                }
            }
        }

        Commands::Program { tsconfig } => {
            let service = AnalysisService::with_defaults(settings, Arc::new(NoopRuleEngine));
            let summary = service.create_program(&absolute(&tsconfig)?, None)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Files { tsconfig } => {
            let service = AnalysisService::with_defaults(settings, Arc::new(NoopRuleEngine));
            let files = service.list_configured_files(&absolute(&tsconfig)?);
            println!("{}", serde_json::to_string_pretty(&files)?);
        }

        Commands::Analyze {
            root,
            tsconfig,
            json,
        } => {
            let service = AnalysisService::with_defaults(settings, Arc::new(NoopRuleEngine));
            let mut request = AnalysisRequest::new(absolute(&root)?);
            request.options.tsconfig_paths = tsconfig;

            let mut print = |message: IncrementalResult| {
                if json {
                    match serde_json::to_string(&message) {
                        Ok(line) => println!("{line}"),
                        Err(e) => eprintln!("Failed to serialize result: {e}"),
                    }
                } else {
                    print_human(&message);
                }
                true
            };
            let result = service.analyze_project(request, Some(&mut print))?;
            if !json {
                let issues: usize = result.files.iter().map(|f| f.issues.len()).sum();
                let errors = result.files.iter().filter(|f| f.error.is_some()).count();
                println!(
                    "Analyzed {} file(s): {issues} issue(s), {errors} error(s)",
                    result.files.len()
                );
            }
        }
    }

    Ok(())
}

fn print_human(message: &IncrementalResult) {
    match message {
        IncrementalResult::FileResult(file) => {
            match &file.error {
                Some(error) => println!("{}: error: {error}", file.path),
                None => {
                    let program = file
                        .config_path
                        .as_ref()
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{} [{program}]", file.path);
                }
            }
            for issue in &file.issues {
                println!(
                    "  {}:{} {} ({})",
                    issue.line, issue.column, issue.message, issue.rule_id
                );
            }
        }
        IncrementalResult::Meta { warnings } => {
            for warning in warnings {
                println!("warning: {warning}");
            }
        }
        IncrementalResult::Cancelled => println!("Analysis cancelled"),
        IncrementalResult::Error { message } => eprintln!("Analysis failed: {message}"),
    }
}

fn absolute(path: &Path) -> Result<CanonicalPath> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Cannot determine the current directory")?
            .join(path)
    };
    Ok(CanonicalPath::new(path))
}
