//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod plan;

use clap::{Args, Parser, Subcommand};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use glob::glob;

use crate::config::{load_config, merge_cli_overrides, CliOverrides, SlicepackConfig};
use crate::engine::{Engine, EngineOptions};
use crate::models::SliceRequest;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Slicepack - slice images, pack them into sprites and rewrite CSS
#[derive(Parser)]
#[command(name = "slicepack")]
#[command(about = "Slicepack - slice images, pack them into sprites and rewrite CSS placeholders")]
#[command(version)]
pub struct Cli {
    /// Log pass milestones (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one pass and write the stylesheet, sprites and preload script
    Build {
        #[command(flatten)]
        pass: PassArgs,

        /// Output directory (overrides slicepack.toml)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the sprite plan as JSON without writing anything
    Plan {
        #[command(flatten)]
        pass: PassArgs,
    },
}

/// Inputs shared by every command that runs a pass.
#[derive(Args, Debug, Clone)]
pub struct PassArgs {
    /// JSON array of slice requests
    #[arg(long)]
    pub slices: PathBuf,

    /// Stylesheet(s) containing placeholder tokens; requires are followed
    #[arg(long = "css", required = true)]
    pub css: Vec<PathBuf>,

    /// Glob pattern(s) for source images
    #[arg(long = "images")]
    pub images: Vec<String>,

    /// Directory that instance-relative names are computed from (default: cwd)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Config file (default: slicepack.toml found from the working directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output mode: sprited, data-url or mhtml
    #[arg(long)]
    pub mode: Option<String>,

    /// Prefer @2x variants
    #[arg(long)]
    pub retina: bool,

    /// Theme used in output file names
    #[arg(long)]
    pub theme: Option<String>,
}

/// A configured engine with every input registered.
pub(crate) struct PreparedPass {
    pub engine: Engine,
    pub config: SlicepackConfig,
    /// Directory relative output paths are resolved against
    pub project_root: PathBuf,
    pub stylesheet: String,
}

/// Name a file relative to `root`, with `/` separators.
pub(crate) fn instance_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Load configuration, register inputs and hand the slice requests over.
///
/// On failure the error has already been printed and the exit code to use
/// is returned.
pub(crate) fn prepare_pass(pass: &PassArgs, out: Option<&Path>) -> Result<PreparedPass, ExitCode> {
    let mut config = load_config(pass.config.as_deref()).map_err(|e| {
        eprintln!("Error loading config: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;

    let cwd = std::env::current_dir().unwrap_or_default();
    let project_root = match &pass.config {
        Some(path) => path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone()),
        None => crate::config::find_config()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| cwd.clone()),
    };

    let overrides = CliOverrides {
        out: out.map(Path::to_path_buf),
        mode: pass.mode.clone(),
        retina: pass.retina.then_some(true),
        theme: pass.theme.clone(),
    };
    merge_cli_overrides(&mut config, &overrides);

    let options = EngineOptions::from_config(&config).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;
    let mut engine = Engine::new(options).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;

    let root = pass.root.clone().unwrap_or(cwd);

    let mut inputs: Vec<PathBuf> = Vec::new();
    for pattern in &pass.images {
        let paths = glob(pattern).map_err(|e| {
            eprintln!("Error: invalid image pattern '{}': {}", pattern, e);
            ExitCode::from(EXIT_INVALID_ARGS)
        })?;
        inputs.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
    }
    inputs.extend(pass.css.iter().cloned());

    for path in &inputs {
        let name = instance_name(&root, path);
        let registered = engine.add_file(path).map_err(|e| e.to_string()).and_then(|()| {
            engine.map_file(name.clone(), path.clone()).map_err(|e| e.to_string())
        });
        if let Err(e) = registered {
            eprintln!("Error: {}", e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
        log::debug!("Mapped {} -> {}", name, path.display());
    }

    let requests = read_slices(&pass.slices).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })?;
    engine.set_slices(requests);

    let stylesheet = engine.combined_stylesheet().map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })?;

    Ok(PreparedPass { engine, config, project_root, stylesheet })
}

fn read_slices(path: &Path) -> Result<Vec<SliceRequest>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read slices from {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("invalid slices in {}: {}", path.display(), e))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

/// Main CLI entry point
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build { pass, out } => build::run_build(&pass, out.as_deref(), cli.verbose),
        Commands::Plan { pass } => plan::run_plan(&pass),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_instance_name_is_root_relative() {
        let root = Path::new("/site");
        assert_eq!(instance_name(root, Path::new("/site/images/a.png")), "images/a.png");
        assert_eq!(instance_name(root, Path::new("other/b.png")), "other/b.png");
        assert_eq!(instance_name(root, Path::new("./c.css")), "c.css");
    }

    #[test]
    fn test_parse_build_args() {
        let cli = Cli::try_parse_from([
            "slicepack",
            "build",
            "--slices",
            "slices.json",
            "--css",
            "a.css",
            "--css",
            "b.css",
            "--images",
            "img/*.png",
            "--mode",
            "mhtml",
            "-o",
            "dist",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Build { pass, out } => {
                assert_eq!(pass.css.len(), 2);
                assert_eq!(pass.images, vec!["img/*.png"]);
                assert_eq!(pass.mode.as_deref(), Some("mhtml"));
                assert_eq!(out, Some(PathBuf::from("dist")));
            }
            Commands::Plan { .. } => panic!("expected build"),
        }
    }

    #[test]
    fn test_css_is_required() {
        assert!(Cli::try_parse_from(["slicepack", "plan", "--slices", "s.json"]).is_err());
    }
}
