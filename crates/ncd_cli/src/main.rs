//! `ncd-build`: compile a definition file into a content-addressed artifact.
//!
//! Artifacts are cached under `.ncd-cache` (or `[cache] dir` in `ncd.toml`),
//! keyed by a fingerprint of the resolved definition and compiler settings;
//! rebuilding an unchanged definition copies the cached artifact.

#![warn(missing_docs)]

mod build;
mod logger;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use ncd_diagnostics::Diagnose;

/// Compile a definition file into an artifact.
#[derive(Parser, Debug)]
#[command(name = "ncd-build", version, about = "Content-addressed definition compiler")]
pub struct Cli {
    /// The definition file to compile.
    #[arg(required_unless_present = "clear_cache")]
    pub definition: Option<PathBuf>,

    /// Output path (default: the definition path with extension `.ncd`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Cache directory (overrides `[cache] dir`).
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Remove every cached artifact before building.
    #[arg(long)]
    pub clear_cache: bool,

    /// Path to an `ncd.toml` configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use a denser name index (load factor 0.75) for smaller artifacts.
    #[arg(long)]
    pub careful: bool,

    /// Name index load factor, in [0.01, 1].
    #[arg(long, value_name = "F")]
    pub load_factor: Option<f64>,

    /// Suppress all output except errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logger::init(logger::level(cli.quiet, cli.verbose));

    let code = match build::run(&cli) {
        Ok(()) => 0,
        Err(err) => {
            let diagnostic = err.to_diagnostic();
            eprintln!("{}", diagnostic.render_line());
            diagnostic.exit_code()
        }
    };
    process::exit(code);
}
