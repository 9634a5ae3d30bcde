//! `ncd-build`: compile one definition, or clear the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ncd_build::{cache_options, BuildError, BuildOptions, Builder};
use ncd_cache::ArtifactCache;
use ncd_compiler::CompilerSettings;
use ncd_config::NcdConfig;

use crate::Cli;

/// Runs the command described by `cli`.
pub fn run(cli: &Cli) -> Result<(), BuildError> {
    let (config, base) = load_config(cli)?;

    let cache_dir = cli
        .cache_dir
        .clone()
        .unwrap_or_else(|| base.join(&config.cache.dir));
    let cache = Arc::new(ArtifactCache::open(&cache_dir, cache_options(&config.cache)));

    if cli.clear_cache {
        let removed = cache.clear()?;
        if !cli.quiet {
            eprintln!("    Cleared {removed} artifacts from {}", cache_dir.display());
        }
    }

    let Some(definition) = cli.definition.as_deref() else {
        return Ok(());
    };

    let options = build_options(cli, config)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(definition));

    if !cli.quiet {
        eprintln!("   Building {}", definition.display());
    }
    let builder = Builder::new(cache);
    let result = builder.build(definition, &output, &options)?;

    if !cli.quiet {
        let how = if result.from_cache { "cached" } else { "compiled" };
        eprintln!(
            "     Wrote {} ({} entries, {} bytes, {how})",
            result.output.display(),
            result.entries,
            result.size
        );
        if cli.verbose {
            eprintln!(" Fingerprint {}", result.fingerprint);
        }
    }
    Ok(())
}

/// Loads `--config`, or the nearest `ncd.toml` above the working directory.
///
/// Returns the configuration and the directory relative paths in it are
/// resolved against.
fn load_config(cli: &Cli) -> Result<(NcdConfig, PathBuf), BuildError> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => std::env::current_dir()
            .ok()
            .and_then(|cwd| ncd_config::find_config(&cwd)),
    };
    match path {
        Some(path) => {
            let config = ncd_config::load_config(&path)?;
            log::debug!("using configuration {}", path.display());
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok((config, base))
        }
        None => Ok((NcdConfig::default(), PathBuf::from("."))),
    }
}

/// Build options from the configuration. `--load-factor` wins over
/// `--careful`, which wins over the `[compiler]` table.
pub fn build_options(cli: &Cli, mut config: NcdConfig) -> Result<BuildOptions, BuildError> {
    if cli.careful {
        config.compiler.careful = true;
        config.compiler.load_factor = None;
    }
    let mut options = BuildOptions::from_config(&config)?;
    if let Some(load_factor) = cli.load_factor {
        options.settings = CompilerSettings::new(load_factor)?;
    }
    Ok(options)
}

/// The definition path with its extension replaced by `.ncd`.
pub fn default_output(definition: &Path) -> PathBuf {
    definition.with_extension(ncd_cache::store::ARTIFACT_EXT)
}
