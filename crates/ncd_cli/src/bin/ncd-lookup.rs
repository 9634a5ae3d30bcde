//! `ncd-lookup`: print one entry of a compiled artifact.
//!
//! Looks the key up through the artifact's name index and prints the entry
//! with its attributes. References are shown with the name and record
//! offset of their target. The artifact is read from a file or fetched
//! over HTTP.

use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use ncd_compiler::{ArtifactReader, DecodedEntry, FormatError};
use ncd_diagnostics::Diagnose;
use ncd_ir::KindRegistry;

/// Print a named entry of a compiled artifact.
#[derive(Parser, Debug)]
#[command(name = "ncd-lookup", version, about = "Look up an entry in an ncd artifact")]
struct Cli {
    /// Entry name to look up.
    key: String,

    /// The artifact file or URL.
    path: String,

    /// Where the artifact comes from.
    #[arg(short, long, value_enum, default_value_t = Source::Guess)]
    source: Source,

    /// Timeout for remote sources, in milliseconds.
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Path to an `ncd.toml` declaring custom kinds.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    File,
    Http,
    /// HTTP when the path contains `//`, otherwise a file.
    Guess,
}

impl Source {
    fn resolve(self, path: &str) -> Source {
        match self {
            Source::Guess if path.contains("//") => Source::Http,
            Source::Guess => Source::File,
            chosen => chosen,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(Some(text)) => print!("{text}"),
        Ok(None) => {
            eprintln!("error: no entry named '{}' in {}", cli.key, cli.path);
            process::exit(1);
        }
        Err(message) => {
            eprintln!("{message}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<Option<String>, String> {
    let kinds = match &cli.config {
        Some(path) => ncd_config::load_config(path)
            .and_then(|config| ncd_build::kind_registry(&config))
            .map_err(|e| e.to_diagnostic().render_line())?,
        None => KindRegistry::builtin(),
    };
    let bytes = match cli.source.resolve(&cli.path) {
        Source::Http => fetch(&cli.path, cli.timeout.map(Duration::from_millis))?,
        _ => std::fs::read(&cli.path).map_err(|e| format!("error: cannot read {}: {e}", cli.path))?,
    };
    lookup(&bytes, &cli.key, &kinds).map_err(|e| render(&cli.path, &e))
}

/// Downloads the artifact at `url`.
fn fetch(url: &str, timeout: Option<Duration>) -> Result<Vec<u8>, String> {
    let mut request = ureq::get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }
    let response = request
        .call()
        .map_err(|e| format!("error: cannot fetch {url}: {e}"))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| format!("error: cannot read response from {url}: {e}"))?;
    Ok(bytes)
}

/// Formats the entry named `key`, or `None` when the artifact has no such entry.
fn lookup(bytes: &[u8], key: &str, kinds: &KindRegistry) -> Result<Option<String>, FormatError> {
    let reader = ArtifactReader::new(bytes)?;
    Ok(reader.lookup(key)?.map(|entry| format_entry(&entry, kinds)))
}

fn format_entry(entry: &DecodedEntry, kinds: &KindRegistry) -> String {
    let kind = match kinds.by_tag(entry.record.tag) {
        Some(spec) => spec.name.clone(),
        None => format!("tag {}", entry.record.tag),
    };
    let mut out = format!(
        "{} ({kind}, record {} at offset {})\n",
        entry.name, entry.record.position, entry.record.offset
    );
    for (name, value) in &entry.attributes {
        out.push_str(&format!("  {name} = {value}\n"));
    }
    out
}

fn render(path: &str, err: &FormatError) -> String {
    format!("{} ({path})", err.to_diagnostic().render_line())
}
