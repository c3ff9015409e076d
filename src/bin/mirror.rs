//! Schema Mirror CLI
//!
//! Copies pinned subjects and their references from a remote registry into
//! the bundled tree that `registry-bootstrap` embeds.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use registry_bootstrap::mirror::read_pin_files;
use registry_bootstrap::{BootstrapConfig, HttpFetcher, Mirror, RegistryEndpoint};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-mirror")]
#[command(about = "Mirror remote schemas and their references into a bundled tree")]
struct Cli {
    /// Config file (defaults to bootstrap.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Registry to copy from
    #[arg(short, long)]
    source_url: Option<String>,

    /// Root of the bundled tree
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Env files with subject names and version pins (repeatable)
    #[arg(short, long = "pins")]
    pins: Vec<PathBuf>,

    /// Deepest reference level to clean and allow
    #[arg(long)]
    max_depth: Option<usize>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = BootstrapConfig::load_from(cli.config.as_deref())?;

    let source_url = cli
        .source_url
        .or(config.mirror.source_url.clone())
        .context("no source registry: pass --source-url or set mirror.source_url")?;
    let output = cli.output.unwrap_or_else(|| config.mirror.output_dir.clone());
    let max_depth = cli.max_depth.unwrap_or(config.mirror.max_depth);
    let pin_files = if cli.pins.is_empty() {
        config.mirror.pin_files.clone()
    } else {
        cli.pins
    };

    let pins = read_pin_files(&pin_files)?;
    info!(subjects = pins.len(), source = %source_url, "read subject pins");

    let fetcher = HttpFetcher::new(
        RegistryEndpoint::parse(&source_url)?,
        config.registry.request_timeout(),
    )?;
    let mirror = Mirror::new(fetcher, &output, max_depth);

    mirror.clean()?;
    let report = mirror.mirror_all(&pins).await?;

    info!(
        written = report.written.len(),
        output = %output.display(),
        "mirror complete"
    );
    Ok(())
}
