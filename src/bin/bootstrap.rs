//! Registry Bootstrap CLI
//!
//! Waits for the registry named by `KAFKA_SCHEMA_REGISTRY_ENDPOINT`, then
//! registers the bundled schemas. Exits non-zero on missing configuration,
//! an unreadable bundle, or when the time budget runs out.

use std::path::PathBuf;

use clap::Parser;
use registry_bootstrap::{bootstrap, BootstrapConfig, DocumentSource, EmbeddedSource, FsSource};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "registry-bootstrap")]
#[command(about = "Register bundled schemas once the schema registry is reachable")]
struct Cli {
    /// Config file (defaults to bootstrap.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Read schemas from this directory instead of the embedded bundle
    #[arg(short, long)]
    bundle: Option<PathBuf>,
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

    let source: Box<dyn DocumentSource> = match cli.bundle.or(config.bundle.path.clone()) {
        Some(path) => {
            info!(path = %path.display(), "loading schemas from directory");
            Box::new(FsSource::new(path))
        }
        None => Box::new(EmbeddedSource::bundled()),
    };

    let summary = bootstrap(|key| std::env::var(key).ok(), &config, source.as_ref()).await?;

    info!(
        registered = summary.registered,
        attempts = summary.attempts,
        probes = summary.probes,
        elapsed = ?summary.elapsed,
        "registry bootstrap complete"
    );
    Ok(())
}
