use anyhow::Context as _;
use clap::Parser;
use scw_provider::Provider;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scw-plugin")]
#[command(version, about = "Scaleway provider plugin", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    debug: bool,
    /// Append logs to this file instead of stderr
    #[arg(long, env = "SCW_PLUGIN_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // stdout carries the protocol
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_writer(file)
                .with_env_filter(filter)
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "scw-plugin starting");
    let provider = Arc::new(Provider::new());
    scw_provider::serve_stdio(provider)
        .await
        .context("serving host requests")?;
    tracing::info!("input closed, exiting");
    Ok(())
}
