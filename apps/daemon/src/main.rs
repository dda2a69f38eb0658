//! streamftp upload daemon entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "streamftpd", version, about = "streamftp upload server")]
struct Cli {
    /// Address to bind (overrides the config file).
    host: Option<String>,

    /// Port to listen on (overrides the config file).
    port: Option<u16>,

    /// TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory uploads must stay under.
    #[arg(long, short)]
    root_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting streamftpd");

    let mut config = config::DaemonConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(root_dir) = cli.root_dir {
        config.root_dir = root_dir;
    }
    tracing::info!(
        host = %config.host,
        port = config.port,
        root_dir = %config.root_dir.display(),
        drain_timeout_secs = config.drain_timeout_secs,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("server stopped");
    Ok(())
}
