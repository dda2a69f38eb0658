//! Wires the upload server to the process lifecycle.

use std::net::SocketAddr;

use anyhow::Context;
use streamftp_server::{ServerConfig, UploadServer, UploadService};
use tokio::net::lookup_host;

use crate::config::DaemonConfig;

/// Runs the daemon until Ctrl-C.
pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    let service = UploadService::new(&config.root_dir).with_context(|| {
        format!(
            "failed to create upload service: invalid root directory {}",
            config.root_dir.display()
        )
    })?;

    let bind: SocketAddr = lookup_host(config.bind_addr())
        .await?
        .next()
        .with_context(|| format!("no address for {}", config.bind_addr()))?;

    let server_config = ServerConfig {
        bind,
        drain_timeout: config.drain_timeout(),
    };
    let server = UploadServer::new(server_config, service);

    let server_run = std::sync::Arc::clone(&server);
    let mut handle = tokio::spawn(async move { server_run.run().await });

    tokio::select! {
        // The accept loop only returns on its own if binding failed.
        result = &mut handle => {
            result??;
            return Ok(());
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("SIGINT received, shutting down");
            server.shutdown();
        }
    }

    handle.await??;
    Ok(())
}
