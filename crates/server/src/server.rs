//! Upload server.
//!
//! Listens on a TCP port and serves one `UploadFile` call per accepted
//! connection, each on its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use streamftp_protocol::constants::{DRAIN_TIMEOUT, UPLOAD_FILE_METHOD};
use streamftp_protocol::{Code, Status};
use streamftp_rpc::TCP_BUFFER_SIZE;
use streamftp_rpc::tcp::{TcpRequestReader, respond};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::ServerError;
use crate::handler::UploadService;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (port 0 = OS-assigned).
    pub bind: SocketAddr,
    /// How long to wait for a rejected client to close its stream.
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: ([0, 0, 0, 0], streamftp_protocol::constants::DEFAULT_PORT).into(),
            drain_timeout: DRAIN_TIMEOUT,
        }
    }
}

/// The upload server.
pub struct UploadServer {
    config: ServerConfig,
    service: Arc<UploadService>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl UploadServer {
    pub fn new(config: ServerConfig, service: UploadService) -> Arc<Self> {
        Arc::new(Self {
            config,
            service: Arc::new(service),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Token that stops the accept loop and in-flight calls when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Gracefully shuts down the server.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Binds the configured address and serves until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind).await?;
        self.serve(listener).await
    }

    /// Serves calls on an already bound listener until cancellation.
    pub async fn serve(self: &Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!(root = %self.service.root().display(), "upload server listening on {local_addr}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::error!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Runs one call on an accepted connection and sends its status.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let span = tracing::info_span!("call", id = %uuid::Uuid::new_v4(), peer = %peer_addr);
        async move {
            stream.set_nodelay(true)?;
            let started = Instant::now();
            let (reader, mut writer) = stream.into_split();
            let mut reader =
                TcpRequestReader::new(BufReader::with_capacity(TCP_BUFFER_SIZE, reader));

            let outcome = tokio::select! {
                result = self.service.upload_file(&mut reader) => result.map_err(Status::from),
                _ = self.cancel.cancelled() => Err(Status::cancelled("server shutting down")),
            };

            let code = match &outcome {
                Ok(_) => Code::Ok,
                Err(status) => status.code,
            };
            tracing::info!(
                method = UPLOAD_FILE_METHOD,
                code = %code,
                cancelled = reader.is_cancelled() || code == Code::Cancelled,
                recv_msgs = reader.received(),
                latency_ms = started.elapsed().as_millis() as u64,
                "call finished"
            );

            if let Err(e) = respond(&mut writer, &outcome).await {
                // A cancelled client may already be gone.
                tracing::debug!("failed to send status: {e}");
                return Ok(());
            }
            if outcome.is_err() {
                reader.drain(self.config.drain_timeout).await;
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}
