//! TCP upload client.
//!
//! Opens one connection per call and runs the orchestrator over it.

use std::path::Path;

use streamftp_protocol::UploadResponse;
use streamftp_rpc::tcp::TcpCall;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::UploadError;
use crate::types::ClientOptions;
use crate::upload;

/// Client for a streamftp server at `host:port`.
pub struct UploadClient {
    addr: String,
    options: ClientOptions,
    cancel: CancellationToken,
}

impl UploadClient {
    pub fn new(addr: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            addr: addr.into(),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to abort in-flight uploads.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns a cancellation token for uploads made with this client.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn connect(&self) -> Result<TcpCall, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            result = TcpCall::connect(self.addr.as_str(), self.options.connect_timeout) => {
                let call = result?;
                info!(addr = %self.addr, "connected");
                Ok(call)
            }
        }
    }

    /// Uploads `local` to the absolute server path `remote`.
    pub async fn upload_file(
        &self,
        local: &Path,
        remote: &str,
    ) -> Result<UploadResponse, UploadError> {
        let mut call = self.connect().await?;
        upload::send_file(&mut call, local, remote, &self.options, &self.cancel).await
    }

    /// Creates or truncates `remote` as an empty file.
    pub async fn touch(&self, remote: &str) -> Result<UploadResponse, UploadError> {
        let mut call = self.connect().await?;
        upload::touch(&mut call, remote).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_before_connect() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = UploadClient::new("127.0.0.1:1", ClientOptions::default()).with_cancel(cancel);
        assert!(matches!(
            client.touch("/x").await,
            Err(UploadError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn connection_refused_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let options = ClientOptions {
            connect_timeout: Duration::from_secs(2),
            ..ClientOptions::default()
        };
        let client = UploadClient::new(addr.to_string(), options);
        let err = client.touch("/x").await.unwrap_err();
        assert!(matches!(err, UploadError::Connect(_)), "{err}");
    }
}
