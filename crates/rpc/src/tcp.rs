//! Framed TCP transport: one connection per call.
//!
//! The client streams request frames and half-closes with `writes_done`; the
//! server answers with exactly one `status` frame. A background task on the
//! client reads that frame so an early rejection is noticed while the client
//! is still streaming.

use std::time::Duration;

use streamftp_protocol::{Status, UploadRequest};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::TCP_BUFFER_SIZE;
use crate::error::RpcError;
use crate::stream::{CallOutcome, RequestReader, RequestWriter, StatusSlot};
use crate::wire::{Frame, read_frame, write_frame};

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// Inbound request stream of one accepted connection.
pub struct TcpRequestReader<R> {
    reader: R,
    received: u64,
    half_closed: bool,
    terminated: bool,
}

impl<R: AsyncRead + Unpin + Send> TcpRequestReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            received: 0,
            half_closed: false,
            terminated: false,
        }
    }

    /// Number of request messages read so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Returns `true` if the client cancelled or the connection dropped.
    pub fn is_cancelled(&self) -> bool {
        self.terminated
    }

    /// Discards inbound frames until the client closes, for at most `timeout`.
    ///
    /// Called after the status was sent so the client can read it before the
    /// socket is torn down.
    pub async fn drain(&mut self, timeout: Duration) {
        if self.terminated {
            return;
        }
        let discard = async {
            let mut dropped = 0u64;
            while let Ok(Some(_)) = read_frame(&mut self.reader).await {
                dropped += 1;
            }
            dropped
        };
        match tokio::time::timeout(timeout, discard).await {
            Ok(0) => {}
            Ok(dropped) => debug!(dropped, "discarded trailing frames"),
            Err(_) => warn!(?timeout, "client did not close the stream in time"),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> RequestReader for TcpRequestReader<R> {
    async fn read(&mut self) -> Result<Option<UploadRequest>, Status> {
        if self.half_closed {
            return Ok(None);
        }
        if self.terminated {
            return Err(Status::cancelled("stream already terminated"));
        }

        match read_frame(&mut self.reader).await {
            Ok(Some(Frame::Request(request))) => {
                self.received += 1;
                Ok(Some(request))
            }
            Ok(Some(Frame::WritesDone)) => {
                self.half_closed = true;
                Ok(None)
            }
            Ok(Some(Frame::Cancel)) => {
                self.terminated = true;
                Err(Status::cancelled("call cancelled by client"))
            }
            Ok(Some(Frame::Status { .. })) => Err(Status::invalid_argument(
                "unexpected status frame from client",
            )),
            Ok(None) => {
                self.terminated = true;
                Err(Status::cancelled("connection closed before writes_done"))
            }
            Err(RpcError::Io(e)) => {
                self.terminated = true;
                Err(Status::cancelled(format!("connection lost: {e}")))
            }
            Err(e) => Err(Status::invalid_argument(e.to_string())),
        }
    }
}

/// Sends the final status of a call and half-closes the connection.
pub async fn respond<W: AsyncWrite + Unpin>(
    writer: &mut W,
    outcome: &CallOutcome,
) -> Result<(), RpcError> {
    let frame = match outcome {
        Ok(response) => Frame::Status {
            status: Status::ok(),
            response: Some(response.clone()),
        },
        Err(status) => Frame::Status {
            status: status.clone(),
            response: None,
        },
    };
    write_frame(writer, &frame).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Open,
    HalfClosed,
    Cancelled,
}

/// Client half of one upload call over TCP.
pub struct TcpCall {
    writer: BufWriter<OwnedWriteHalf>,
    status: StatusSlot,
    state: CallState,
}

impl TcpCall {
    /// Connects to `addr`, failing with [`RpcError::Timeout`] after `timeout`.
    pub async fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self, RpcError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(RpcError::Timeout),
        };
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "call connected");
        }

        let (reader, writer) = stream.into_split();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(await_status(reader, tx));

        Ok(Self {
            writer: BufWriter::with_capacity(TCP_BUFFER_SIZE, writer),
            status: StatusSlot::new(rx),
            state: CallState::Open,
        })
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), RpcError> {
        write_frame(&mut self.writer, frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    fn closed_error(&self) -> Status {
        match self.state {
            CallState::Cancelled => Status::cancelled("call was cancelled"),
            _ => Status::internal("stream already half-closed"),
        }
    }
}

/// Reads the single status frame the server sends.
async fn await_status(mut reader: OwnedReadHalf, tx: oneshot::Sender<CallOutcome>) {
    let outcome = match read_frame(&mut reader).await {
        Ok(Some(Frame::Status { status, response })) => match (status.is_ok(), response) {
            (true, Some(response)) => Ok(response),
            (true, None) => Err(Status::internal("OK status without a response")),
            (false, _) => Err(status),
        },
        Ok(Some(other)) => Err(Status::internal(format!(
            "unexpected frame from server: {other:?}"
        ))),
        Ok(None) => Err(Status::internal("connection closed before status")),
        Err(e) => Err(Status::internal(format!("failed to read status: {e}"))),
    };
    let _ = tx.send(outcome);
}

impl RequestWriter for TcpCall {
    async fn write(&mut self, request: UploadRequest) -> Result<(), Status> {
        if self.state != CallState::Open {
            return Err(self.closed_error());
        }
        if let Some(status) = self.status.early_error() {
            return Err(status);
        }
        let kind = request.kind();
        self.send(&Frame::Request(request)).await.map_err(|e| {
            debug!(kind, error = %e, "send failed");
            Status::internal(format!("failed to send {kind}: {e}"))
        })
    }

    async fn writes_done(&mut self) -> Result<(), Status> {
        if self.state != CallState::Open {
            return Err(self.closed_error());
        }
        self.state = CallState::HalfClosed;
        self.send(&Frame::WritesDone)
            .await
            .map_err(|e| Status::internal(format!("failed to half-close: {e}")))?;
        self.writer
            .shutdown()
            .await
            .map_err(|e| Status::internal(format!("failed to half-close: {e}")))
    }

    async fn cancel(&mut self) {
        if self.state == CallState::Cancelled {
            return;
        }
        let was_open = self.state == CallState::Open;
        self.state = CallState::Cancelled;
        if was_open {
            // Best effort: the server may already be gone.
            let _ = self.send(&Frame::Cancel).await;
            let _ = self.writer.shutdown().await;
        }
    }

    async fn finish(&mut self) -> CallOutcome {
        self.status.wait().await
    }
}
