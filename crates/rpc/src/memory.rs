//! In-process call channel.
//!
//! Connects a [`MemoryCall`] to a [`MemoryReader`] through a bounded queue so
//! the upload state machines can be driven without sockets.

use streamftp_protocol::{Status, UploadRequest};
use tokio::sync::{mpsc, oneshot};

use crate::stream::{CallOutcome, RequestReader, RequestWriter, StatusSlot};

enum Event {
    Request(UploadRequest),
    WritesDone,
    Cancel,
}

/// Creates a connected client/server pair with room for `buffer` in-flight
/// messages.
pub fn channel(buffer: usize) -> (MemoryCall, MemoryReader) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let (status_tx, status_rx) = oneshot::channel();
    (
        MemoryCall {
            tx: Some(tx),
            status: StatusSlot::new(status_rx),
            cancelled: false,
        },
        MemoryReader {
            rx,
            status_tx: Some(status_tx),
            received: 0,
            half_closed: false,
            cancelled: false,
        },
    )
}

/// Client half.
pub struct MemoryCall {
    tx: Option<mpsc::Sender<Event>>,
    status: StatusSlot,
    cancelled: bool,
}

impl RequestWriter for MemoryCall {
    async fn write(&mut self, request: UploadRequest) -> Result<(), Status> {
        if let Some(status) = self.status.early_error() {
            return Err(status);
        }
        let Some(tx) = &self.tx else {
            return Err(if self.cancelled {
                Status::cancelled("call was cancelled")
            } else {
                Status::internal("stream already half-closed")
            });
        };
        if tx.send(Event::Request(request)).await.is_err() {
            return Err(self
                .status
                .early_error()
                .unwrap_or_else(|| Status::internal("server dropped the stream")));
        }
        Ok(())
    }

    async fn writes_done(&mut self) -> Result<(), Status> {
        let Some(tx) = self.tx.take() else {
            return Err(Status::internal("stream already closed"));
        };
        // A receiver that is already gone has answered or will answer via the
        // status slot.
        let _ = tx.send(Event::WritesDone).await;
        Ok(())
    }

    async fn cancel(&mut self) {
        self.cancelled = true;
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Event::Cancel).await;
        }
    }

    async fn finish(&mut self) -> CallOutcome {
        self.status.wait().await
    }
}

/// Server half.
pub struct MemoryReader {
    rx: mpsc::Receiver<Event>,
    status_tx: Option<oneshot::Sender<CallOutcome>>,
    received: u64,
    half_closed: bool,
    cancelled: bool,
}

impl MemoryReader {
    /// Delivers the final status to the client. Only the first call has an
    /// effect.
    pub fn respond(&mut self, outcome: CallOutcome) {
        if let Some(tx) = self.status_tx.take() {
            let _ = tx.send(outcome);
        }
        self.rx.close();
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl RequestReader for MemoryReader {
    async fn read(&mut self) -> Result<Option<UploadRequest>, Status> {
        if self.half_closed {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Event::Request(request)) => {
                self.received += 1;
                Ok(Some(request))
            }
            Some(Event::WritesDone) => {
                self.half_closed = true;
                Ok(None)
            }
            Some(Event::Cancel) => {
                self.cancelled = true;
                Err(Status::cancelled("call cancelled by client"))
            }
            None => {
                self.cancelled = true;
                Err(Status::cancelled("client dropped the stream"))
            }
        }
    }
}
