//! The client-streaming call abstraction the upload state machines run on.

use std::future::Future;

use streamftp_protocol::{Status, UploadRequest, UploadResponse};
use tokio::sync::oneshot;

/// Final result of one call as seen by the client.
pub type CallOutcome = Result<UploadResponse, Status>;

/// Server half of a call: the inbound request stream.
pub trait RequestReader: Send {
    /// Returns the next request.
    ///
    /// `Ok(None)` means the client half-closed the stream. Cancellation or a
    /// lost connection surfaces as `Err` with code `CANCELLED`, an undecodable
    /// frame as `INVALID_ARGUMENT`.
    fn read(&mut self) -> impl Future<Output = Result<Option<UploadRequest>, Status>> + Send;
}

/// Client half of a call: the outbound request stream plus the final status.
pub trait RequestWriter: Send {
    /// Sends one request. Fails once the server has already answered or the
    /// stream is gone.
    fn write(&mut self, request: UploadRequest) -> impl Future<Output = Result<(), Status>> + Send;

    /// Half-closes the outbound stream.
    fn writes_done(&mut self) -> impl Future<Output = Result<(), Status>> + Send;

    /// Aborts the call. The server observes `CANCELLED` on its next read.
    fn cancel(&mut self) -> impl Future<Output = ()> + Send;

    /// Waits for the server's final status and response.
    fn finish(&mut self) -> impl Future<Output = CallOutcome> + Send;
}

/// Holds the server's answer on the client side, which may arrive before the
/// client has finished writing.
pub(crate) struct StatusSlot {
    rx: Option<oneshot::Receiver<CallOutcome>>,
    outcome: Option<CallOutcome>,
}

impl StatusSlot {
    pub(crate) fn new(rx: oneshot::Receiver<CallOutcome>) -> Self {
        Self {
            rx: Some(rx),
            outcome: None,
        }
    }

    /// Returns the error to report from `write` if the server already answered.
    pub(crate) fn early_error(&mut self) -> Option<Status> {
        if let Some(rx) = &mut self.rx {
            match rx.try_recv() {
                Ok(outcome) => {
                    self.outcome = Some(outcome);
                    self.rx = None;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.outcome = Some(Err(lost()));
                    self.rx = None;
                }
            }
        }

        match self.outcome.as_ref()? {
            Err(status) => Some(status.clone()),
            Ok(_) => Some(Status::internal("server completed the call before the stream ended")),
        }
    }

    pub(crate) async fn wait(&mut self) -> CallOutcome {
        if let Some(rx) = self.rx.take() {
            self.outcome = Some(rx.await.unwrap_or_else(|_| Err(lost())));
        }
        self.outcome.clone().unwrap_or_else(|| Err(lost()))
    }
}

fn lost() -> Status {
    Status::internal("call ended without a status")
}
