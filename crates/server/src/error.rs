use streamftp_hashing::FileError;
use streamftp_protocol::{Code, Status};

/// Why an upload call was rejected.
///
/// Each variant maps onto one wire status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// Malformed or out-of-order messages, bad paths, mismatched declarations.
    #[error("{0}")]
    Protocol(String),

    /// Filesystem or digest engine failure on the server.
    #[error("{0}")]
    Io(String),

    /// Size or digest mismatch after the full transfer.
    #[error("{0}")]
    Integrity(String),

    /// The request stream itself failed (cancelled, dropped, undecodable).
    #[error("{}", .0.message)]
    Stream(Status),
}

impl HandlerError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub(crate) fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    pub(crate) fn file(context: &str, err: FileError) -> Self {
        Self::Io(format!("{context}: {err}"))
    }

    pub fn code(&self) -> Code {
        match self {
            HandlerError::Protocol(_) => Code::InvalidArgument,
            HandlerError::Io(_) => Code::Internal,
            HandlerError::Integrity(_) => Code::DataLoss,
            HandlerError::Stream(status) => status.code,
        }
    }
}

impl From<HandlerError> for Status {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Stream(status) => status,
            other => Status::new(other.code(), other.to_string()),
        }
    }
}
