//! Upload error types.

use std::fmt;

use streamftp_hashing::FileError;
use streamftp_protocol::Status;
use streamftp_rpc::RpcError;

/// Which end of the call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Client => "client-side",
            Side::Server => "server-side",
        })
    }
}

/// Errors produced by an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Reading the local source failed.
    #[error("{status}: {detail}: {source} (client-side)")]
    Local {
        detail: String,
        #[source]
        source: FileError,
        status: Status,
    },

    /// Sending a message failed. `status` is the call's final status.
    #[error("{status}: {detail} (server-side)")]
    Send { detail: String, status: Status },

    /// The server finished the call with a non-OK status.
    #[error("{0} (server-side)")]
    Rejected(Status),

    /// The server accepted the upload but reported a different digest.
    #[error("hash value does not match: local {local}, server {remote} (server-side)")]
    HashMismatch { local: String, remote: String },

    #[error("failed to connect: {0} (server-side)")]
    Connect(#[from] RpcError),

    #[error("upload cancelled (client-side)")]
    Cancelled,
}

impl UploadError {
    pub fn side(&self) -> Side {
        match self {
            UploadError::Local { .. } | UploadError::Cancelled => Side::Client,
            UploadError::Send { .. }
            | UploadError::Rejected(_)
            | UploadError::HashMismatch { .. }
            | UploadError::Connect(_) => Side::Server,
        }
    }

    /// Final status of the call, when one was received.
    pub fn status(&self) -> Option<&Status> {
        match self {
            UploadError::Local { status, .. }
            | UploadError::Send { status, .. }
            | UploadError::Rejected(status) => Some(status),
            _ => None,
        }
    }
}
