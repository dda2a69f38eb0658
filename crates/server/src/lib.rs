//! Upload server for streamftp.
//!
//! Accepts one `UploadFile` call per TCP connection, validates the request
//! stream against the declared size and hash algorithm, persists the payload
//! through a [`FileChannel`](streamftp_hashing::FileChannel) and answers with
//! the file's metadata and the server-computed digest.

mod error;
mod handler;
mod metadata;
mod server;
mod session;
mod validation;

pub use error::HandlerError;
pub use handler::UploadService;
pub use metadata::file_metadata;
pub use server::{ServerConfig, UploadServer};
pub use session::{SessionChannel, UploadMode, UploadSession};
pub use validation::validate_target;

use std::path::PathBuf;

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("root directory does not exist or is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),
}
