//! Upload client for streamftp.
//!
//! # Pipeline
//!
//! 1. **Init**: announce destination path, size and hash algorithm
//! 2. **Stream**: read the local file in fixed-size blocks, hashing as it goes
//! 3. **Finish**: send the local digest, half-close, await the server's status
//!
//! The orchestrator in [`upload`] is generic over
//! [`RequestWriter`](streamftp_rpc::RequestWriter); [`UploadClient`] runs it
//! over TCP.

pub mod client;
pub mod error;
pub mod types;
pub mod upload;

pub use client::UploadClient;
pub use error::{Side, UploadError};
pub use types::ClientOptions;
pub use upload::{send_file, touch};
