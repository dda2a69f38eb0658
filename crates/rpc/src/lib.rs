//! Client-streaming call channel for uploads.
//!
//! A call carries a stream of [`UploadRequest`](streamftp_protocol::UploadRequest)
//! messages from client to server and a single final status back. The
//! [`RequestReader`] and [`RequestWriter`] traits are what the upload state
//! machines consume; [`tcp`] and [`memory`] provide the transports.
//!
//! # Wire format
//!
//! See [`wire`] module for the frame layout used over TCP.

pub mod error;
pub mod memory;
pub mod stream;
pub mod tcp;
pub mod wire;

pub use error::RpcError;
pub use stream::{CallOutcome, RequestReader, RequestWriter};

/// TCP read/write buffer size (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;
