//! Wire protocol types for streamftp.
//!
//! An upload is a single client-streaming call: one [`UploadInit`], zero or
//! more [`UploadChunk`]s, an optional [`UploadFinish`], answered by exactly
//! one [`Status`] and, on success, an [`UploadResponse`].

pub mod constants;
pub mod messages;
pub mod status;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{UploadChunk, UploadFinish, UploadInit, UploadRequest, UploadResponse};
pub use status::{Code, Status};
pub use types::{Digest, DigestError, FileMetaData, HashAlgorithm, ParseAlgorithmError};
