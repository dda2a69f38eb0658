//! Incremental digests and file channels that hash what they transfer.
//!
//! [`Hasher`] wraps the SHA-2 primitives behind an explicit
//! initialize/update/finalize lifecycle. [`HashingFile`] composes a
//! [`PlainFile`] with a [`Hasher`] so every byte written or read is persisted
//! and digested in the same order.

mod channel;
mod hasher;

pub use channel::{FileChannel, HashingFile, OpenMode, PlainFile};
pub use hasher::{
    ERR_DIGEST_SIZE, ERR_FINALIZED, ERR_NOT_INITIALIZED, ERR_UNSUPPORTED, HashError, Hasher,
    digest_bytes,
};

use std::path::PathBuf;

/// Errors produced by file channels.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("{op}: {source}, path={}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: stream is not open")]
    NotOpen { op: &'static str },

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("digest unavailable after close")]
    DigestUnavailable,
}

impl FileError {
    /// Numeric code for diagnostics: the OS error number for I/O failures,
    /// the hasher code for digest failures, `-1` otherwise.
    pub fn code(&self) -> i32 {
        match self {
            FileError::Io { source, .. } => source.raw_os_error().unwrap_or(-1),
            FileError::Hash(e) => e.code,
            FileError::NotOpen { .. } | FileError::DigestUnavailable => -1,
        }
    }
}
