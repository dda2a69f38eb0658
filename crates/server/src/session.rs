//! Server-side state of one upload call.

use std::path::{Path, PathBuf};

use streamftp_hashing::{FileChannel, FileError, HashingFile, OpenMode, PlainFile};
use streamftp_protocol::{HashAlgorithm, UploadInit};

use crate::HandlerError;

/// What the client declared in its init message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// No size: create or truncate, expect no payload.
    TouchOnly,
    /// Declared size, no end-to-end verification.
    Sized(u64),
    /// Declared size, verified with the given digest.
    Hashing { size: u64, algorithm: HashAlgorithm },
}

impl UploadMode {
    pub fn from_init(init: &UploadInit) -> Result<Self, HandlerError> {
        let algorithm = init.hash_algorithm.filter(|a| a.is_specified());
        match (init.size, algorithm) {
            (None, None) => Ok(UploadMode::TouchOnly),
            (None, Some(algorithm)) => Err(HandlerError::protocol(format!(
                "hash algorithm {algorithm} requires a declared size"
            ))),
            (Some(size), None) => Ok(UploadMode::Sized(size)),
            (Some(size), Some(algorithm)) => Ok(UploadMode::Hashing { size, algorithm }),
        }
    }

    /// Payload bytes the client must send.
    pub fn expected_size(self) -> u64 {
        match self {
            UploadMode::TouchOnly => 0,
            UploadMode::Sized(size) | UploadMode::Hashing { size, .. } => size,
        }
    }

    pub fn algorithm(self) -> Option<HashAlgorithm> {
        match self {
            UploadMode::Hashing { algorithm, .. } => Some(algorithm),
            _ => None,
        }
    }
}

/// The one file channel a session owns.
pub enum SessionChannel {
    Plain(PlainFile),
    Hashing(HashingFile),
}

impl SessionChannel {
    fn for_mode(path: &Path, mode: UploadMode) -> Self {
        match mode.algorithm() {
            Some(algorithm) => SessionChannel::Hashing(HashingFile::new(path, algorithm)),
            None => SessionChannel::Plain(PlainFile::new(path)),
        }
    }
}

impl FileChannel for SessionChannel {
    fn path(&self) -> &Path {
        match self {
            SessionChannel::Plain(f) => f.path(),
            SessionChannel::Hashing(f) => f.path(),
        }
    }

    async fn open(&mut self, mode: OpenMode) -> Result<(), FileError> {
        match self {
            SessionChannel::Plain(f) => f.open(mode).await,
            SessionChannel::Hashing(f) => f.open(mode).await,
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), FileError> {
        match self {
            SessionChannel::Plain(f) => f.write(data).await,
            SessionChannel::Hashing(f) => f.write(data).await,
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
        match self {
            SessionChannel::Plain(f) => f.read(buf).await,
            SessionChannel::Hashing(f) => f.read(buf).await,
        }
    }

    async fn close(&mut self) -> Result<(), FileError> {
        match self {
            SessionChannel::Plain(f) => f.close().await,
            SessionChannel::Hashing(f) => f.close().await,
        }
    }

    fn digest(&self) -> Option<&[u8]> {
        match self {
            SessionChannel::Plain(f) => f.digest(),
            SessionChannel::Hashing(f) => f.digest(),
        }
    }
}

/// One in-progress upload.
///
/// Created from a validated init message. The channel is opened for
/// truncating write on creation and must be closed on every exit path;
/// [`UploadSession::abort`] does that for the error paths.
pub struct UploadSession {
    path: PathBuf,
    mode: UploadMode,
    channel: SessionChannel,
    received: u64,
}

impl UploadSession {
    pub async fn open(path: PathBuf, mode: UploadMode) -> Result<Self, HandlerError> {
        let mut channel = SessionChannel::for_mode(&path, mode);
        channel.open(OpenMode::Write).await.map_err(|e| {
            HandlerError::file(&format!("failed to open file({})", path.display()), e)
        })?;
        Ok(Self {
            path,
            mode,
            channel,
            received: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    /// Payload bytes written so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Returns `true` once every declared byte has been written.
    pub fn is_complete(&self) -> bool {
        self.received >= self.mode.expected_size()
    }

    /// Writes one chunk, refusing anything past the declared size.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), HandlerError> {
        if data.is_empty() {
            return Ok(());
        }
        let expected = self.mode.expected_size();
        let total = self.received + data.len() as u64;
        if total > expected {
            return Err(HandlerError::protocol(format!(
                "chunk overflows declared size: {total} > {expected} bytes"
            )));
        }
        self.channel
            .write(data)
            .await
            .map_err(|e| HandlerError::file("failed to write chunk", e))?;
        self.received = total;
        Ok(())
    }

    /// Flushes and closes the file, finalizing the digest in hashing mode.
    pub async fn close(&mut self) -> Result<(), HandlerError> {
        self.channel
            .close()
            .await
            .map_err(|e| HandlerError::file("failed to close file", e))
    }

    /// Closes the file after a failure, keeping the original error.
    pub async fn abort(&mut self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!(path = %self.path.display(), error = %e, "close after failure");
        }
    }

    /// Server-computed digest, available after a successful close in
    /// hashing mode.
    pub fn digest(&self) -> Option<&[u8]> {
        self.channel.digest()
    }
}
