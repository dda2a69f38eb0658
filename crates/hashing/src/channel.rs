use std::future::Future;
use std::path::{Path, PathBuf};

use streamftp_protocol::HashAlgorithm;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::FileError;
use crate::hasher::Hasher;

/// How a channel opens its backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read-only.
    Read,
    /// Create or truncate, write-only.
    Write,
}

/// Capability set shared by plain and hashing file channels.
pub trait FileChannel: Send {
    /// Path of the backing file.
    fn path(&self) -> &Path;

    /// Opens (or reopens) the backing file.
    fn open(&mut self, mode: OpenMode) -> impl Future<Output = Result<(), FileError>> + Send;

    /// Writes all of `data`. Empty input is a no-op.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), FileError>> + Send;

    /// Fills `buf` as far as the file allows and returns the byte count.
    ///
    /// A count smaller than `buf.len()` means end of file was reached;
    /// `Ok(0)` is the normal terminal signal.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, FileError>> + Send;

    /// Flushes and releases the backing file. Closing a closed channel is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<(), FileError>> + Send;

    /// Finalized digest, available only after a successful close of a
    /// hashing channel.
    fn digest(&self) -> Option<&[u8]> {
        None
    }
}

// ---------------------------------------------------------------------------
// PlainFile
// ---------------------------------------------------------------------------

/// File channel without hashing.
pub struct PlainFile {
    path: PathBuf,
    file: Option<File>,
}

impl PlainFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn io_error(&self, op: &'static str, source: std::io::Error) -> FileError {
        FileError::Io {
            op,
            path: self.path.clone(),
            source,
        }
    }
}

impl FileChannel for PlainFile {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&mut self, mode: OpenMode) -> Result<(), FileError> {
        if self.file.is_some() {
            self.close().await?;
        }

        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
        };
        let file = options
            .open(&self.path)
            .await
            .map_err(|e| self.io_error("open", e))?;
        self.file = Some(file);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), FileError> {
        let Self { path, file } = self;
        let file = file.as_mut().ok_or(FileError::NotOpen { op: "write" })?;
        if data.is_empty() {
            return Ok(());
        }
        file.write_all(data).await.map_err(|source| FileError::Io {
            op: "write",
            path: path.clone(),
            source,
        })
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
        let Self { path, file } = self;
        let file = file.as_mut().ok_or(FileError::NotOpen { op: "read" })?;

        let mut filled = 0;
        while filled < buf.len() {
            let n = file
                .read(&mut buf[filled..])
                .await
                .map_err(|source| FileError::Io {
                    op: "read",
                    path: path.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    async fn close(&mut self) -> Result<(), FileError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        // tokio completes writes in the background; flush waits for them.
        file.flush().await.map_err(|e| self.io_error("close", e))?;
        drop(file);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HashingFile
// ---------------------------------------------------------------------------

/// File channel that feeds every transferred byte into a [`Hasher`].
///
/// Bytes are hashed only after they were written or read successfully, in
/// transfer order.
pub struct HashingFile {
    file: PlainFile,
    hasher: Hasher,
    digest: Option<Vec<u8>>,
}

impl HashingFile {
    pub fn new(path: impl Into<PathBuf>, algorithm: HashAlgorithm) -> Self {
        Self {
            file: PlainFile::new(path),
            hasher: Hasher::new(algorithm),
            digest: None,
        }
    }
}

impl FileChannel for HashingFile {
    fn path(&self) -> &Path {
        self.file.path()
    }

    async fn open(&mut self, mode: OpenMode) -> Result<(), FileError> {
        self.digest = None;
        self.file.open(mode).await?;

        self.hasher = Hasher::new(self.hasher.algorithm());
        if let Err(e) = self.hasher.initialize() {
            warn!(path = %self.file.path().display(), error = %e, "digest init failed, closing file");
            let _ = self.file.close().await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), FileError> {
        self.file.write(data).await?;
        self.hasher.update(data)?;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, FileError> {
        let n = self.file.read(buf).await?;
        if n > 0 {
            self.hasher.update(&buf[..n])?;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), FileError> {
        if !self.file.is_open() {
            return Ok(());
        }
        let digest = match self.hasher.finalize() {
            Ok(d) => d,
            Err(e) => {
                let _ = self.file.close().await;
                return Err(e.into());
            }
        };
        self.file.close().await?;
        debug!(
            path = %self.file.path().display(),
            algorithm = %self.hasher.algorithm(),
            digest = %hex::encode(&digest),
            "digest finalized"
        );
        self.digest = Some(digest);
        Ok(())
    }

    fn digest(&self) -> Option<&[u8]> {
        self.digest.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{ERR_UNSUPPORTED, digest_bytes};
    use tempfile::TempDir;

    #[tokio::test]
    async fn plain_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.bin");

        let mut f = PlainFile::new(&path);
        f.open(OpenMode::Write).await.unwrap();
        f.write(b"Hello").await.unwrap();
        f.write(b"").await.unwrap();
        f.write(b" World").await.unwrap();
        f.close().await.unwrap();
        assert!(f.digest().is_none());

        assert_eq!(std::fs::read(&path).unwrap(), b"Hello World");

        let mut f = PlainFile::new(&path);
        f.open(OpenMode::Read).await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"Hell");
        let mut big = [0u8; 32];
        assert_eq!(f.read(&mut big).await.unwrap(), 7);
        assert_eq!(f.read(&mut big).await.unwrap(), 0);
        f.close().await.unwrap();
    }

    #[tokio::test]
    async fn write_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.bin");
        std::fs::write(&path, b"previous longer content").unwrap();

        let mut f = PlainFile::new(&path);
        f.open(OpenMode::Write).await.unwrap();
        f.write(b"new").await.unwrap();
        f.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn operations_on_closed_channel_fail() {
        let mut f = PlainFile::new("/nonexistent/never-opened");
        let err = f.write(b"x").await.unwrap_err();
        assert!(matches!(err, FileError::NotOpen { op: "write" }));
        let mut buf = [0u8; 1];
        assert!(f.read(&mut buf).await.is_err());
        // Closing a closed channel is fine.
        f.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_missing_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.bin");
        let mut f = PlainFile::new(&path);
        let err = f.open(OpenMode::Read).await.unwrap_err();
        assert!(err.to_string().contains("missing.bin"), "{err}");
        assert!(err.code() > 0);
    }

    #[tokio::test]
    async fn hashing_write_matches_one_shot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hashed.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let mut f = HashingFile::new(&path, HashAlgorithm::Sha256);
        f.open(OpenMode::Write).await.unwrap();
        for chunk in data.chunks(777) {
            f.write(chunk).await.unwrap();
        }
        assert!(f.digest().is_none(), "digest must not exist before close");
        f.close().await.unwrap();

        let expected = digest_bytes(HashAlgorithm::Sha256, &data).unwrap();
        assert_eq!(f.digest().unwrap(), expected.as_slice());
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[tokio::test]
    async fn failed_write_is_not_hashed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readonly.bin");
        std::fs::write(&path, b"abc").unwrap();

        let mut f = HashingFile::new(&path, HashAlgorithm::Sha256);
        f.open(OpenMode::Read).await.unwrap();
        let err = f.write(b"zzz").await.unwrap_err();
        assert!(matches!(err, FileError::Io { op: "write", .. }), "{err}");

        let mut buf = [0u8; 16];
        assert_eq!(f.read(&mut buf).await.unwrap(), 3);
        f.close().await.unwrap();

        let expected = digest_bytes(HashAlgorithm::Sha256, b"abc").unwrap();
        assert_eq!(f.digest().unwrap(), expected.as_slice());
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn hashing_read_hashes_only_returned_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("read.bin");
        let data = vec![0x5Au8; 1000];
        std::fs::write(&path, &data).unwrap();

        let mut f = HashingFile::new(&path, HashAlgorithm::Sha512);
        f.open(OpenMode::Read).await.unwrap();
        let mut buf = vec![0u8; 300];
        let mut total = 0;
        loop {
            let n = f.read(&mut buf).await.unwrap();
            total += n;
            if n < buf.len() {
                break;
            }
        }
        assert_eq!(total, 1000);
        f.close().await.unwrap();

        let expected = digest_bytes(HashAlgorithm::Sha512, &data).unwrap();
        assert_eq!(f.digest().unwrap(), expected.as_slice());
    }

    #[tokio::test]
    async fn hashing_open_with_unsupported_algorithm_closes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.bin");

        let mut f = HashingFile::new(&path, HashAlgorithm::Unspecified);
        let err = f.open(OpenMode::Write).await.unwrap_err();
        assert_eq!(err.code(), ERR_UNSUPPORTED);
        assert!(!f.file.is_open());
        // The file was created before the hasher failed.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopen_resets_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("again.bin");

        let mut f = HashingFile::new(&path, HashAlgorithm::Sha256);
        f.open(OpenMode::Write).await.unwrap();
        f.write(b"first").await.unwrap();
        f.close().await.unwrap();
        assert!(f.digest().is_some());

        f.open(OpenMode::Write).await.unwrap();
        assert!(f.digest().is_none());
        f.write(b"second").await.unwrap();
        f.close().await.unwrap();
        let expected = digest_bytes(HashAlgorithm::Sha256, b"second").unwrap();
        assert_eq!(f.digest().unwrap(), expected.as_slice());
    }
}
