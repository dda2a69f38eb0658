//! Upload call handler.
//!
//! Consumes one inbound request stream and walks it through
//! AwaitInit → Receiving → AwaitFinish → Verifying → Complete, rejecting the
//! call with a typed [`HandlerError`] at the first violation.

use std::path::{Path, PathBuf};

use streamftp_protocol::{
    Digest, HashAlgorithm, UploadFinish, UploadInit, UploadRequest, UploadResponse,
};
use streamftp_rpc::RequestReader;
use tracing::{debug, info, warn};

use crate::metadata::file_metadata;
use crate::session::{UploadMode, UploadSession};
use crate::validation::validate_target;
use crate::{HandlerError, ServerError};

/// Serves `UploadFile` calls below a root directory.
#[derive(Debug, Clone)]
pub struct UploadService {
    root: PathBuf,
}

impl UploadService {
    /// Creates a service for `root_dir`, which must be an existing directory.
    pub fn new(root_dir: impl AsRef<Path>) -> Result<Self, ServerError> {
        let root_dir = root_dir.as_ref();
        if !root_dir.is_dir() {
            return Err(ServerError::InvalidRoot(root_dir.to_path_buf()));
        }
        let root = std::fs::canonicalize(root_dir)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handles one upload call to completion.
    pub async fn upload_file<R: RequestReader>(
        &self,
        reader: &mut R,
    ) -> Result<UploadResponse, HandlerError> {
        let init = await_init(reader).await?;
        let path = validate_target(&self.root, &init.path)?;
        let mode = UploadMode::from_init(&init)?;

        let mut session = UploadSession::open(path, mode).await?;
        info!(path = %session.path().display(), ?mode, "file opened");

        match receive(reader, &mut session).await {
            Ok(response) => {
                info!(
                    path = %response.metadata.path,
                    size = response.metadata.size,
                    digest = ?response.digest.as_ref().map(Digest::to_hex),
                    "upload complete"
                );
                Ok(response)
            }
            Err(e) => {
                warn!(path = %session.path().display(), received = session.received(), error = %e, "upload rejected");
                session.abort().await;
                Err(e)
            }
        }
    }
}

async fn next<R: RequestReader>(reader: &mut R) -> Result<Option<UploadRequest>, HandlerError> {
    reader.read().await.map_err(HandlerError::Stream)
}

async fn await_init<R: RequestReader>(reader: &mut R) -> Result<UploadInit, HandlerError> {
    match next(reader).await? {
        Some(UploadRequest::Init(init)) => Ok(init),
        Some(other) => Err(HandlerError::protocol(format!(
            "first message must be init, got {}",
            other.kind()
        ))),
        None => Err(HandlerError::protocol("stream ended before init")),
    }
}

async fn receive<R: RequestReader>(
    reader: &mut R,
    session: &mut UploadSession,
) -> Result<UploadResponse, HandlerError> {
    let mode = session.mode();
    let expected = mode.expected_size();

    while !session.is_complete() {
        match next(reader).await? {
            Some(UploadRequest::Chunk(chunk)) => {
                debug!(offset = chunk.offset, len = chunk.data.len(), "chunk");
                session.write_chunk(&chunk.data).await?;
            }
            Some(other) => {
                return Err(HandlerError::protocol(format!(
                    "unexpected {} after {} of {expected} bytes",
                    other.kind(),
                    session.received()
                )));
            }
            None => {
                return Err(HandlerError::protocol(format!(
                    "stream ended before receiving filesize bytes ({} of {expected})",
                    session.received()
                )));
            }
        }
    }
    session.close().await?;

    let digest = match mode.algorithm() {
        Some(algorithm) => {
            let client = await_finish(reader).await?;
            Some(verify_digest(session, algorithm, client)?)
        }
        None => {
            await_optional_finish(reader).await?;
            None
        }
    };

    let metadata = file_metadata(session.path()).await.map_err(|e| {
        HandlerError::Io(format!("failed to stat {}: {e}", session.path().display()))
    })?;
    if digest.is_none() && metadata.size != expected {
        return Err(HandlerError::integrity(format!(
            "size on disk {} does not match declared size {expected}",
            metadata.size
        )));
    }

    Ok(UploadResponse { metadata, digest })
}

/// Reads the finish message and confirms nothing follows it.
async fn await_finish<R: RequestReader>(reader: &mut R) -> Result<UploadFinish, HandlerError> {
    let finish = match next(reader).await? {
        Some(UploadRequest::Finish(finish)) => finish,
        Some(other) => {
            return Err(HandlerError::protocol(format!(
                "expected finish after all bytes, got {}",
                other.kind()
            )));
        }
        None => return Err(HandlerError::protocol("stream ended without finish")),
    };
    expect_end(reader).await?;
    Ok(finish)
}

/// Without verification the finish message is optional, but if present it
/// must be last and must not carry a digest.
async fn await_optional_finish<R: RequestReader>(reader: &mut R) -> Result<(), HandlerError> {
    match next(reader).await? {
        None => Ok(()),
        Some(UploadRequest::Finish(finish)) => {
            if finish
                .digest
                .is_some_and(|d| d.algorithm.is_specified() || !d.data.is_empty())
            {
                return Err(HandlerError::protocol(
                    "finish carries a digest but hashing was not negotiated",
                ));
            }
            expect_end(reader).await
        }
        Some(other) => Err(HandlerError::protocol(format!(
            "unexpected {} after all bytes",
            other.kind()
        ))),
    }
}

async fn expect_end<R: RequestReader>(reader: &mut R) -> Result<(), HandlerError> {
    match next(reader).await? {
        None => Ok(()),
        Some(other) => Err(HandlerError::protocol(format!(
            "unexpected {} after finish",
            other.kind()
        ))),
    }
}

fn verify_digest(
    session: &UploadSession,
    algorithm: HashAlgorithm,
    finish: UploadFinish,
) -> Result<Digest, HandlerError> {
    let client = finish
        .digest
        .ok_or_else(|| HandlerError::protocol("finish carries no digest"))?;

    if client.algorithm != algorithm {
        return Err(HandlerError::protocol(format!(
            "incompatible hash type: negotiated {algorithm}, finish carries {}",
            client.algorithm
        )));
    }
    client
        .validate()
        .map_err(|e| HandlerError::protocol(format!("incompatible hash size: {e}")))?;

    let server = session
        .digest()
        .ok_or_else(|| HandlerError::integrity("failed to retrieve hash"))?;
    if server != client.data.as_slice() {
        return Err(HandlerError::integrity(format!(
            "hash value does not match: client {}, server {}",
            client.to_hex(),
            hex::encode(server)
        )));
    }

    Ok(Digest::new(algorithm, server.to_vec()))
}
