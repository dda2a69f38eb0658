//! Client upload orchestrator.
//!
//! Drives one call through Init → Streaming → Finishing. Any failure before
//! the stream is half-closed cancels the call, then collects the server's
//! final status so the error carries both sides' view.

use std::path::Path;

use streamftp_hashing::{FileChannel, FileError, HashingFile, OpenMode, PlainFile};
use streamftp_protocol::{
    Digest, Status, UploadChunk, UploadFinish, UploadInit, UploadRequest, UploadResponse,
};
use streamftp_rpc::RequestWriter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::types::ClientOptions;

/// A failure detected before the stream was half-closed.
enum Failure {
    Local { detail: String, source: FileError },
    Send { detail: String, status: Status },
    Cancelled,
}

/// Streams `local` to `remote` over `call` and returns the server's response.
pub async fn send_file<W: RequestWriter>(
    call: &mut W,
    local: &Path,
    remote: &str,
    options: &ClientOptions,
    cancel: &CancellationToken,
) -> Result<UploadResponse, UploadError> {
    let local_digest = match stream_file(call, local, remote, options, cancel).await {
        Ok(digest) => digest,
        Err(failure) => return Err(abort(call, failure).await),
    };

    finish(call, local_digest).await
}

/// Creates or truncates `remote` without sending any payload.
pub async fn touch<W: RequestWriter>(call: &mut W, remote: &str) -> Result<UploadResponse, UploadError> {
    let init = UploadInit {
        path: remote.to_string(),
        size: None,
        hash_algorithm: None,
    };
    if let Err(status) = call.write(init.into()).await {
        let failure = Failure::Send {
            detail: "failed to send path".into(),
            status,
        };
        return Err(abort(call, failure).await);
    }
    finish(call, None).await
}

async fn finish<W: RequestWriter>(
    call: &mut W,
    local_digest: Option<Digest>,
) -> Result<UploadResponse, UploadError> {
    if let Err(status) = call.writes_done().await {
        debug!(%status, "half-close failed");
    }
    let response = call.finish().await.map_err(UploadError::Rejected)?;

    if let (Some(local), Some(remote)) = (&local_digest, &response.digest) {
        if local != remote {
            return Err(UploadError::HashMismatch {
                local: local.to_string(),
                remote: remote.to_string(),
            });
        }
    }
    info!(
        path = %response.metadata.path,
        size = response.metadata.size,
        "upload finished"
    );
    Ok(response)
}

/// Cancels the call and folds its final status into the error.
async fn abort<W: RequestWriter>(call: &mut W, failure: Failure) -> UploadError {
    call.cancel().await;
    let status = match call.finish().await {
        Err(status) => status,
        Ok(_) => Status::cancelled("call cancelled by client"),
    };
    let err = match failure {
        Failure::Local { detail, source } => UploadError::Local {
            detail,
            source,
            status,
        },
        // The final status explains a send failure better than the
        // transport error does.
        Failure::Send { detail, status: send_status } => UploadError::Send {
            detail,
            status: if status.code == streamftp_protocol::Code::Cancelled {
                send_status
            } else {
                status
            },
        },
        Failure::Cancelled => UploadError::Cancelled,
    };
    warn!(side = %err.side(), "upload failed: {err}");
    err
}

async fn stream_file<W: RequestWriter>(
    call: &mut W,
    local: &Path,
    remote: &str,
    options: &ClientOptions,
    cancel: &CancellationToken,
) -> Result<Option<Digest>, Failure> {
    // Init
    let size = tokio::fs::metadata(local)
        .await
        .map_err(|source| Failure::Local {
            detail: format!("failed to stat file({})", local.display()),
            source: FileError::Io {
                op: "stat",
                path: local.to_path_buf(),
                source,
            },
        })?
        .len();

    let algorithm = options.negotiated_algorithm();
    let init = UploadInit {
        path: remote.to_string(),
        size: Some(size),
        hash_algorithm: algorithm,
    };
    send(call, init.into(), "failed to send path").await?;
    info!(local = %local.display(), remote, size, ?algorithm, "upload started");

    // Streaming
    let digest = match algorithm {
        Some(algorithm) => {
            let mut channel = HashingFile::new(local, algorithm);
            send_chunks(call, &mut channel, options.effective_chunk_size(), cancel).await?;
            let data = channel.digest().ok_or_else(|| Failure::Local {
                detail: "failed to retrieve hash".into(),
                source: FileError::DigestUnavailable,
            })?;
            Some(Digest::new(algorithm, data.to_vec()))
        }
        None => {
            let mut channel = PlainFile::new(local);
            send_chunks(call, &mut channel, options.effective_chunk_size(), cancel).await?;
            None
        }
    };

    // Finishing
    let finish = UploadFinish {
        digest: digest.clone(),
    };
    send(call, finish.into(), "failed to send hash").await?;
    Ok(digest)
}

async fn send_chunks<W: RequestWriter, C: FileChannel>(
    call: &mut W,
    channel: &mut C,
    chunk_size: usize,
    cancel: &CancellationToken,
) -> Result<(), Failure> {
    channel.open(OpenMode::Read).await.map_err(local_failure(format!(
        "failed to open file({})",
        channel.path().display()
    )))?;

    let mut buf = vec![0u8; chunk_size];
    let mut offset = 0u64;
    loop {
        if cancel.is_cancelled() {
            release(channel).await;
            return Err(Failure::Cancelled);
        }

        let n = match channel.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                release(channel).await;
                return Err(local_failure("failed to read file")(e));
            }
        };
        if n > 0 {
            let chunk = UploadChunk {
                offset,
                data: buf[..n].to_vec(),
            };
            if let Err(failure) = send(call, chunk.into(), "failed to send chunk").await {
                release(channel).await;
                return Err(failure);
            }
            offset += n as u64;
        }
        if n < buf.len() {
            break;
        }
    }

    channel
        .close()
        .await
        .map_err(local_failure("failed to close file"))?;
    debug!(bytes = offset, "all chunks sent");
    Ok(())
}

/// Closes a channel on a failure path; the original failure wins.
async fn release<C: FileChannel>(channel: &mut C) {
    if let Err(e) = channel.close().await {
        debug!(path = %channel.path().display(), error = %e, "close after failure");
    }
}

fn local_failure(detail: impl Into<String>) -> impl FnOnce(FileError) -> Failure {
    let detail = detail.into();
    move |source| Failure::Local { detail, source }
}

async fn send<W: RequestWriter>(
    call: &mut W,
    request: UploadRequest,
    detail: &str,
) -> Result<(), Failure> {
    call.write(request).await.map_err(|status| Failure::Send {
        detail: detail.to_string(),
        status,
    })
}
