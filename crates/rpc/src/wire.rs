//! Frame format for upload calls over a byte stream.
//!
//! # Wire format
//!
//! ```text
//! FRAME: [4 bytes BE: body_len][body_len bytes: body]
//! BODY:  [4 bytes BE: header_len][header_len bytes: JSON header][rest: raw payload]
//! ```
//!
//! The JSON header is tagged by `"type"`: `init`, `chunk`, `finish`,
//! `writes_done`, `cancel` (client to server) and `status` (server to
//! client). Only `chunk` frames carry a payload.

use serde::{Deserialize, Serialize};
use streamftp_protocol::constants::MAX_FRAME_SIZE;
use streamftp_protocol::{
    Status, UploadChunk, UploadFinish, UploadInit, UploadRequest, UploadResponse,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RpcError;

/// One unit on the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(UploadRequest),
    /// Client half-close: no more requests follow.
    WritesDone,
    /// Client aborts the call.
    Cancel,
    /// Final answer of the server.
    Status {
        status: Status,
        response: Option<UploadResponse>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FrameHeader {
    Init(UploadInit),
    Chunk {
        offset: u64,
    },
    Finish(UploadFinish),
    WritesDone,
    Cancel,
    Status {
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<UploadResponse>,
    },
}

impl FrameHeader {
    fn name(&self) -> &'static str {
        match self {
            FrameHeader::Init(_) => "init",
            FrameHeader::Chunk { .. } => "chunk",
            FrameHeader::Finish(_) => "finish",
            FrameHeader::WritesDone => "writes_done",
            FrameHeader::Cancel => "cancel",
            FrameHeader::Status { .. } => "status",
        }
    }
}

/// Splits a frame into its JSON header and raw payload.
fn split(frame: &Frame) -> (FrameHeader, &[u8]) {
    match frame {
        Frame::Request(UploadRequest::Init(init)) => (FrameHeader::Init(init.clone()), &[]),
        Frame::Request(UploadRequest::Chunk(chunk)) => (
            FrameHeader::Chunk {
                offset: chunk.offset,
            },
            chunk.data.as_slice(),
        ),
        Frame::Request(UploadRequest::Finish(finish)) => {
            (FrameHeader::Finish(finish.clone()), &[])
        }
        Frame::WritesDone => (FrameHeader::WritesDone, &[]),
        Frame::Cancel => (FrameHeader::Cancel, &[]),
        Frame::Status { status, response } => (
            FrameHeader::Status {
                status: status.clone(),
                response: response.clone(),
            },
            &[],
        ),
    }
}

fn join(header: FrameHeader, payload: Vec<u8>) -> Result<Frame, RpcError> {
    if !payload.is_empty() && !matches!(header, FrameHeader::Chunk { .. }) {
        return Err(RpcError::Protocol(format!(
            "unexpected {} byte payload on {} frame",
            payload.len(),
            header.name()
        )));
    }

    Ok(match header {
        FrameHeader::Init(init) => Frame::Request(UploadRequest::Init(init)),
        FrameHeader::Chunk { offset } => Frame::Request(UploadRequest::Chunk(UploadChunk {
            offset,
            data: payload,
        })),
        FrameHeader::Finish(finish) => Frame::Request(UploadRequest::Finish(finish)),
        FrameHeader::WritesDone => Frame::WritesDone,
        FrameHeader::Cancel => Frame::Cancel,
        FrameHeader::Status { status, response } => Frame::Status { status, response },
    })
}

/// Encodes a frame, including its length prefix.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, RpcError> {
    let (header, payload) = split(frame);
    let header_json =
        serde_json::to_vec(&header).map_err(|e| RpcError::Protocol(e.to_string()))?;

    let body_len = 4 + header_json.len() + payload.len();
    if body_len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: body_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(4 + body_len);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    buf.extend_from_slice(&(header_json.len() as u32).to_be_bytes());
    buf.extend_from_slice(&header_json);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes a frame body (everything after the length prefix).
pub fn decode_body(body: Vec<u8>) -> Result<Frame, RpcError> {
    if body.len() < 4 {
        return Err(RpcError::Protocol(format!(
            "frame body too short: {} bytes",
            body.len()
        )));
    }

    let header_len = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
    if body.len() - 4 < header_len {
        return Err(RpcError::Protocol(format!(
            "header truncated: expected {header_len} bytes, got {}",
            body.len() - 4
        )));
    }

    let header: FrameHeader = serde_json::from_slice(&body[4..4 + header_len])
        .map_err(|e| RpcError::Protocol(format!("invalid header JSON: {e}")))?;
    let payload = body[4 + header_len..].to_vec();
    join(header, payload)
}

/// Writes a frame to the stream. The caller decides when to flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), RpcError> {
    let buf = encode_frame(frame)?;
    writer.write_all(&buf).await?;
    Ok(())
}

/// Reads the next frame.
///
/// Returns `None` on a clean end of stream at a frame boundary. End of
/// stream inside a frame is an I/O error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>, RpcError> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RpcError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        filled += n;
    }

    let body_len = u32::from_be_bytes(len_buf) as usize;
    if body_len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge {
            size: body_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;
    decode_body(body).map(Some)
}
