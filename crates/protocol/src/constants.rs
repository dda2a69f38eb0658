use std::time::Duration;

/// Default TCP port for the upload service.
pub const DEFAULT_PORT: u16 = 50051;

/// Default payload size per chunk message (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Smallest chunk size a client may request.
pub const MIN_CHUNK_SIZE: usize = 1024;

/// Largest chunk size a client may request (4 MiB).
///
/// Kept well below [`MAX_FRAME_SIZE`] so a chunk frame plus its header
/// always fits in one frame.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Maximum body size of a single frame (64 MiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Timeout for the TCP connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the server keeps draining a rejected call's inbound frames
/// before closing the connection.
///
/// Draining lets the client read the final status instead of hitting a
/// connection reset while it is still streaming chunks.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Method name reported in call logs.
pub const UPLOAD_FILE_METHOD: &str = "/streamftp.FTPService/UploadFile";
