//! Client configuration.

use std::time::Duration;

use streamftp_protocol::HashAlgorithm;
use streamftp_protocol::constants::{
    CONNECT_TIMEOUT, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};

/// Tunables for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bytes per chunk message; clamped to the protocol limits.
    pub chunk_size: usize,
    /// Digest to negotiate. `Unspecified` disables verification.
    pub hash_algorithm: HashAlgorithm,
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            hash_algorithm: HashAlgorithm::Sha256,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl ClientOptions {
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
    }

    /// Algorithm to announce in the init message, if any.
    pub fn negotiated_algorithm(&self) -> Option<HashAlgorithm> {
        Some(self.hash_algorithm).filter(|a| a.is_specified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_clamped() {
        let mut options = ClientOptions::default();
        assert_eq!(options.effective_chunk_size(), 256 * 1024);

        options.chunk_size = 1;
        assert_eq!(options.effective_chunk_size(), MIN_CHUNK_SIZE);

        options.chunk_size = usize::MAX;
        assert_eq!(options.effective_chunk_size(), MAX_CHUNK_SIZE);
    }

    #[test]
    fn unspecified_disables_negotiation() {
        let mut options = ClientOptions::default();
        assert_eq!(options.negotiated_algorithm(), Some(HashAlgorithm::Sha256));
        options.hash_algorithm = HashAlgorithm::Unspecified;
        assert_eq!(options.negotiated_algorithm(), None);
    }
}
