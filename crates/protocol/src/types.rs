use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Digest algorithm negotiated for end-to-end verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "sha512")]
    Sha512,
}

impl HashAlgorithm {
    /// Fixed digest length in bytes (0 for [`HashAlgorithm::Unspecified`]).
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Unspecified => 0,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Returns `true` for algorithms that actually produce a digest.
    pub fn is_specified(self) -> bool {
        self != HashAlgorithm::Unspecified
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Unspecified => "unspecified",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hash algorithm: {0}")]
pub struct ParseAlgorithmError(pub String);

impl FromStr for HashAlgorithm {
    type Err = ParseAlgorithmError;

    /// Accepts `sha256`, `sha512` and `none`/`unspecified` (case-insensitive,
    /// dashes ignored so `SHA-256` works too).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "");
        match normalized.as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "none" | "unspecified" => Ok(HashAlgorithm::Unspecified),
            _ => Err(ParseAlgorithmError(s.to_string())),
        }
    }
}

/// A digest descriptor: algorithm plus raw digest bytes.
///
/// The byte length must equal [`HashAlgorithm::digest_len`]; use
/// [`Digest::validate`] before trusting a descriptor received from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub algorithm: HashAlgorithm,
    #[serde(with = "crate::messages::hex_bytes")]
    pub data: Vec<u8>,
}

/// Why a digest descriptor is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    #[error("digest length {actual} does not match {algorithm} (expects {expected} bytes)")]
    LengthMismatch {
        algorithm: HashAlgorithm,
        expected: usize,
        actual: usize,
    },
}

impl Digest {
    pub fn new(algorithm: HashAlgorithm, data: Vec<u8>) -> Self {
        Self { algorithm, data }
    }

    /// Checks the length invariant (unspecified implies empty bytes).
    pub fn validate(&self) -> Result<(), DigestError> {
        let expected = self.algorithm.digest_len();
        if self.data.len() != expected {
            return Err(DigestError::LengthMismatch {
                algorithm: self.algorithm,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Lowercase hex rendering of the digest bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Filesystem attributes of a persisted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetaData {
    pub path: String,
    pub size: u64,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
    pub access_time: DateTime<Utc>,
}

impl fmt::Display for FileMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path:  {}", self.path)?;
        writeln!(f, "size:  {}", self.size)?;
        writeln!(f, "ctime: {}", self.create_time.to_rfc3339())?;
        writeln!(f, "mtime: {}", self.modify_time.to_rfc3339())?;
        write!(f, "atime: {}", self.access_time.to_rfc3339())
    }
}
