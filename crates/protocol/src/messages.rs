use serde::{Deserialize, Serialize};

use crate::types::{Digest, FileMetaData, HashAlgorithm};

// ---------------------------------------------------------------------------
// Request stream (client -> server)
// ---------------------------------------------------------------------------

/// First message of an upload: where to write and what to expect.
///
/// `size == None` requests a touch-only upload (zero-length create, no
/// payload). `hash_algorithm == None` disables end-to-end verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInit {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<HashAlgorithm>,
}

/// One slice of file payload.
///
/// `offset` is informational; the server orders bytes by arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk {
    pub offset: u64,
    pub data: Vec<u8>,
}

/// Last message of an upload, carrying the client's digest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadFinish {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

/// One message of the client-streaming upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRequest {
    Init(UploadInit),
    Chunk(UploadChunk),
    Finish(UploadFinish),
}

impl UploadRequest {
    /// Short variant name for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadRequest::Init(_) => "init",
            UploadRequest::Chunk(_) => "chunk",
            UploadRequest::Finish(_) => "finish",
        }
    }
}

impl From<UploadInit> for UploadRequest {
    fn from(init: UploadInit) -> Self {
        UploadRequest::Init(init)
    }
}

impl From<UploadChunk> for UploadRequest {
    fn from(chunk: UploadChunk) -> Self {
        UploadRequest::Chunk(chunk)
    }
}

impl From<UploadFinish> for UploadRequest {
    fn from(finish: UploadFinish) -> Self {
        UploadRequest::Finish(finish)
    }
}

// ---------------------------------------------------------------------------
// Response (server -> client)
// ---------------------------------------------------------------------------

/// The single response of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub metadata: FileMetaData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

/// Serializes byte vectors as lowercase hex strings.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        hex::encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_omits_absent_fields() {
        let init = UploadInit {
            path: "/tmp/a".into(),
            size: None,
            hash_algorithm: None,
        };
        let json = serde_json::to_string(&init).unwrap();
        assert_eq!(json, r#"{"path":"/tmp/a"}"#);
    }

    #[test]
    fn init_field_names() {
        let init = UploadInit {
            path: "/tmp/a".into(),
            size: Some(42),
            hash_algorithm: Some(HashAlgorithm::Sha512),
        };
        let json = serde_json::to_string(&init).unwrap();
        assert!(json.contains("\"hashAlgorithm\":\"sha512\""));
        assert!(json.contains("\"size\":42"));
        let parsed: UploadInit = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, init);
    }

    #[test]
    fn finish_without_digest_is_empty_object() {
        let json = serde_json::to_string(&UploadFinish::default()).unwrap();
        assert_eq!(json, "{}");
        let parsed: UploadFinish = serde_json::from_str("{}").unwrap();
        assert!(parsed.digest.is_none());
    }

    #[test]
    fn hex_rejects_garbage() {
        let json = r#"{"digest":{"algorithm":"sha256","data":"zz"}}"#;
        assert!(serde_json::from_str::<UploadFinish>(json).is_err());
    }

    #[test]
    fn request_kind_names() {
        let chunk: UploadRequest = UploadChunk {
            offset: 0,
            data: vec![1],
        }
        .into();
        assert_eq!(chunk.kind(), "chunk");
        assert_eq!(UploadRequest::from(UploadFinish::default()).kind(), "finish");
    }
}
