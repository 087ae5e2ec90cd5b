//! Building the body and headers written for one candidate.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use symstash_common::{GZIP_CONTENT_ENCODING, METADATA_ORIGINAL_MD5_HASH, METADATA_ORIGINAL_SIZE};

use crate::error::StorageError;
use crate::traits::PutObjectRequest;
use crate::types::{FileCandidate, UploadSettings};

/// Body, headers and metadata ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPayload {
    /// Bytes to store; gzip-encoded for compressed keys.
    pub body: Vec<u8>,
    /// `gzip` for compressed keys.
    pub content_encoding: Option<String>,
    /// Content type from the extension overrides.
    pub content_type: Option<String>,
    /// `original_size` and `original_md5_hash`.
    pub metadata: HashMap<String, String>,
}

impl PreparedPayload {
    /// Number of bytes that will be stored.
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    /// Convert into a storage request.
    pub fn into_request(self) -> PutObjectRequest {
        PutObjectRequest {
            body: self.body,
            content_encoding: self.content_encoding,
            content_type: self.content_type,
            metadata: self.metadata,
        }
    }
}

/// Read a candidate from disk and prepare what gets written for it.
///
/// Compression runs on the blocking thread pool.
///
/// # Errors
/// Returns `StorageError::IoError` if the file cannot be read or encoded.
pub async fn prepare_payload(
    candidate: &FileCandidate,
    settings: &UploadSettings,
) -> Result<PreparedPayload, StorageError> {
    let path: String = candidate.local_path.display().to_string();
    let raw: Vec<u8> = tokio::fs::read(&candidate.local_path)
        .await
        .map_err(|e| StorageError::IoError {
            path: path.clone(),
            message: e.to_string(),
        })?;

    let (body, content_encoding): (Vec<u8>, Option<String>) = if candidate.compressed {
        let encoded: Vec<u8> = tokio::task::spawn_blocking(move || gzip_bytes(&raw))
            .await
            .map_err(|e| StorageError::Other {
                message: format!("Compression task failed for {}: {}", path, e),
            })?
            .map_err(|e| StorageError::IoError {
                path,
                message: e.to_string(),
            })?;
        (encoded, Some(GZIP_CONTENT_ENCODING.to_string()))
    } else {
        (raw, None)
    };

    Ok(PreparedPayload {
        body,
        content_encoding,
        content_type: settings.content_type_for(&candidate.name).map(str::to_string),
        metadata: integrity_metadata(candidate),
    })
}

/// Gzip-encode a buffer.
pub fn gzip_bytes(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder: GzEncoder<Vec<u8>> = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Metadata attached to every write so later decisions can skip by hash.
pub fn integrity_metadata(candidate: &FileCandidate) -> HashMap<String, String> {
    HashMap::from([
        (
            METADATA_ORIGINAL_SIZE.to_string(),
            candidate.local_size.to_string(),
        ),
        (
            METADATA_ORIGINAL_MD5_HASH.to_string(),
            candidate.local_content_hash.clone(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::path::Path;
    use symstash_common::md5_bytes;
    use tempfile::TempDir;

    fn write_candidate(dir: &Path, name: &str, content: &[u8], compressed: bool) -> FileCandidate {
        let path = dir.join(name.replace('/', "_"));
        std::fs::write(&path, content).unwrap();
        FileCandidate {
            name: name.to_string(),
            storage_key: format!("v0/{}", name),
            local_path: path,
            local_size: content.len() as u64,
            local_content_hash: md5_bytes(content),
            compressed,
        }
    }

    #[tokio::test]
    async fn test_compressed_payload() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = b"MODULE windows x86 ABC xpcshell.pdb\n".repeat(100);
        let candidate = write_candidate(dir.path(), "xpcshell.pdb/ABC/xpcshell.sym", &content, true);

        let payload = prepare_payload(&candidate, &UploadSettings::default()).await.unwrap();

        assert_eq!(payload.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(payload.content_type.as_deref(), Some("text/plain"));
        assert!(payload.size() < content.len() as u64);

        let mut decoded: Vec<u8> = Vec::new();
        GzDecoder::new(payload.body.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, content);

        assert_eq!(
            payload.metadata[METADATA_ORIGINAL_SIZE],
            content.len().to_string()
        );
        assert_eq!(payload.metadata[METADATA_ORIGINAL_MD5_HASH], md5_bytes(&content));
    }

    #[tokio::test]
    async fn test_uncompressed_payload_without_content_type() {
        let dir = TempDir::new().unwrap();
        let candidate = write_candidate(dir.path(), "foo/ABC/foo.dll", b"MZ\x90\x00", false);

        let payload = prepare_payload(&candidate, &UploadSettings::default()).await.unwrap();

        assert_eq!(payload.body, b"MZ\x90\x00");
        assert!(payload.content_encoding.is_none());
        assert!(payload.content_type.is_none());
        assert_eq!(payload.metadata[METADATA_ORIGINAL_SIZE], "4");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let candidate = FileCandidate {
            name: "a/b/c.sym".into(),
            storage_key: "v0/a/b/c.sym".into(),
            local_path: "/nonexistent/c.sym".into(),
            local_size: 1,
            local_content_hash: "x".into(),
            compressed: true,
        };
        let err = prepare_payload(&candidate, &UploadSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::IoError { .. }));
    }

    #[test]
    fn test_into_request() {
        let payload = PreparedPayload {
            body: vec![1, 2, 3],
            content_encoding: Some("gzip".into()),
            content_type: None,
            metadata: HashMap::new(),
        };
        let request: PutObjectRequest = payload.into_request();
        assert_eq!(request.body, vec![1, 2, 3]);
        assert_eq!(request.content_encoding.as_deref(), Some("gzip"));
    }
}
