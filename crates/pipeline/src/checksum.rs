//! Chunk file checksums.

use crate::error::{PipelineError, PipelineResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUFFER: usize = 64 * 1024;

/// Base64 SHA-256 of `data`.
pub fn sha256_base64(data: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(data))
}

/// Base64 SHA-256 and length of a file, read in fixed-size slices.
pub async fn file_checksum(path: &Path) -> PipelineResult<(String, u64)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUFFER];
    let mut total = 0u64;
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((STANDARD.encode(hasher.finalize()), total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // SHA-256 of the empty string.
        assert_eq!(
            sha256_base64(b""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[tokio::test]
    async fn test_file_checksum_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-0.shas");
        let body = vec![b'x'; READ_BUFFER * 2 + 17];
        tokio::fs::write(&path, &body).await.unwrap();

        let (sum, len) = file_checksum(&path).await.unwrap();
        assert_eq!(sum, sha256_base64(&body));
        assert_eq!(len, body.len() as u64);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            file_checksum(&dir.path().join("nope")).await,
            Err(PipelineError::NotFound(_))
        ));
    }
}
