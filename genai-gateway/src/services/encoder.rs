//! Base64 encoding of stored uploads.

use crate::models::MediaPart;
use crate::services::upload::Upload;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use service_core::error::AppError;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Read size per step; a multiple of 3 so chunks encode without padding.
const CHUNK_SIZE: usize = 3 * 16 * 1024;

/// Encode an upload as an inline media part.
pub async fn encode_upload(upload: &Upload) -> Result<MediaPart, AppError> {
    let data = encode_file(upload.path()).await?;
    Ok(MediaPart {
        mime_type: upload.mime_type().to_string(),
        data,
    })
}

/// Base64-encode a file chunk by chunk into a single pre-sized string.
pub async fn encode_file(path: &Path) -> Result<String, AppError> {
    let mut file = File::open(path).await?;
    let len = file.metadata().await?.len() as usize;

    let mut encoded = String::with_capacity(base64::encoded_len(len, true).unwrap_or(0));
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let filled = fill(&mut file, &mut buf).await?;
        if filled == 0 {
            break;
        }
        STANDARD.encode_string(&buf[..filled], &mut encoded);
        if filled < buf.len() {
            break;
        }
    }

    Ok(encoded)
}

/// Read until `buf` is full or the file ends.
async fn fill(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
