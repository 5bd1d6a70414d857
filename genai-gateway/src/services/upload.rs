//! Multipart upload intake.
//!
//! Each media request streams its file into the scratch directory under a
//! fresh UUID name. The returned [`Upload`] owns that file: it is removed by
//! [`Upload::discard`] or, failing that, when the guard is dropped.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Optional text field carrying the instruction for media endpoints.
pub const PROMPT_FIELD: &str = "prompt";

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A file received for the current request.
#[derive(Debug)]
pub struct Upload {
    path: PathBuf,
    mime_type: String,
    size: u64,
    released: bool,
}

impl Upload {
    /// Take ownership of an existing scratch file.
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
            size: 0,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the scratch file now.
    pub async fn discard(mut self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove upload"
            ),
        }
        self.released = true;
    }
}

impl Drop for Upload {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove upload on drop"
                );
            }
        }
    }
}

/// Fields collected from a media request.
#[derive(Debug, Default)]
pub struct MediaForm {
    pub prompt: Option<String>,
    pub upload: Option<Upload>,
}

/// Writes multipart files into the scratch directory.
#[derive(Debug, Clone)]
pub struct UploadReceiver {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadReceiver {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Create the scratch directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub async fn is_ready(&self) -> bool {
        fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Read the whole form, storing at most one file for `file_field`.
    ///
    /// A part named `file_field` without a filename is a plain form value, not
    /// a file, and is skipped.
    pub async fn receive_form(
        &self,
        multipart: &mut Multipart,
        file_field: &str,
    ) -> Result<MediaForm, AppError> {
        let mut form = MediaForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == file_field && field.file_name().is_some() {
                if form.upload.is_some() {
                    return Err(AppError::BadRequest(format!(
                        "Only one {} file is allowed",
                        file_field
                    )));
                }
                form.upload = Some(self.store(field, file_field).await?);
            } else if name == file_field {
                tracing::debug!(field = %name, "Ignoring form value without a filename");
            } else if name == PROMPT_FIELD {
                form.prompt = Some(field.text().await.map_err(multipart_error)?);
            } else {
                tracing::debug!(field = %name, "Ignoring unexpected multipart field");
            }
        }

        Ok(form)
    }

    async fn store(&self, mut field: Field<'_>, file_field: &str) -> Result<Upload, AppError> {
        let extension = field.file_name().and_then(file_extension);
        let mime_type = resolve_mime_type(field.content_type(), extension.as_deref());
        let path = self.dir.join(stored_file_name(extension.as_deref()));

        // Guard first so a failed write never leaves a partial file behind.
        let mut upload = Upload::new(path, mime_type);
        let mut file = fs::File::create(&upload.path).await?;

        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            upload.size += chunk.len() as u64;
            if upload.size > self.max_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "{} file exceeds the {} byte limit",
                    file_field, self.max_bytes
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        metrics::histogram!("genai_upload_bytes", "field" => file_field.to_string())
            .record(upload.size as f64);
        tracing::info!(
            field = %file_field,
            path = %upload.path.display(),
            mime_type = %upload.mime_type,
            size = upload.size,
            "Upload stored"
        );

        Ok(upload)
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Lower-cased extension of a client file name, if short and alphanumeric.
fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 16)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

fn stored_file_name(extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// Declared part type, or a guess from the extension when the client sent none.
fn resolve_mime_type(declared: Option<&str>, extension: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != FALLBACK_MIME_TYPE => mime.to_string(),
        _ => extension
            .map(mime_type_for_extension)
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string(),
    }
}

fn mime_type_for_extension(ext: &str) -> &'static str {
    match ext {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "aiff" => "audio/aiff",

        // Documents
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "xml" => "text/xml",
        "json" => "application/json",

        _ => FALLBACK_MIME_TYPE,
    }
}
