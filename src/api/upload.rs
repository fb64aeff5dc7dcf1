//! Upload API endpoints
//!
//! Handles PDF uploads for saved articles:
//! - POST /v1/upload/pdf?id=<articleId> - multipart field `pdf`
//!
//! Files are stored as `<unix-millis>.pdf` in the upload directory and served
//! back under `/v1/uploads/`.

use axum::{
    extract::{Multipart, Query, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::api::error::AppError;
use crate::api::middleware::{AppState, AuthenticatedUser};

/// Multipart field carrying the file
const FILE_FIELD: &str = "pdf";

const PDF_MAGIC: &[u8] = b"%PDF";

/// Content types browsers and the extension send for PDFs
const PDF_CONTENT_TYPES: &[&str] = &["application/pdf", "application/x-pdf", "application/octet-stream"];

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub id: Option<String>,
}

/// Response for successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
}

/// Build the upload router
pub fn router() -> Router<AppState> {
    Router::new().route("/pdf", post(upload_pdf))
}

/// POST /v1/upload/pdf?id=<articleId>
///
/// Requires authentication. The article must belong to the caller.
async fn upload_pdf(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let article_id = query
        .id
        .as_deref()
        .map(str::trim)
        .and_then(|id| id.parse::<i64>().ok())
        .ok_or_else(|| AppError::bad_request("Article id is required"))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_ascii_lowercase);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        upload = Some((content_type, data));
        break;
    }

    let (content_type, data) = upload
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| AppError::bad_request("No file uploaded"))?;
    if !is_pdf(content_type.as_deref(), &data) {
        return Err(AppError::bad_request("Only PDF files are allowed"));
    }

    // Ownership check before anything touches the disk
    state.article_service.get(article_id, user.id).await?;

    let dir = &state.config.upload.path;
    ensure_upload_dir(dir).await?;
    let (filename, path) = write_unique(dir, &data).await?;

    if let Err(err) = state
        .article_service
        .attach_file(article_id, user.id, &filename)
        .await
    {
        if let Err(remove_err) = fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %remove_err, "Failed to remove orphaned upload");
        }
        return Err(err.into());
    }

    tracing::info!(article_id, user_id = user.id, filename = %filename, size = data.len(), "PDF uploaded");
    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        filename,
    }))
}

/// PDF magic bytes, and a PDF-compatible content type when one is given
fn is_pdf(content_type: Option<&str>, data: &[u8]) -> bool {
    let type_ok = content_type
        .map(|ct| ct.split(';').next().unwrap_or_default().trim())
        .map(|ct| PDF_CONTENT_TYPES.contains(&ct))
        .unwrap_or(true);
    type_ok && data.starts_with(PDF_MAGIC)
}

async fn ensure_upload_dir(path: &Path) -> Result<(), AppError> {
    fs::create_dir_all(path).await.map_err(|e| {
        AppError::Internal(anyhow::anyhow!(
            "Failed to create upload directory {}: {}",
            path.display(),
            e
        ))
    })
}

/// Write `data` to `<unix-millis>.pdf`, never replacing an existing file
async fn write_unique(dir: &Path, data: &[u8]) -> Result<(String, PathBuf), AppError> {
    let mut millis = chrono::Utc::now().timestamp_millis();
    loop {
        let filename = format!("{}.pdf", millis);
        let path = dir.join(&filename);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(data).await.map_err(save_failed)?;
                file.flush().await.map_err(save_failed)?;
                return Ok((filename, path));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
            Err(e) => return Err(save_failed(e)),
        }
    }
}

fn save_failed(err: std::io::Error) -> AppError {
    AppError::Internal(anyhow::Error::new(err).context("Failed to save file"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        let pdf = b"%PDF-1.7\n...";
        assert!(is_pdf(Some("application/pdf"), pdf));
        assert!(is_pdf(None, pdf));
        assert!(is_pdf(Some("application/octet-stream"), pdf));
        assert!(!is_pdf(Some("image/png"), pdf));
        assert!(!is_pdf(Some("application/pdf"), b"PK\x03\x04 zip"));
    }

    #[tokio::test]
    async fn test_write_unique_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let (first, first_path) = write_unique(dir.path(), b"%PDF-one").await.unwrap();
        let (second, _) = write_unique(dir.path(), b"%PDF-two").await.unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with(".pdf"));
        assert_eq!(fs::read(&first_path).await.unwrap(), b"%PDF-one");
    }
}
