//! POST /api/convert: assemble uploaded chapters into one audiobook and
//! stream it back.
//!
//! Multipart fields:
//!
//! | field                 | kind                                   |
//! |-----------------------|----------------------------------------|
//! | `bookTitle`           | text                                   |
//! | `author`              | text                                   |
//! | `chapterMetadataJson` | JSON array of `{originalName, title}`  |
//! | `chapterFiles`        | one file part per chapter, in order    |
//! | `coverArt`            | optional image file part               |

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Extension;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use bf_av::workspace::UPLOAD_PREFIX;
use bf_av::ScopedDir;
use bf_core::{ChapterMetadata, Error, JobSubmission, UploadedChapter, M4B_CONTENT_TYPE};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Image types accepted for the cover.
pub const COVER_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

const MISSING_FIELDS: &str = "Missing required fields: bookTitle, author, or chapterMetadataJson";

pub async fn convert(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    handle(ctx, multipart)
        .await
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))
}

async fn handle(ctx: AppContext, multipart: Multipart) -> bf_core::Result<Response> {
    let staging = ScopedDir::acquire(ctx.coordinator.temp_root(), UPLOAD_PREFIX)?;
    let submission = read_submission(&ctx, multipart, &staging).await?;

    let job = ctx.coordinator.run(submission, Some(staging)).await?;
    let file_name = job.file_name.clone();
    let size_bytes = job.size_bytes;

    let (stream, delivery) = job.into_stream().await?;
    tokio::spawn(
        async move {
            delivery.finished().await;
        }
        .in_current_span(),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, M4B_CONTENT_TYPE)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", urlencoding::encode(&file_name)),
        )
        .header(header::CONTENT_LENGTH, size_bytes)
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(format!("failed to build response: {e}")))
}

/// Drain the multipart body, streaming file parts into `staging`.
async fn read_submission(
    ctx: &AppContext,
    mut multipart: Multipart,
    staging: &ScopedDir,
) -> bf_core::Result<JobSubmission> {
    let mut submission = JobSubmission::default();
    let mut metadata_json: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bookTitle" => submission.book_title = field.text().await.map_err(multipart_error)?,
            "author" => submission.author = field.text().await.map_err(multipart_error)?,
            "chapterMetadataJson" => {
                metadata_json = Some(field.text().await.map_err(multipart_error)?);
            }
            "chapterFiles" => {
                let index = submission.files.len();
                let original_name = field.file_name().map(str::to_string);
                let path = staging.file(&staged_name("chapter", index, original_name.as_deref()));
                let written = save_field(field, &path, None).await?;
                if written == 0 && original_name.as_deref().unwrap_or_default().is_empty() {
                    // Empty file input left blank by the client.
                    continue;
                }
                submission.files.push(UploadedChapter {
                    path,
                    original_name,
                });
            }
            "coverArt" => {
                submission.cover_art_path = save_cover(ctx, field, staging).await?;
            }
            other => {
                tracing::debug!("Ignoring unexpected multipart field '{other}'");
            }
        }
    }

    let metadata_json = metadata_json
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::validation(MISSING_FIELDS))?;
    submission.chapter_metadata = serde_json::from_str::<Vec<ChapterMetadata>>(&metadata_json)
        .map_err(|e| Error::validation(format!("Invalid chapterMetadataJson: {e}")))?;

    tracing::info!(
        files = submission.files.len(),
        entries = submission.chapter_metadata.len(),
        cover = submission.cover_art_path.is_some(),
        "Upload received"
    );
    Ok(submission)
}

async fn save_cover(
    ctx: &AppContext,
    field: Field<'_>,
    staging: &ScopedDir,
) -> bf_core::Result<Option<PathBuf>> {
    let original_name = field.file_name().map(str::to_string);
    if original_name.as_deref().unwrap_or_default().is_empty() {
        return Ok(None);
    }

    let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
    if !COVER_CONTENT_TYPES.contains(&content_type.as_str()) {
        field.bytes().await.map_err(multipart_error)?;
        return Err(Error::validation(format!(
            "Invalid cover art type '{content_type}'. Use JPEG, PNG or WebP."
        )));
    }

    let path = staging.file(&staged_name("cover", 0, original_name.as_deref()));
    save_field(field, &path, Some(ctx.config.server.max_cover_bytes)).await?;
    Ok(Some(path))
}

/// Stream a field to `path`, enforcing `limit` if given. Returns bytes written.
async fn save_field(
    mut field: Field<'_>,
    path: &Path,
    limit: Option<u64>,
) -> bf_core::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut received = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        received += chunk.len() as u64;
        // Past the limit the rest of the part is drained but not stored.
        if limit.is_some_and(|max| received > max) {
            continue;
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if let Some(max) = limit.filter(|&max| received > max) {
        return Err(Error::validation(format!(
            "Cover art is too large (max {} MB).",
            max / (1024 * 1024)
        )));
    }
    Ok(received)
}

/// Name for a staged upload. Only a short alphanumeric extension from the
/// client's file name is kept.
fn staged_name(kind: &str, index: usize, original_name: Option<&str>) -> String {
    let ext = original_name
        .and_then(|n| Path::new(n).extension())
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{kind}_{index}.{ext}"),
        None => format!("{kind}_{index}"),
    }
}

fn multipart_error(e: MultipartError) -> Error {
    Error::validation(format!("Invalid multipart body: {}", e.body_text()))
}
