//! Video dehazing endpoint (/dehaze-video)

use axum::{
    Router,
    body::Bytes,
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    routing::post,
};
use std::sync::Arc;

use crate::AppState;
use crate::constants::{OUTPUT_FILENAME, UPLOAD_FIELD};
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/dehaze-video", post(dehaze_video))
}

/// Pull the upload out of the form: the `video` field wherever it appears,
/// or else the first field carrying a filename.
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    let mut fallback = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .log_api("Multipart field error")?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field.bytes().await.log_api("Failed to read upload");
        }
        if fallback.is_none() && field.file_name().is_some() {
            fallback = Some(field.bytes().await.log_api("Failed to read upload")?);
        }
    }

    fallback.ok_or_else(|| {
        ApiError::bad_request(format!("missing file field \"{}\"", UPLOAD_FIELD))
    })
}

/// POST /dehaze-video - Dehaze every frame of an uploaded video
async fn dehaze_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    tracing::info!(bytes = upload.len(), "received video upload");

    let output = state
        .pipeline
        .process_video(&upload)
        .await
        .log_api("Dehaze video error")?;

    let disposition = format!("attachment; filename=\"{}\"", OUTPUT_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        output,
    ))
}
