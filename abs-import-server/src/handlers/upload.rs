//! Upload archive handler (spec §6.2 "Upload archive").

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use crate::infra::{ApiResponse, AppError, AppResult, AppState};
use crate::uploads;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub backup_path: String,
}

pub async fn upload_archive_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadResponse>>> {
    let mut uploaded: Option<(Option<String>, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?
    {
        if uploaded.is_some() {
            break;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.to_string()))?;
        uploaded = Some((filename, bytes));
    }

    let (filename, bytes) =
        uploaded.ok_or_else(|| AppError::bad_request("no archive file provided"))?;

    if bytes.len() as u64 > state.config.max_upload_bytes {
        return Err(AppError::bad_request(
            "uploaded archive exceeds the configured size limit",
        ));
    }

    let ext = uploads::guess_extension(filename.as_deref());
    let path = uploads::write_upload(&state.config.uploads_dir, &ext, &bytes).await?;

    Ok(Json(ApiResponse::success(UploadResponse {
        backup_path: path.display().to_string(),
    })))
}
