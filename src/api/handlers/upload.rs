use crate::AppState;
use crate::api::error::{AppError, ErrorResponse};
use crate::services::storage::{StorageError, StoredFile};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

/// Multipart field that carries the upload
pub const FILE_FIELD: &str = "file";

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub originalname: String,
    pub size: u64,
    pub path: String,
}

#[derive(ToSchema)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, description = "Single file upload", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file or malformed multipart body", body = ErrorResponse),
        (status = 413, description = "File exceeds the size limit", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "upload"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut stored = None;
    if let Err(e) = read_file_field(&state, &mut multipart, &mut stored).await {
        if let Some((_, file)) = stored.take() {
            if let Err(cleanup) = state.upload_service.discard(&file).await {
                tracing::error!(
                    "Failed to remove {} after rejected upload: {}",
                    file.name,
                    cleanup
                );
            }
        }
        return Err(e);
    }

    let (original_name, file) = stored.ok_or_else(AppError::no_file)?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        filename: file.name,
        originalname: original_name,
        size: file.size,
        path: file.path.display().to_string(),
    }))
}

/// Walks the multipart body, storing the single `file` part. Text fields
/// are skipped; any other file part is rejected.
async fn read_file_field(
    state: &AppState,
    multipart: &mut Multipart,
    stored: &mut Option<(String, StoredFile)>,
) -> Result<(), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e, state))?
    {
        // A part without a filename is a plain form field
        let Some(original_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            continue;
        };

        if field.name() != Some(FILE_FIELD) || stored.is_some() {
            tracing::warn!(
                "Rejecting unexpected file part {:?} ({})",
                field.name(),
                original_name
            );
            return Err(AppError::unexpected_field());
        }

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        let file = state
            .upload_service
            .store(&original_name, reader)
            .await
            .map_err(|e| storage_error(e, state))?;
        *stored = Some((original_name, file));
    }
    Ok(())
}

fn too_large(state: &AppState) -> AppError {
    AppError::PayloadTooLarge {
        limit: state.config.max_file_size_label(),
    }
}

fn multipart_error(err: &MultipartError, state: &AppState) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(state)
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Body read failures surface as IO errors wrapping the multipart error
fn storage_error(err: StorageError, state: &AppState) -> AppError {
    match err {
        StorageError::TooLarge { .. } => too_large(state),
        StorageError::Io(io) => {
            if let Some(e) = io
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<MultipartError>())
            {
                return multipart_error(e, state);
            }
            AppError::Storage(StorageError::Io(io))
        }
        other => AppError::Storage(other),
    }
}
