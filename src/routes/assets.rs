use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

use crate::state::AppState;
use crate::storage::StorageError;

#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

fn file_response(path: &str, data: Vec<u8>, cache_control: &'static str) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, cache_control.to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        data,
    )
        .into_response()
}

/// Compiled CSS and JS bundled into the binary.
pub async fn serve_asset(Path(path): Path<String>) -> Response {
    match Assets::get(&path) {
        Some(file) => file_response(&path, file.data.to_vec(), "public, max-age=86400"),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Uploaded avatars and media. Public like a storage bucket: keys are
/// unguessable and the delivery worker fetches media through these URLs.
pub async fn serve_upload(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.store.read(&key).await {
        Ok(data) => file_response(&key, data, "public, max-age=31536000, immutable"),
        Err(StorageError::InvalidKey(_)) => StatusCode::BAD_REQUEST.into_response(),
        Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::error!(key = %key, "Failed to read upload: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
