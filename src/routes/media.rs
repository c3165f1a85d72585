use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;

use crate::content::characters::require_active_character;
use crate::content::media::{self, MediaFilter, MediaUpdate, NewMedia};
use crate::content::posts::{self, PostView};
use crate::content::{clean_text, FileType};
use crate::db::models::MediaContent;
use crate::error::{AppError, AppResult};
use crate::events::DashboardEvent;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::storage::{extension_for, fit_within, media_policy, Bucket, StoredObject};

pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

/// A multipart body split into its text fields and at most one `file` part.
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    fn text(&self, name: &str) -> Option<String> {
        clean_text(self.fields.get(name).map(String::as_str))
    }
}

pub async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm {
        fields: HashMap::new(),
        file: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
            if !data.is_empty() {
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid field '{}': {}", name, e)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

#[derive(Serialize)]
struct MediaCreated {
    #[serde(flatten)]
    media: MediaContent,
    warnings: Vec<String>,
}

async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filter): Query<MediaFilter>,
) -> AppResult<Json<Vec<MediaContent>>> {
    let conn = state.db.get()?;
    Ok(Json(media::list_media(&conn, &filter)?))
}

async fn fetch(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<MediaContent>> {
    let conn = state.db.get()?;
    Ok(Json(media::get_media(&conn, &id)?))
}

/// Store the file for a library item. A storage failure is reported as a
/// warning so the item can still be saved and the file attached later.
async fn store_file(
    state: &AppState,
    file_type: FileType,
    file: UploadedFile,
    warnings: &mut Vec<String>,
) -> AppResult<Option<StoredObject>> {
    let Some(policy) = media_policy(file_type, &state.config.uploads) else {
        return Err(AppError::BadRequest(
            "Interactive items take a url, not a file".into(),
        ));
    };
    policy.check(&file.content_type, file.data.len())?;

    let data = match policy.max_dimension {
        Some(max) => fit_within(file.data, file.content_type.clone(), max).await?,
        None => file.data,
    };

    let extension = extension_for(&file.content_type, file.file_name.as_deref());
    match state.store.put(Bucket::Media, &extension, &data).await {
        Ok(stored) => Ok(Some(stored)),
        Err(e) => {
            tracing::error!("Media upload failed: {}", e);
            warnings.push("File upload failed; the item was saved without a file".to_string());
            Ok(None)
        }
    }
}

/// POST /api/media
/// Multipart with `title`, `description?`, `file_type?`,
/// `character_profile_id?`, and either `file` or (for interactive items) `url`.
async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MediaCreated>)> {
    let mut form = read_upload_form(multipart).await?;

    let title = media::validate_title(&form.text("title").unwrap_or_default())?;
    let description = form.text("description");
    let character_id = form.text("character_profile_id");
    let declared: Option<FileType> = form
        .text("file_type")
        .map(|t| t.parse().map_err(AppError::BadRequest))
        .transpose()?;

    // Validate references before anything is written to storage
    if let Some(character_id) = &character_id {
        let conn = state.db.get()?;
        require_active_character(&conn, character_id)?;
    }

    let mut warnings = Vec::new();
    let (file_type, file_url, stored) = match (declared, form.file.take()) {
        (Some(FileType::Interactive), _) => {
            let url = form
                .text("url")
                .ok_or_else(|| AppError::BadRequest("Interactive items need a url".into()))?;
            (FileType::Interactive, Some(media::validate_interactive_url(&url)?), None)
        }
        (declared, Some(file)) => {
            let file_type = declared.unwrap_or_else(|| FileType::from_mime(&file.content_type));
            let stored = store_file(&state, file_type, file, &mut warnings).await?;
            (file_type, stored.as_ref().map(|s| s.public_url.clone()), stored)
        }
        (Some(file_type), None) => (file_type, None, None),
        (None, None) => {
            return Err(AppError::BadRequest(
                "Provide a file or a file_type".into(),
            ))
        }
    };

    let input = NewMedia {
        title,
        description,
        file_type,
        file_url,
        file_size: stored.as_ref().map(|s| s.size as i64),
        storage_key: stored.as_ref().map(|s| s.key.clone()),
        character_profile_id: character_id,
    };

    let created = {
        let conn = state.db.get()?;
        media::create_media(&conn, &input)
    };
    let media = match created {
        Ok(media) => media,
        Err(e) => {
            if let Some(stored) = &stored {
                if let Err(cleanup) = state.store.delete(&stored.key).await {
                    tracing::warn!(key = %stored.key, "Failed to remove orphaned upload: {}", cleanup);
                }
            }
            return Err(e);
        }
    };

    Ok((StatusCode::CREATED, Json(MediaCreated { media, warnings })))
}

async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<MediaUpdate>,
) -> AppResult<Json<MediaContent>> {
    let conn = state.db.get()?;
    Ok(Json(media::update_media(&conn, &id, &update)?))
}

async fn remove(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let deleted = {
        let conn = state.db.get()?;
        media::delete_media(&conn, &id)?
    };

    if let Some(key) = deleted.storage_key {
        if let Err(e) = state.store.delete(&key).await {
            tracing::warn!(key = %key, "Failed to remove stored media: {}", e);
        }
    }
    // Posts referencing the item now show no media
    state.events.publish(DashboardEvent::RefreshScheduledContent);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/media/{id}/schedule
/// Turn a library item into a post awaiting a time.
async fn schedule(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let view = {
        let mut conn = state.db.get()?;
        posts::schedule_media(&mut conn, &id)?
    };

    state.events.publish(DashboardEvent::ScheduleContent {
        media_id: id,
        post_id: view.post.id.clone(),
    });
    state.events.publish(DashboardEvent::RefreshScheduledContent);
    Ok((StatusCode::CREATED, Json(view)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/media", get(list).post(create))
        .route("/api/media/{id}", get(fetch).patch(update).delete(remove))
        .route("/api/media/{id}/schedule", post(schedule))
}
