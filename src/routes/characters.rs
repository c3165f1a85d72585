use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::content::characters::{self, CharacterUpdate, NewCharacter};
use crate::db::models::CharacterProfile;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::media::read_upload_form;
use crate::state::AppState;
use crate::storage::{avatar_policy, extension_for, fit_within, Bucket};

#[derive(Serialize)]
struct AvatarUpdated {
    #[serde(flatten)]
    character: CharacterProfile,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    active: bool,
}

async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<CharacterProfile>>> {
    let conn = state.db.get()?;
    Ok(Json(characters::list_characters(&conn, query.active)?))
}

async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<NewCharacter>,
) -> AppResult<(StatusCode, Json<CharacterProfile>)> {
    let conn = state.db.get()?;
    let profile = characters::create_character(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn fetch(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<CharacterProfile>> {
    let conn = state.db.get()?;
    Ok(Json(characters::get_character(&conn, &id)?))
}

async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<CharacterUpdate>,
) -> AppResult<Json<CharacterProfile>> {
    let conn = state.db.get()?;
    Ok(Json(characters::update_character(&conn, &id, &update)?))
}

async fn remove(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let avatar_url = {
        let conn = state.db.get()?;
        let profile = characters::get_character(&conn, &id)?;
        characters::delete_character(&conn, &id)?;
        profile.avatar_url
    };

    if let Some(key) = avatar_url.and_then(|url| state.store.key_from_url(&url)) {
        if let Err(e) = state.store.delete(&key).await {
            tracing::warn!(key = %key, "Failed to remove avatar of deleted character: {}", e);
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/characters/{id}/avatar
/// Multipart field `file`.
/// The image is downscaled before it is stored; the previous avatar is removed.
/// If storage is unavailable the character keeps its avatar and a warning is returned.
async fn upload_avatar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<AvatarUpdated>> {
    let current = {
        let conn = state.db.get()?;
        characters::get_character(&conn, &id)?
    };
    let previous = current.avatar_url.clone();

    let form = read_upload_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("Missing file field".into()))?;

    let policy = avatar_policy(&state.config.uploads);
    policy.check(&file.content_type, file.data.len())?;
    let data = match policy.max_dimension {
        Some(max) => fit_within(file.data, file.content_type.clone(), max).await?,
        None => file.data,
    };

    let extension = extension_for(&file.content_type, file.file_name.as_deref());
    let stored = match state.store.put(Bucket::Avatars, &extension, &data).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!(character_id = %id, "Avatar upload failed: {}", e);
            return Ok(Json(AvatarUpdated {
                character: current,
                warnings: vec!["Avatar upload failed; the previous avatar was kept".to_string()],
            }));
        }
    };

    let updated = {
        let conn = state.db.get()?;
        characters::set_avatar_url(&conn, &id, Some(&stored.public_url))
    };
    let profile = match updated {
        Ok(profile) => profile,
        Err(e) => {
            // Row vanished or write failed: don't leave the object behind
            if let Err(cleanup) = state.store.delete(&stored.key).await {
                tracing::warn!(key = %stored.key, "Failed to remove orphaned avatar: {}", cleanup);
            }
            return Err(e);
        }
    };

    if let Some(key) = previous.and_then(|url| state.store.key_from_url(&url)) {
        if let Err(e) = state.store.delete(&key).await {
            tracing::warn!(key = %key, "Failed to remove replaced avatar: {}", e);
        }
    }

    tracing::info!(character_id = %id, size = stored.size, "Updated avatar");
    Ok(Json(AvatarUpdated {
        character: profile,
        warnings: Vec::new(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/characters", get(list).post(create))
        .route(
            "/api/characters/{id}",
            get(fetch).patch(update).delete(remove),
        )
        .route("/api/characters/{id}/avatar", put(upload_avatar))
}
