use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;

use crate::content::platforms::{self, NewPlatform, PlatformUpdate};
use crate::db::models::SocialPlatform;
use crate::error::AppResult;
use crate::events::DashboardEvent;
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    active: bool,
}

async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<SocialPlatform>>> {
    let conn = state.db.get()?;
    Ok(Json(platforms::list_platforms(&conn, query.active)?))
}

async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<NewPlatform>,
) -> AppResult<(StatusCode, Json<SocialPlatform>)> {
    let conn = state.db.get()?;
    let platform = platforms::create_platform(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(platform)))
}

async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<PlatformUpdate>,
) -> AppResult<Json<SocialPlatform>> {
    let conn = state.db.get()?;
    Ok(Json(platforms::update_platform(&conn, &id, &update)?))
}

async fn remove(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    platforms::delete_platform(&conn, &id)?;
    // Posts that targeted it just lost a destination
    state.events.publish(DashboardEvent::RefreshScheduledContent);
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/platforms", get(list).post(create))
        .route("/api/platforms/{id}", patch(update).delete(remove))
}
