use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::content::nullable;
use crate::content::platforms::{self, PlatformRef};
use crate::content::posts::{self, CalendarDay, NewPost, PostEdit, PostFilter, PostView};
use crate::error::AppResult;
use crate::events::DashboardEvent;
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
struct CalendarQuery {
    from: NaiveDate,
    to: NaiveDate,
}

/// `scheduled_time: null` moves the post back to "needs scheduling".
/// The key itself is required.
#[derive(Deserialize)]
struct ScheduleRequest {
    #[serde(deserialize_with = "nullable")]
    scheduled_time: Option<Option<DateTime<Utc>>>,
}

#[derive(Deserialize)]
struct PlatformsRequest {
    platform_ids: Vec<String>,
}

fn refresh(state: &AppState) {
    state.events.publish(DashboardEvent::RefreshScheduledContent);
}

async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(filter): Query<PostFilter>,
) -> AppResult<Json<Vec<PostView>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::list_posts(&conn, &filter)?))
}

async fn needs_scheduling(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<PostView>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::needs_scheduling(&conn)?))
}

async fn calendar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(range): Query<CalendarQuery>,
) -> AppResult<Json<Vec<CalendarDay>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::calendar(&conn, range.from, range.to)?))
}

async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<NewPost>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let view = {
        let mut conn = state.db.get()?;
        posts::create_post(&mut conn, &input)?
    };
    refresh(&state);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn fetch(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostView>> {
    let conn = state.db.get()?;
    Ok(Json(posts::get_post_view(&conn, &id)?))
}

async fn edit(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(edit): Json<PostEdit>,
) -> AppResult<Json<PostView>> {
    let view = {
        let mut conn = state.db.get()?;
        posts::edit_post(&mut conn, &id, &edit)?
    };
    refresh(&state);
    Ok(Json(view))
}

async fn remove(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    {
        let conn = state.db.get()?;
        posts::delete_post(&conn, &id)?;
    }
    refresh(&state);
    Ok(StatusCode::NO_CONTENT)
}

async fn set_schedule(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ScheduleRequest>,
) -> AppResult<Json<PostView>> {
    let view = {
        let conn = state.db.get()?;
        posts::set_schedule(&conn, &id, req.scheduled_time.flatten())?
    };
    refresh(&state);
    Ok(Json(view))
}

async fn cancel(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostView>> {
    let view = {
        let conn = state.db.get()?;
        posts::cancel_post(&conn, &id)?
    };
    refresh(&state);
    Ok(Json(view))
}

/// PUT /api/posts/{id}/platforms
/// The body is the complete new set.
async fn replace_platforms(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<PlatformsRequest>,
) -> AppResult<Json<Vec<PlatformRef>>> {
    let platforms = {
        let mut conn = state.db.get()?;
        posts::get_post(&conn, &id)?.state().ensure_editable()?;
        platforms::replace_post_platforms(&mut conn, &id, &req.platform_ids)?
    };
    refresh(&state);
    Ok(Json(platforms))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list).post(create))
        .route("/api/posts/needs-scheduling", get(needs_scheduling))
        .route("/api/posts/calendar", get(calendar))
        .route("/api/posts/{id}", get(fetch).patch(edit).delete(remove))
        .route("/api/posts/{id}/schedule", put(set_schedule))
        .route("/api/posts/{id}/cancel", post(cancel))
        .route("/api/posts/{id}/platforms", put(replace_platforms))
}
