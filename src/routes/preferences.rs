use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::preferences::{Preferences, PreferencesUpdate};
use crate::state::AppState;

async fn load(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Preferences>> {
    Ok(Json(state.preferences.load(&user.id).await?))
}

/// PUT /api/preferences
/// Fields left out keep their stored value.
async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<PreferencesUpdate>,
) -> AppResult<Json<Preferences>> {
    let prefs = state.preferences.load(&user.id).await?.apply(&update);
    state.preferences.save(&user.id, &prefs).await?;
    Ok(Json(prefs))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/preferences", get(load).put(save))
}
