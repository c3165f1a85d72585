use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::oauth::{authorize_username, generate_state};
use crate::auth::{session, users, SanitizedUser};
use crate::db::models::{format_timestamp, Session, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, MaybeUser};
use crate::state::AppState;

const STATE_COOKIE: &str = "cc_oauth_state";

#[derive(Deserialize)]
pub struct CallbackRequest {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

// -- Cookie helpers --

fn cookie_attrs(secure: bool) -> &'static str {
    if secure {
        "HttpOnly; SameSite=Lax; Path=/; Secure"
    } else {
        "HttpOnly; SameSite=Lax; Path=/"
    }
}

fn session_cookie(state: &AppState, token: &str) -> String {
    let auth = &state.config.auth;
    format!(
        "{}={}; {}; Max-Age={}",
        auth.cookie_name,
        token,
        cookie_attrs(auth.secure_cookies),
        auth.session_hours * 3600
    )
}

fn clear_cookie(name: &str, secure: bool) -> String {
    format!("{}=; {}; Max-Age=0", name, cookie_attrs(secure))
}

fn state_cookie(value: &str, secure: bool) -> String {
    format!(
        "{}={}; {}; Max-Age=600",
        STATE_COOKIE,
        value,
        cookie_attrs(secure)
    )
}

// -- Flow --

/// GET /auth/login
/// Start the provider round trip.
async fn login(State(state): State<AppState>) -> AppResult<Response> {
    let oauth_state = generate_state();
    let url = state.identity.authorize_url(&oauth_state)?;

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            state_cookie(&oauth_state, state.config.auth.secure_cookies),
        )]),
        Redirect::to(&url),
    )
        .into_response())
}

/// Shared by the JSON and redirect callbacks: verify, authorise, open a session.
async fn complete_login(
    state: &AppState,
    code: Option<&str>,
    returned_state: Option<&str>,
    expected_state: Option<&str>,
) -> AppResult<(User, Session)> {
    let code = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

    if let (Some(returned), Some(expected)) = (returned_state, expected_state) {
        if returned != expected {
            tracing::warn!("OAuth state mismatch");
            return Err(AppError::BadRequest("OAuth state mismatch".into()));
        }
    }

    let access_token = state.identity.exchange_code(code).await?;
    let profile = state.identity.fetch_user(&access_token).await?;
    authorize_username(&profile, &state.config.oauth.allowed_username)?;

    let conn = state.db.get()?;
    let user = users::upsert_user(&conn, &profile)?;
    let session = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
    if let Err(e) = session::purge_expired(&conn, Utc::now()) {
        tracing::warn!("Failed to purge expired sessions: {}", e);
    }

    tracing::info!(username = %user.username, "Signed in");
    Ok((user, session))
}

/// POST /api/auth/callback
/// Body: { code, state? }
/// Returns: { user, session_id, expires_at } and sets the session cookie
async fn callback_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CallbackRequest>,
) -> AppResult<Response> {
    let expected = cookie_value(&headers, STATE_COOKIE);
    let (user, session) = complete_login(
        &state,
        req.code.as_deref(),
        req.state.as_deref(),
        expected,
    )
    .await?;

    let body = serde_json::json!({
        "user": SanitizedUser::from(&user),
        "session_id": session.id,
        "expires_at": format_timestamp(&session.expires_at),
    });

    let secure = state.config.auth.secure_cookies;
    Ok((
        StatusCode::OK,
        AppendHeaders([
            (header::SET_COOKIE, session_cookie(&state, &session.token)),
            (header::SET_COOKIE, clear_cookie(STATE_COOKIE, secure)),
        ]),
        Json(body),
    )
        .into_response())
}

/// GET /auth/callback
/// Where the provider sends the browser back.
async fn callback_redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> AppResult<Response> {
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "Provider returned an error");
        return Err(AppError::BadRequest(format!("Sign-in was not completed: {}", error)));
    }

    let expected = cookie_value(&headers, STATE_COOKIE);
    let (_, session) = complete_login(
        &state,
        query.code.as_deref(),
        query.state.as_deref(),
        expected,
    )
    .await?;

    let secure = state.config.auth.secure_cookies;
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, session_cookie(&state, &session.token)),
            (header::SET_COOKIE, clear_cookie(STATE_COOKIE, secure)),
        ]),
        Redirect::to("/dashboard"),
    )
        .into_response())
}

/// GET /api/auth/session
/// Returns: { authenticated, user?, expires_at? }
async fn current_session(maybe_user: MaybeUser) -> Json<serde_json::Value> {
    match maybe_user.0 {
        Some(user) => Json(serde_json::json!({
            "authenticated": true,
            "user": SanitizedUser {
                username: user.username,
                display_name: user.display_name,
                avatar_url: user.avatar_url,
                profile_url: user.profile_url,
            },
            "expires_at": format_timestamp(&user.session_expires_at),
        })),
        None => Json(serde_json::json!({ "authenticated": false })),
    }
}

/// POST /auth/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = cookie_value(&headers, cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            clear_cookie(cookie_name, state.config.auth.secure_cookies),
        )]),
        Redirect::to("/"),
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback_redirect))
        .route("/auth/logout", post(logout))
        .route("/api/auth/callback", post(callback_json))
        .route("/api/auth/session", get(current_session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = clear_cookie("cc_session", true);
        assert!(cookie.starts_with("cc_session=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn state_cookie_is_short_lived() {
        let cookie = state_cookie("abc", false);
        assert!(cookie.starts_with("cc_oauth_state=abc;"));
        assert!(cookie.contains("Max-Age=600"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn state_cookie_is_read_back_from_request() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "a=1; cc_oauth_state=xyz".parse().unwrap());
        assert_eq!(cookie_value(&headers, STATE_COOKIE), Some("xyz"));
    }
}
