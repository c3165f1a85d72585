pub mod assets;
pub mod auth;
pub mod characters;
pub mod chat;
pub mod dashboard;
pub mod events;
pub mod graphql;
pub mod home;
pub mod media;
pub mod platforms;
pub mod posts;
pub mod preferences;
pub mod worker;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::worker::require_worker_token;
use crate::state::AppState;

/// Multipart framing on top of the largest accepted file.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Full application router: pages, the JSON API, the worker API and static files.
pub fn router(state: AppState) -> Router {
    let uploads = &state.config.uploads;
    let body_limit = uploads.media_max_bytes.max(uploads.avatar_max_bytes) + FORM_OVERHEAD;

    let api = Router::new()
        .merge(characters::router())
        .merge(platforms::router())
        .merge(media::router())
        .merge(posts::router())
        .merge(chat::router())
        .merge(preferences::router())
        .merge(events::router())
        .merge(graphql::router())
        .layer(DefaultBodyLimit::max(body_limit));

    let worker = worker::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_worker_token,
    ));

    let mut app = Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve_asset))
        .route("/uploads/{*key}", get(assets::serve_upload))
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(api)
        .merge(worker)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config.server.allowed_origins) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// CORS for a separately hosted frontend. `None` when no origins are configured.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
    }

    #[test]
    fn cors_skips_invalid_origins() {
        assert!(cors_layer(&["bad\norigin".to_string()]).is_none());
        assert!(cors_layer(&["https://3c.example.com".to_string()]).is_some());
    }
}
