use askama::Template;
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::extractors::MaybeUser;

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub error: Option<String>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Deserialize)]
pub struct HomeQuery {
    error: Option<String>,
}

/// Sign-in landing page. Signed-in users go straight to the dashboard.
pub async fn index(maybe_user: MaybeUser, Query(query): Query<HomeQuery>) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    Html(HomeTemplate { error: query.error }).into_response()
}
