//! Shared harness: a full router over a temporary database and upload root,
//! with the provider and chat backend swapped for in-process fakes.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use content_center::auth::oauth::{IdentityProvider, OAuthError, ProviderUser};
use content_center::auth::{session, users};
use content_center::chat::{ChatBackend, ChatError, ChatMessage, ChatReply};
use content_center::config::Config;
use content_center::db;
use content_center::routes;
use content_center::state::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN: &str = "3c-admin";
pub const WORKER_TOKEN: &str = "worker-secret";

/// Treats the authorization code as the provider login.
pub struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(format!("https://provider.test/authorize?state={}", state))
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        if code == "expired" {
            return Err(OAuthError::Rejected("The code passed is incorrect or expired.".into()));
        }
        Ok(code.to_string())
    }

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, OAuthError> {
        Ok(ProviderUser {
            login: access_token.to_string(),
            name: Some("Content Admin".into()),
            avatar_url: None,
            html_url: Some(format!("https://github.com/{}", access_token)),
        })
    }
}

pub struct EchoChat;

#[async_trait]
impl ChatBackend for EchoChat {
    async fn send(&self, message: &ChatMessage) -> Result<ChatReply, ChatError> {
        Ok(ChatReply {
            reply: format!("echo: {}", message.message),
            chat_session_id: message.chat_session_id.clone(),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub cookie: String,
    _dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = Some(dir.path().join("test.db"));
    config.storage.path = Some(dir.path().join("uploads"));
    config.auth.secure_cookies = false;
    config.oauth.allowed_username = ADMIN.to_string();
    config.worker.token = Some(WORKER_TOKEN.to_string());
    config
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let state = AppState::new(pool, config)
            .unwrap()
            .with_identity(Arc::new(FakeIdentity))
            .with_chat(Arc::new(EchoChat));
        state.store.init().await.unwrap();

        let token = {
            let conn = state.db.get().unwrap();
            let user = users::upsert_user(
                &conn,
                &ProviderUser {
                    login: ADMIN.into(),
                    name: None,
                    avatar_url: None,
                    html_url: None,
                },
            )
            .unwrap();
            session::create_session(&conn, &user.id, 24).unwrap().token
        };

        Self {
            router: routes::router(state.clone()),
            cookie: format!("cc_session={}", token),
            state,
            _dir: dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    /// Signed-in JSON request. `body` of `None` sends no body.
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, &self.cookie);
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, _, bytes) = self.send(req).await;
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, value)
    }

    pub async fn create_platform(&self, name: &str) -> String {
        let (status, body) = self
            .json("POST", "/api/platforms", Some(serde_json::json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "platform create failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn create_post(&self, body: serde_json::Value) -> serde_json::Value {
        let (status, body) = self.json("POST", "/api/posts", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "post create failed: {}", body);
        body
    }
}

/// Hand-built multipart body. Each part is (name, file_name, content_type, data).
pub fn multipart_body(
    boundary: &str,
    parts: &[(&str, Option<&str>, Option<&str>, &[u8])],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", name).as_bytes(),
            ),
        }
        if let Some(content_type) = content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}
