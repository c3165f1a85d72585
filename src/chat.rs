//! Relay between the dashboard chat widget and an external chat backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::error::AppError;

/// What the widget posts to `/api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub chat_session_id: Option<String>,
    pub user_bubble: Option<String>,
}

/// Body forwarded to the backend. The session id is always present here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    pub chat_session_id: String,
    pub user_bubble: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub chat_session_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat backend is not configured")]
    NotConfigured,

    #[error("chat backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat backend returned an unusable reply: {0}")]
    InvalidReply(String),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl ChatRequest {
    /// Validate and fill in a session id when the widget has none yet.
    pub fn into_message(self) -> Result<ChatMessage, AppError> {
        let message = self.message.trim().to_string();
        if message.is_empty() {
            return Err(AppError::BadRequest("Message is required".into()));
        }
        let chat_session_id = self
            .chat_session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        Ok(ChatMessage {
            message,
            chat_session_id,
            user_bubble: self.user_bubble,
        })
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, message: &ChatMessage) -> Result<ChatReply, ChatError>;
}

/// Backend reached over HTTP. One attempt per message.
pub struct HttpChatBackend {
    http: reqwest::Client,
    endpoint: Option<String>,
}

#[derive(Deserialize)]
struct BackendReply {
    #[serde(alias = "response", alias = "output")]
    reply: Option<String>,
    chat_session_id: Option<String>,
}

impl HttpChatBackend {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone().filter(|e| !e.trim().is_empty()),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, message: &ChatMessage) -> Result<ChatReply, ChatError> {
        let endpoint = self.endpoint.as_deref().ok_or(ChatError::NotConfigured)?;

        let reply: BackendReply = self
            .http
            .post(endpoint)
            .json(message)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = reply
            .reply
            .ok_or_else(|| ChatError::InvalidReply("missing reply text".into()))?;
        Ok(ChatReply {
            reply: text,
            chat_session_id: reply
                .chat_session_id
                .unwrap_or_else(|| message.chat_session_id.clone()),
        })
    }
}
