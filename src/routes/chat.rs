use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::chat::{ChatReply, ChatRequest};
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// POST /api/chat
/// Body: { message, chat_session_id?, user_bubble? }
/// Returns: { reply, chat_session_id }
async fn send(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<ChatRequest>,
) -> AppResult<Json<ChatReply>> {
    let message = req.into_message()?;
    let reply = state.chat.send(&message).await?;
    tracing::debug!(chat_session_id = %reply.chat_session_id, "Relayed chat message");
    Ok(Json(reply))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(send))
}
