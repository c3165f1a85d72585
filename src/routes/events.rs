use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::stream::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::events::DashboardEvent;
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// GET /api/events
/// Dashboard signals as server-sent events.
async fn stream(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = BroadcastStream::new(state.events.subscribe()).filter_map(|msg| {
        let event = match msg {
            Ok(event) => event,
            // Missed some signals; a full refresh covers all of them
            Err(BroadcastStreamRecvError::Lagged(_)) => DashboardEvent::RefreshScheduledContent,
        };
        Event::default()
            .event(event.name())
            .json_data(&event)
            .ok()
            .map(Ok)
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", get(stream))
}
