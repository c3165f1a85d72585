//! Contract for the external sender that publishes due posts.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::content::posts::{self, PostView};
use crate::content::DeliveryOutcome;
use crate::error::AppResult;
use crate::events::DashboardEvent;
use crate::state::AppState;

const DEFAULT_DUE_LIMIT: u32 = 50;

#[derive(Deserialize)]
struct DueQuery {
    limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReportedStatus {
    Sent,
    Failed,
}

#[derive(Deserialize)]
struct DeliveryReport {
    status: ReportedStatus,
    error_message: Option<String>,
}

impl From<DeliveryReport> for DeliveryOutcome {
    fn from(report: DeliveryReport) -> Self {
        match report.status {
            ReportedStatus::Sent => DeliveryOutcome::Sent,
            ReportedStatus::Failed => DeliveryOutcome::Failed {
                error_message: report.error_message,
            },
        }
    }
}

/// GET /api/worker/due?limit=
/// Pending posts whose time has come, oldest first.
async fn due(
    State(state): State<AppState>,
    Query(query): Query<DueQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let conn = state.db.get()?;
    let limit = query.limit.unwrap_or(DEFAULT_DUE_LIMIT);
    Ok(Json(posts::due_posts(&conn, Utc::now(), limit)?))
}

/// POST /api/worker/posts/{id}/result
/// Body: { status: "sent" | "failed", error_message? }
async fn report_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(report): Json<DeliveryReport>,
) -> AppResult<Json<PostView>> {
    let view = {
        let conn = state.db.get()?;
        posts::record_delivery(&conn, &id, report.into(), Utc::now())?
    };
    state.events.publish(DashboardEvent::RefreshScheduledContent);
    Ok(Json(view))
}

/// Worker routes. The caller layers on the bearer-token check.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/worker/due", get(due))
        .route("/api/worker/posts/{id}/result", post(report_result))
}
