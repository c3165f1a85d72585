use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use chrono::{Duration, Utc};

use crate::content::posts::{self, PostFilter, PostView};
use crate::content::{characters, platforms, PostStatus};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::home::Html;
use crate::state::AppState;

const FAILED_FALLBACK: &str = "Delivery failed. No details were recorded.";

/// One post as the dashboard lists it.
pub struct PostCard {
    pub id: String,
    pub description: String,
    pub status: &'static str,
    pub when: Option<String>,
    pub character: Option<String>,
    pub platforms: String,
    pub media_title: Option<String>,
    pub error: Option<String>,
    pub overdue: bool,
    pub warnings: Vec<String>,
}

impl From<PostView> for PostCard {
    fn from(view: PostView) -> Self {
        let error = (view.post.status == PostStatus::Failed).then(|| {
            view.post
                .error_message
                .clone()
                .unwrap_or_else(|| FAILED_FALLBACK.to_string())
        });
        Self {
            id: view.post.id,
            description: view
                .post
                .post_description
                .unwrap_or_else(|| "(no description)".to_string()),
            status: view.post.status.as_str(),
            when: view
                .post
                .scheduled_time
                .map(|t| t.format("%a %d %b %Y, %H:%M UTC").to_string()),
            character: view.character.map(|c| format!("{} (@{})", c.name, c.username)),
            platforms: view
                .platforms
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            media_title: view.media.map(|m| m.title),
            error,
            overdue: view.is_overdue,
            warnings: view.warnings,
        }
    }
}

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
struct DashboardTemplate {
    username: String,
    display_name: Option<String>,
    dark_mode: bool,
    active_tab: &'static str,
    character_count: usize,
    platform_count: usize,
    needs_scheduling: Vec<PostCard>,
    upcoming: Vec<PostCard>,
    failed: Vec<PostCard>,
}

/// Dashboard overview: what needs a time, what is coming up, what failed.
async fn dashboard(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
) -> AppResult<Response> {
    let Some(user) = maybe_user.0 else {
        return Ok(Redirect::to("/").into_response());
    };
    let prefs = state.preferences.load(&user.id).await?;

    let conn = state.db.get()?;
    let character_count = characters::list_characters(&conn, true)?.len();
    let platform_count = platforms::list_platforms(&conn, true)?.len();
    let needs_scheduling = posts::needs_scheduling(&conn)?;

    let today = Utc::now().date_naive();
    let upcoming: Vec<PostView> = posts::calendar(&conn, today, today + Duration::days(7))?
        .into_iter()
        .flat_map(|day| day.posts)
        .filter(|view| view.post.status == PostStatus::Pending)
        .collect();
    let failed = posts::list_posts(
        &conn,
        &PostFilter {
            status: Some(PostStatus::Failed),
            character_id: None,
        },
    )?;

    Ok(Html(DashboardTemplate {
        username: user.username,
        display_name: user.display_name,
        dark_mode: prefs.dark_mode,
        active_tab: prefs.active_tab.as_str(),
        character_count,
        platform_count,
        needs_scheduling: needs_scheduling.into_iter().map(PostCard::from).collect(),
        upcoming: upcoming.into_iter().map(PostCard::from).collect(),
        failed: failed.into_iter().map(PostCard::from).collect(),
    })
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ScheduledPost;

    fn failed_view(error_message: Option<&str>) -> PostView {
        PostView {
            post: ScheduledPost {
                id: "p1".into(),
                post_description: None,
                scheduled_time: Some(Utc::now()),
                status: PostStatus::Failed,
                media_content_id: None,
                character_profile_id: None,
                error_message: error_message.map(str::to_string),
                channel_group: None,
                thread_id: None,
                sent_at: None,
                created_at: "2026-01-01T00:00:00Z".into(),
                updated_at: "2026-01-01T00:00:00Z".into(),
            },
            character: None,
            media: None,
            platforms: Vec::new(),
            needs_scheduling: false,
            is_overdue: false,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn failed_card_shows_recorded_error() {
        let card = PostCard::from(failed_view(Some("Telegram API returned 429")));
        assert_eq!(card.error.as_deref(), Some("Telegram API returned 429"));
    }

    #[test]
    fn failed_card_without_message_uses_fallback() {
        let card = PostCard::from(failed_view(None));
        assert_eq!(card.error.as_deref(), Some(FAILED_FALLBACK));
        assert_eq!(card.description, "(no description)");
    }

    #[test]
    fn dashboard_renders_failed_posts_without_message() {
        let template = DashboardTemplate {
            username: "3c-admin".into(),
            display_name: None,
            dark_mode: true,
            active_tab: "dashboard",
            character_count: 0,
            platform_count: 0,
            needs_scheduling: Vec::new(),
            upcoming: Vec::new(),
            failed: vec![PostCard::from(failed_view(None))],
        };
        let html = template.render().unwrap();
        assert!(html.contains(FAILED_FALLBACK));
    }
}
