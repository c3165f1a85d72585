use async_graphql::SimpleObject;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::content::domain::{CharacterRole, FileType, PostState, PostStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct CharacterProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    pub role: CharacterRole,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct SocialPlatform {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct MediaContent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: FileType,
    pub file_size: Option<i64>,
    #[serde(skip)]
    #[graphql(skip)]
    pub storage_key: Option<String>,
    pub character_profile_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct ScheduledPost {
    pub id: String,
    pub post_description: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: PostStatus,
    pub media_content_id: Option<String>,
    pub character_profile_id: Option<String>,
    pub error_message: Option<String>,
    pub channel_group: Option<String>,
    pub thread_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: String,
    pub updated_at: String,
}

impl ScheduledPost {
    pub fn state(&self) -> PostState {
        PostState {
            status: self.status,
            scheduled_time: self.scheduled_time,
            error_message: self.error_message.clone(),
            sent_at: self.sent_at,
        }
    }
}

/// Canonical storage format for timestamps: second precision, `Z` suffix.
/// Keeps lexicographic order equal to chronological order in SQL comparisons.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
