//! Scheduled posts: persistence, read models and workflow transitions.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::content::characters::require_active_character;
use crate::content::media::{require_media, MediaRef};
use crate::content::platforms::{platforms_for_post, write_post_platforms, PlatformRef};
use crate::content::{clean_text, nullable, DeliveryOutcome, FileType, PostState, PostStatus};
use crate::db::models::{format_timestamp, now_timestamp, parse_timestamp, ScheduledPost};
use crate::error::{AppError, AppResult};

const COLUMNS: &str = "p.id, p.post_description, p.scheduled_time, p.status, p.media_content_id, \
                       p.character_profile_id, p.error_message, p.channel_group, p.thread_id, \
                       p.sent_at, p.created_at, p.updated_at";

/// Post columns followed by the resolved character and media columns.
const VIEW_SELECT: &str = "SELECT p.id, p.post_description, p.scheduled_time, p.status, \
       p.media_content_id, p.character_profile_id, p.error_message, p.channel_group, \
       p.thread_id, p.sent_at, p.created_at, p.updated_at, \
       c.id, c.name, c.username, c.avatar_url, \
       m.id, m.title, m.file_url, m.file_type \
     FROM scheduled_posts p \
     LEFT JOIN character_profiles c ON c.id = p.character_profile_id \
     LEFT JOIN media_content m ON m.id = p.media_content_id";

pub const NO_PLATFORMS_WARNING: &str = "No platforms selected";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub post_description: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub media_content_id: Option<String>,
    pub character_profile_id: Option<String>,
    pub channel_group: Option<String>,
    pub thread_id: Option<String>,
    #[serde(default)]
    pub platform_ids: Vec<String>,
}

/// Partial edit. `null` clears a field, an absent key leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostEdit {
    #[serde(default, deserialize_with = "nullable")]
    pub post_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub media_content_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub character_profile_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub channel_group: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub thread_id: Option<Option<String>>,
    pub platform_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub character_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, async_graphql::SimpleObject)]
pub struct CharacterRef {
    pub id: String,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// A post with its references resolved, as list views render it.
#[derive(Debug, Clone, Serialize, async_graphql::SimpleObject)]
pub struct PostView {
    #[serde(flatten)]
    pub post: ScheduledPost,
    pub character: Option<CharacterRef>,
    pub media: Option<MediaRef>,
    pub platforms: Vec<PlatformRef>,
    pub needs_scheduling: bool,
    pub is_overdue: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, async_graphql::SimpleObject)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub posts: Vec<PostView>,
}

/// Send times are stored as text and compared as text, which only orders
/// correctly for four-digit years.
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

fn check_storable(time: DateTime<Utc>) -> AppResult<()> {
    if STORABLE_YEARS.contains(&time.year()) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Scheduled time must fall between years 0 and 9999".into(),
        ))
    }
}

fn check_storable_date(date: NaiveDate) -> AppResult<()> {
    if STORABLE_YEARS.contains(&date.year()) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Calendar dates must fall between years 0 and 9999".into(),
        ))
    }
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(text) => parse_timestamp(&text).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("invalid timestamp {:?}", text).into(),
            )
        }),
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduledPost> {
    let status: String = row.get(3)?;
    Ok(ScheduledPost {
        id: row.get(0)?,
        post_description: row.get(1)?,
        scheduled_time: timestamp_column(row, 2)?,
        // CHECK constraint guarantees a known value
        status: status.parse().unwrap_or(PostStatus::Pending),
        media_content_id: row.get(4)?,
        character_profile_id: row.get(5)?,
        error_message: row.get(6)?,
        channel_group: row.get(7)?,
        thread_id: row.get(8)?,
        sent_at: timestamp_column(row, 9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

struct ViewRow {
    post: ScheduledPost,
    character: Option<CharacterRef>,
    media: Option<MediaRef>,
}

fn view_row(row: &Row<'_>) -> rusqlite::Result<ViewRow> {
    let post = post_from_row(row)?;

    let character = match row.get::<_, Option<String>>(12)? {
        Some(id) => Some(CharacterRef {
            id,
            name: row.get(13)?,
            username: row.get(14)?,
            avatar_url: row.get(15)?,
        }),
        None => None,
    };

    let media = match row.get::<_, Option<String>>(16)? {
        Some(id) => {
            let file_type: String = row.get(19)?;
            Some(MediaRef {
                id,
                title: row.get(17)?,
                file_url: row.get(18)?,
                file_type: file_type.parse().unwrap_or(FileType::Other),
            })
        }
        None => None,
    };

    Ok(ViewRow {
        post,
        character,
        media,
    })
}

fn into_view(conn: &Connection, row: ViewRow, now: DateTime<Utc>) -> AppResult<PostView> {
    let platforms = platforms_for_post(conn, &row.post.id)?;
    let state = row.post.state();

    let mut warnings = Vec::new();
    if platforms.is_empty() && !state.is_terminal() {
        warnings.push(NO_PLATFORMS_WARNING.to_string());
    }

    Ok(PostView {
        needs_scheduling: state.needs_scheduling(),
        is_overdue: state.is_overdue(now),
        post: row.post,
        character: row.character,
        media: row.media,
        platforms,
        warnings,
    })
}

fn query_views(
    conn: &Connection,
    where_clause: &str,
    order: &str,
    params: &[&dyn rusqlite::ToSql],
) -> AppResult<Vec<PostView>> {
    let sql = format!("{} {} ORDER BY {}", VIEW_SELECT, where_clause, order);
    let rows = {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, view_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let now = Utc::now();
    rows.into_iter().map(|row| into_view(conn, row, now)).collect()
}

fn validate_references(
    conn: &Connection,
    media_id: Option<&str>,
    character_id: Option<&str>,
) -> AppResult<()> {
    if let Some(media_id) = media_id {
        require_media(conn, media_id)?;
    }
    if let Some(character_id) = character_id {
        require_active_character(conn, character_id)?;
    }
    Ok(())
}

pub fn get_post(conn: &Connection, id: &str) -> AppResult<ScheduledPost> {
    conn.query_row(
        &format!("SELECT {} FROM scheduled_posts p WHERE p.id = ?1", COLUMNS),
        params![id],
        post_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn get_post_view(conn: &Connection, id: &str) -> AppResult<PostView> {
    query_views(conn, "WHERE p.id = ?1", "p.id", &[&id])?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)
}

pub fn create_post(conn: &mut Connection, input: &NewPost) -> AppResult<PostView> {
    let media_id = clean_text(input.media_content_id.as_deref());
    let character_id = clean_text(input.character_profile_id.as_deref());
    validate_references(conn, media_id.as_deref(), character_id.as_deref())?;
    if let Some(time) = input.scheduled_time {
        check_storable(time)?;
    }

    let state = PostState::new(input.scheduled_time);
    let id = uuid::Uuid::now_v7().to_string();
    let now = now_timestamp();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO scheduled_posts
            (id, post_description, scheduled_time, status, media_content_id,
             character_profile_id, channel_group, thread_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            id,
            clean_text(input.post_description.as_deref()),
            state.scheduled_time.as_ref().map(format_timestamp),
            state.status.as_str(),
            media_id,
            character_id,
            clean_text(input.channel_group.as_deref()),
            clean_text(input.thread_id.as_deref()),
            now,
        ],
    )?;

    if !input.platform_ids.is_empty() {
        write_post_platforms(&tx, &id, &input.platform_ids)?;
    }
    tx.commit()?;

    tracing::info!(
        post_id = %id,
        scheduled = state.scheduled_time.is_some(),
        "Created scheduled post"
    );
    get_post_view(conn, &id)
}

pub fn edit_post(conn: &mut Connection, id: &str, edit: &PostEdit) -> AppResult<PostView> {
    let mut post = get_post(conn, id)?;
    post.state().ensure_editable()?;

    if let Some(description) = &edit.post_description {
        post.post_description = clean_text(description.as_deref());
    }
    if let Some(media_id) = &edit.media_content_id {
        post.media_content_id = clean_text(media_id.as_deref());
    }
    if let Some(character_id) = &edit.character_profile_id {
        post.character_profile_id = clean_text(character_id.as_deref());
    }
    if let Some(channel_group) = &edit.channel_group {
        post.channel_group = clean_text(channel_group.as_deref());
    }
    if let Some(thread_id) = &edit.thread_id {
        post.thread_id = clean_text(thread_id.as_deref());
    }

    // Only references that changed are re-validated; an existing link to a
    // since-disabled persona does not block unrelated edits.
    let new_media = edit
        .media_content_id
        .as_ref()
        .and(post.media_content_id.as_deref());
    let new_character = edit
        .character_profile_id
        .as_ref()
        .and(post.character_profile_id.as_deref());
    validate_references(conn, new_media, new_character)?;

    // Platform set and fields land together or not at all
    let tx = conn.transaction()?;
    if let Some(platform_ids) = &edit.platform_ids {
        write_post_platforms(&tx, id, platform_ids)?;
    }
    tx.execute(
        "UPDATE scheduled_posts
         SET post_description = ?1, media_content_id = ?2, character_profile_id = ?3,
             channel_group = ?4, thread_id = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            post.post_description,
            post.media_content_id,
            post.character_profile_id,
            post.channel_group,
            post.thread_id,
            now_timestamp(),
            id,
        ],
    )?;
    tx.commit()?;

    get_post_view(conn, id)
}

fn save_state(conn: &Connection, id: &str, state: &PostState) -> AppResult<()> {
    conn.execute(
        "UPDATE scheduled_posts
         SET status = ?1, scheduled_time = ?2, error_message = ?3, sent_at = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            state.status.as_str(),
            state.scheduled_time.as_ref().map(format_timestamp),
            state.error_message,
            state.sent_at.as_ref().map(format_timestamp),
            now_timestamp(),
            id,
        ],
    )?;
    Ok(())
}

/// Set (`Some`) or clear (`None`) the send time.
pub fn set_schedule(
    conn: &Connection,
    id: &str,
    time: Option<DateTime<Utc>>,
) -> AppResult<PostView> {
    let post = get_post(conn, id)?;
    let next = match time {
        Some(time) => {
            check_storable(time)?;
            post.state().schedule(time)?
        }
        None => post.state().unschedule()?,
    };
    save_state(conn, id, &next)?;
    tracing::info!(post_id = %id, scheduled = time.is_some(), "Updated post schedule");
    get_post_view(conn, id)
}

pub fn cancel_post(conn: &Connection, id: &str) -> AppResult<PostView> {
    let post = get_post(conn, id)?;
    let next = post.state().cancel()?;
    save_state(conn, id, &next)?;
    tracing::info!(post_id = %id, "Cancelled post");
    get_post_view(conn, id)
}

pub fn delete_post(conn: &Connection, id: &str) -> AppResult<()> {
    let post = get_post(conn, id)?;
    post.state().ensure_deletable()?;
    conn.execute("DELETE FROM scheduled_posts WHERE id = ?1", params![id])?;
    tracing::info!(post_id = %id, "Deleted post");
    Ok(())
}

/// Apply a delivery report from the external worker.
pub fn record_delivery(
    conn: &Connection,
    id: &str,
    outcome: DeliveryOutcome,
    now: DateTime<Utc>,
) -> AppResult<PostView> {
    let post = get_post(conn, id)?;
    let next = post.state().record_delivery(outcome, now)?;
    save_state(conn, id, &next)?;
    match next.status {
        PostStatus::Failed => tracing::warn!(
            post_id = %id,
            error = next.error_message.as_deref().unwrap_or_default(),
            "Delivery failed"
        ),
        _ => tracing::info!(post_id = %id, "Delivery succeeded"),
    }
    get_post_view(conn, id)
}

pub fn list_posts(conn: &Connection, filter: &PostFilter) -> AppResult<Vec<PostView>> {
    let status = filter.status.map(|s| s.as_str());
    query_views(
        conn,
        "WHERE (?1 IS NULL OR p.status = ?1) AND (?2 IS NULL OR p.character_profile_id = ?2)",
        "p.scheduled_time IS NULL, p.scheduled_time ASC, p.created_at DESC",
        &[&status, &filter.character_id],
    )
}

/// Pending posts still waiting for a send time.
pub fn needs_scheduling(conn: &Connection) -> AppResult<Vec<PostView>> {
    query_views(
        conn,
        "WHERE p.status = 'pending' AND p.scheduled_time IS NULL",
        "p.created_at DESC, p.id DESC",
        &[],
    )
}

/// Posts with a send time on `from..=to` (UTC dates), bucketed by day.
/// Unscheduled posts never appear here.
pub fn calendar(conn: &Connection, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<CalendarDay>> {
    check_storable_date(from)?;
    check_storable_date(to)?;
    if to < from {
        return Err(AppError::BadRequest(
            "Calendar range end is before its start".into(),
        ));
    }
    if (to - from).num_days() > 366 {
        return Err(AppError::BadRequest(
            "Calendar range is limited to one year".into(),
        ));
    }

    // Stored times have whole seconds, so the last second closes the day
    let last_second = to
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| AppError::BadRequest("Calendar range end is out of range".into()))?;
    let start = format_timestamp(&from.and_time(chrono::NaiveTime::MIN).and_utc());
    let end = format_timestamp(&last_second.and_utc());

    let views = query_views(
        conn,
        "WHERE p.scheduled_time IS NOT NULL AND p.scheduled_time >= ?1 AND p.scheduled_time <= ?2",
        "p.scheduled_time ASC, p.id ASC",
        &[&start, &end],
    )?;

    let mut days: BTreeMap<NaiveDate, Vec<PostView>> = BTreeMap::new();
    for view in views {
        if let Some(time) = view.post.scheduled_time {
            days.entry(time.date_naive()).or_default().push(view);
        }
    }

    Ok(days
        .into_iter()
        .map(|(date, posts)| CalendarDay { date, posts })
        .collect())
}

/// Pending posts whose send time has arrived, oldest first.
pub fn due_posts(conn: &Connection, now: DateTime<Utc>, limit: u32) -> AppResult<Vec<PostView>> {
    let now = format_timestamp(&now);
    let limit = i64::from(limit.clamp(1, 500));
    let views = query_views(
        conn,
        "WHERE p.status = 'pending' AND p.scheduled_time IS NOT NULL AND p.scheduled_time <= ?1",
        "p.scheduled_time ASC, p.id ASC LIMIT ?2",
        &[&now, &limit],
    )?;
    Ok(views)
}

/// "Schedule this content": an unscheduled post built from a library item.
pub fn schedule_media(conn: &mut Connection, media_id: &str) -> AppResult<PostView> {
    let (description, character_id): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT m.description, c.id
             FROM media_content m
             LEFT JOIN character_profiles c ON c.id = m.character_profile_id AND c.is_active = 1
             WHERE m.id = ?1",
            params![media_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    create_post(
        conn,
        &NewPost {
            post_description: description,
            media_content_id: Some(media_id.to_string()),
            character_profile_id: character_id,
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::characters::{
        create_character, delete_character, update_character, CharacterUpdate, NewCharacter,
    };
    use crate::content::media::{create_media, NewMedia};
    use crate::content::platforms::{create_platform, delete_platform, NewPlatform};
    use crate::content::CharacterRole;
    use crate::db;
    use chrono::{Duration, TimeZone};

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        for (_, sql) in db::MIGRATIONS {
            conn.execute_batch(sql).unwrap();
        }
        conn
    }

    fn character(conn: &Connection, name: &str) -> String {
        create_character(
            conn,
            &NewCharacter {
                name: name.into(),
                username: name.to_lowercase(),
                description: None,
                role: CharacterRole::Manager,
                is_active: true,
            },
        )
        .unwrap()
        .id
    }

    fn platform(conn: &Connection, name: &str) -> String {
        create_platform(
            conn,
            &NewPlatform {
                name: name.into(),
                url: None,
                is_active: true,
            },
        )
        .unwrap()
        .id
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn unscheduled_post_is_listed_as_needing_scheduling_only() {
        let mut conn = conn();
        let cleo = character(&conn, "Cleo");
        let post = create_post(
            &mut conn,
            &NewPost {
                post_description: Some("Drop day!".into()),
                character_profile_id: Some(cleo.clone()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(post.needs_scheduling);
        assert_eq!(post.character.as_ref().map(|c| c.id.as_str()), Some(cleo.as_str()));

        let pending = needs_scheduling(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].post.id, post.post.id);

        let days = calendar(
            &conn,
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2000, 12, 31).unwrap(),
        )
        .unwrap();
        assert!(days.is_empty());

        // Once scheduled it moves into the calendar
        let time = utc(2000, 6, 1, 15);
        set_schedule(&conn, &post.post.id, Some(time)).unwrap();
        assert!(needs_scheduling(&conn).unwrap().is_empty());
        let days = calendar(
            &conn,
            NaiveDate::from_ymd_opt(2000, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2000, 6, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].posts[0].post.id, post.post.id);
    }

    #[test]
    fn calendar_groups_by_utc_day() {
        let mut conn = conn();
        for time in [utc(2026, 5, 1, 9), utc(2026, 5, 1, 18), utc(2026, 5, 3, 7)] {
            create_post(
                &mut conn,
                &NewPost {
                    scheduled_time: Some(time),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        // outside the window
        create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(utc(2026, 5, 4, 0)),
                ..Default::default()
            },
        )
        .unwrap();

        let days = calendar(
            &conn,
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 3).unwrap(),
        )
        .unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 5, 1).unwrap());
        assert_eq!(days[0].posts.len(), 2);
        assert_eq!(days[1].posts.len(), 1);
    }

    #[test]
    fn calendar_rejects_inverted_range() {
        let conn = conn();
        let result = calendar(
            &conn,
            NaiveDate::from_ymd_opt(2026, 5, 3).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn calendar_rejects_dates_outside_four_digit_years() {
        let conn = conn();
        let result = calendar(&conn, NaiveDate::MAX, NaiveDate::MAX);
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        let result = calendar(
            &conn,
            NaiveDate::from_ymd_opt(9999, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(10000, 1, 1).unwrap(),
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn calendar_covers_the_last_second_of_year_9999() {
        let mut conn = conn();
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        let post = create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(last),
                ..Default::default()
            },
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        let days = calendar(&conn, day, day).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].posts[0].post.id, post.post.id);
    }

    #[test]
    fn send_time_beyond_year_9999_is_rejected() {
        let mut conn = conn();
        let far = utc(10000, 1, 1, 0);
        let result = create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(far),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(list_posts(&conn, &PostFilter::default()).unwrap().is_empty());

        let post = create_post(&mut conn, &NewPost::default()).unwrap();
        let result = set_schedule(&conn, &post.post.id, Some(far));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(get_post(&conn, &post.post.id).unwrap().scheduled_time, None);
        assert!(due_posts(&conn, far, 50).unwrap().is_empty());
    }

    #[test]
    fn unreadable_stored_send_time_is_an_error() {
        let mut conn = conn();
        let post = create_post(&mut conn, &NewPost::default()).unwrap();
        conn.execute(
            "UPDATE scheduled_posts SET scheduled_time = '+10000-01-01T00:00:00Z' WHERE id = ?1",
            params![post.post.id],
        )
        .unwrap();

        assert!(matches!(
            get_post(&conn, &post.post.id),
            Err(AppError::Database(_))
        ));
    }

    #[test]
    fn post_without_platforms_carries_warning() {
        let mut conn = conn();
        let post = create_post(&mut conn, &NewPost::default()).unwrap();
        assert_eq!(post.warnings, vec![NO_PLATFORMS_WARNING.to_string()]);

        let ig = platform(&conn, "Instagram");
        let post = create_post(
            &mut conn,
            &NewPost {
                platform_ids: vec![ig],
                ..Default::default()
            },
        )
        .unwrap();
        assert!(post.warnings.is_empty());
        assert_eq!(post.platforms.len(), 1);
    }

    #[test]
    fn create_with_unknown_platform_creates_nothing() {
        let mut conn = conn();
        let result = create_post(
            &mut conn,
            &NewPost {
                platform_ids: vec!["ghost".into()],
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(list_posts(&conn, &PostFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn inactive_character_cannot_be_assigned() {
        let mut conn = conn();
        let cleo = character(&conn, "Cleo");
        update_character(
            &conn,
            &cleo,
            &CharacterUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

        let result = create_post(
            &mut conn,
            &NewPost {
                character_profile_id: Some(cleo),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn deleted_references_resolve_to_null() {
        let mut conn = conn();
        let cleo = character(&conn, "Cleo");
        let ig = platform(&conn, "Instagram");
        let post = create_post(
            &mut conn,
            &NewPost {
                character_profile_id: Some(cleo.clone()),
                platform_ids: vec![ig.clone()],
                ..Default::default()
            },
        )
        .unwrap();

        delete_character(&conn, &cleo).unwrap();
        delete_platform(&conn, &ig).unwrap();

        let posts = list_posts(&conn, &PostFilter::default()).unwrap();
        assert_eq!(posts.len(), 1);
        let view = &posts[0];
        assert_eq!(view.post.id, post.post.id);
        assert!(view.character.is_none());
        assert!(view.post.character_profile_id.is_none());
        assert!(view.platforms.is_empty());
    }

    #[test]
    fn cancel_is_one_way_and_blocks_delete() {
        let mut conn = conn();
        let post = create_post(&mut conn, &NewPost::default()).unwrap();
        let id = post.post.id;

        let cancelled = cancel_post(&conn, &id).unwrap();
        assert_eq!(cancelled.post.status, PostStatus::Cancelled);

        assert!(matches!(cancel_post(&conn, &id), Err(AppError::Conflict(_))));
        assert!(matches!(
            set_schedule(&conn, &id, Some(Utc::now())),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            edit_post(&mut conn, &id, &PostEdit::default()),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(delete_post(&conn, &id), Err(AppError::Conflict(_))));
    }

    #[test]
    fn failed_delivery_keeps_message_and_view_survives_missing_one() {
        let mut conn = conn();
        let post = create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(Utc::now() - Duration::minutes(5)),
                ..Default::default()
            },
        )
        .unwrap();
        let id = post.post.id;

        let failed = record_delivery(
            &conn,
            &id,
            DeliveryOutcome::Failed {
                error_message: Some("Telegram API returned 429".into()),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(failed.post.status, PostStatus::Failed);
        assert_eq!(
            failed.post.error_message.as_deref(),
            Some("Telegram API returned 429")
        );

        // Rows written by other tools may lack the message; reading must still work
        conn.execute(
            "UPDATE scheduled_posts SET error_message = NULL WHERE id = ?1",
            params![id],
        )
        .unwrap();
        let view = get_post_view(&conn, &id).unwrap();
        assert_eq!(view.post.status, PostStatus::Failed);
        assert!(view.post.error_message.is_none());
    }

    #[test]
    fn due_posts_only_returns_pending_past_times() {
        let mut conn = conn();
        let now = Utc::now();
        let due = create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(now - Duration::minutes(1)),
                ..Default::default()
            },
        )
        .unwrap();
        create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(now + Duration::hours(1)),
                ..Default::default()
            },
        )
        .unwrap();
        create_post(&mut conn, &NewPost::default()).unwrap();
        let cancelled = create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(now - Duration::minutes(2)),
                ..Default::default()
            },
        )
        .unwrap();
        cancel_post(&conn, &cancelled.post.id).unwrap();

        let posts = due_posts(&conn, now, 50).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post.id, due.post.id);
        assert!(posts[0].is_overdue);
    }

    #[test]
    fn edit_replaces_platforms_and_clears_fields() {
        let mut conn = conn();
        let a = platform(&conn, "A");
        let b = platform(&conn, "B");
        let c = platform(&conn, "C");
        let post = create_post(
            &mut conn,
            &NewPost {
                thread_id: Some("77".into()),
                platform_ids: vec![a, b.clone()],
                ..Default::default()
            },
        )
        .unwrap();

        let edit: PostEdit = serde_json::from_value(serde_json::json!({
            "thread_id": null,
            "platform_ids": [b.clone(), c.clone()]
        }))
        .unwrap();
        let view = edit_post(&mut conn, &post.post.id, &edit).unwrap();
        assert_eq!(view.post.thread_id, None);
        let mut ids: Vec<String> = view.platforms.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        let mut expected = vec![b, c];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn failed_edit_keeps_previous_platforms_and_fields() {
        let mut conn = conn();
        let a = platform(&conn, "A");
        let b = platform(&conn, "B");
        let post = create_post(
            &mut conn,
            &NewPost {
                post_description: Some("Original".into()),
                platform_ids: vec![a.clone()],
                ..Default::default()
            },
        )
        .unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_description BEFORE UPDATE OF post_description
             ON scheduled_posts WHEN NEW.post_description = 'rejected'
             BEGIN SELECT RAISE(ABORT, 'rejected description'); END;",
        )
        .unwrap();

        let edit: PostEdit = serde_json::from_value(serde_json::json!({
            "post_description": "rejected",
            "platform_ids": [b]
        }))
        .unwrap();
        assert!(edit_post(&mut conn, &post.post.id, &edit).is_err());

        let view = get_post_view(&conn, &post.post.id).unwrap();
        assert_eq!(view.post.post_description.as_deref(), Some("Original"));
        let ids: Vec<String> = view.platforms.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![a]);
    }

    #[test]
    fn post_due_now_is_handed_out_and_overdue() {
        let mut conn = conn();
        let now = Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap();
        let post = create_post(
            &mut conn,
            &NewPost {
                scheduled_time: Some(now),
                ..Default::default()
            },
        )
        .unwrap();

        let due = due_posts(&conn, now, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].post.id, post.post.id);
        assert!(due[0].is_overdue);
    }

    #[test]
    fn schedule_media_creates_unscheduled_post() {
        let mut conn = conn();
        let cleo = character(&conn, "Cleo");
        let media = create_media(
            &conn,
            &NewMedia {
                title: "Teaser".into(),
                description: Some("Coming soon".into()),
                file_type: FileType::Video,
                file_url: None,
                file_size: None,
                storage_key: None,
                character_profile_id: Some(cleo.clone()),
            },
        )
        .unwrap();

        let view = schedule_media(&mut conn, &media.id).unwrap();
        assert!(view.needs_scheduling);
        assert_eq!(view.post.media_content_id.as_deref(), Some(media.id.as_str()));
        assert_eq!(view.post.character_profile_id.as_deref(), Some(cleo.as_str()));
        assert_eq!(view.post.post_description.as_deref(), Some("Coming soon"));
        assert_eq!(view.media.as_ref().map(|m| m.file_type), Some(FileType::Video));

        assert!(matches!(
            schedule_media(&mut conn, "missing"),
            Err(AppError::NotFound)
        ));
    }
}
