use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::content::nullable;
use crate::db::models::{now_timestamp, SocialPlatform};
use crate::error::{is_constraint_violation, AppError, AppResult};

const COLUMNS: &str = "id, name, url, is_active, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlatform {
    pub name: String,
    pub url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Compact platform reference embedded in post views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, async_graphql::SimpleObject)]
pub struct PlatformRef {
    pub id: String,
    pub name: String,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<SocialPlatform> {
    Ok(SocialPlatform {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Platform name is required".into()));
    }
    Ok(name.to_string())
}

fn validate_url(url: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let parsed = url::Url::parse(raw)
        .map_err(|_| AppError::BadRequest(format!("Invalid platform URL: {}", raw)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::BadRequest(
            "Platform URL must use http or https".into(),
        ));
    }
    Ok(Some(parsed.to_string()))
}

fn map_unique(err: rusqlite::Error, name: &str) -> AppError {
    if is_constraint_violation(&err) {
        AppError::Conflict(format!("A platform named '{}' already exists", name))
    } else {
        AppError::Database(err)
    }
}

pub fn create_platform(conn: &Connection, input: &NewPlatform) -> AppResult<SocialPlatform> {
    let name = validate_name(&input.name)?;
    let url = validate_url(input.url.as_deref())?;
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO social_platforms (id, name, url, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, url, input.is_active, now_timestamp()],
    )
    .map_err(|e| map_unique(e, &name))?;

    get_platform(conn, &id)
}

pub fn get_platform(conn: &Connection, id: &str) -> AppResult<SocialPlatform> {
    conn.query_row(
        &format!("SELECT {} FROM social_platforms WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn list_platforms(conn: &Connection, active_only: bool) -> AppResult<Vec<SocialPlatform>> {
    let filter = if active_only { "WHERE is_active = 1" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM social_platforms {} ORDER BY name COLLATE NOCASE",
        COLUMNS, filter
    ))?;
    let platforms = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(platforms)
}

pub fn update_platform(
    conn: &Connection,
    id: &str,
    update: &PlatformUpdate,
) -> AppResult<SocialPlatform> {
    let mut current = get_platform(conn, id)?;

    if let Some(name) = &update.name {
        current.name = validate_name(name)?;
    }
    if let Some(url) = &update.url {
        current.url = validate_url(url.as_deref())?;
    }
    if let Some(is_active) = update.is_active {
        current.is_active = is_active;
    }

    conn.execute(
        "UPDATE social_platforms SET name = ?1, url = ?2, is_active = ?3 WHERE id = ?4",
        params![current.name, current.url, current.is_active, id],
    )
    .map_err(|e| map_unique(e, &current.name))?;

    get_platform(conn, id)
}

/// Deleting a platform drops its join rows with it; posts simply lose that destination.
pub fn delete_platform(conn: &Connection, id: &str) -> AppResult<()> {
    let deleted = conn.execute("DELETE FROM social_platforms WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!(platform_id = %id, "Deleted platform");
    Ok(())
}

/// Platforms currently attached to a post. Joins through the registry, so a
/// join row whose platform no longer exists is never returned.
pub fn platforms_for_post(conn: &Connection, post_id: &str) -> AppResult<Vec<PlatformRef>> {
    let mut stmt = conn.prepare(
        "SELECT sp.id, sp.name
         FROM post_platforms pp
         JOIN social_platforms sp ON sp.id = pp.platform_id
         WHERE pp.scheduled_post_id = ?1
         ORDER BY sp.name COLLATE NOCASE",
    )?;
    let platforms = stmt
        .query_map(params![post_id], |row| {
            Ok(PlatformRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(platforms)
}

/// Replace the full platform set of a post.
///
/// Unknown ids are rejected before anything is written. The delete and the
/// inserts share one transaction, so a failure leaves the previous set intact.
pub fn replace_post_platforms(
    conn: &mut Connection,
    post_id: &str,
    platform_ids: &[String],
) -> AppResult<Vec<PlatformRef>> {
    let tx = conn.transaction()?;
    write_post_platforms(&tx, post_id, platform_ids)?;
    tx.commit()?;
    platforms_for_post(conn, post_id)
}

/// Body of [`replace_post_platforms`] for callers that already hold a
/// transaction. Nothing is committed here.
pub(crate) fn write_post_platforms(
    tx: &Connection,
    post_id: &str,
    platform_ids: &[String],
) -> AppResult<()> {
    let wanted: BTreeSet<&str> = platform_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();

    let post_exists: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM scheduled_posts WHERE id = ?1",
        params![post_id],
        |row| row.get(0),
    )?;
    if !post_exists {
        return Err(AppError::NotFound);
    }

    let mut unknown = Vec::new();
    for id in &wanted {
        let exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM social_platforms WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if !exists {
            unknown.push(*id);
        }
    }
    if !unknown.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Unknown platform id(s): {}",
            unknown.join(", ")
        )));
    }

    tx.execute(
        "DELETE FROM post_platforms WHERE scheduled_post_id = ?1",
        params![post_id],
    )?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO post_platforms (scheduled_post_id, platform_id) VALUES (?1, ?2)",
        )?;
        for id in &wanted {
            insert.execute(params![post_id, id])?;
        }
    }

    tracing::debug!(post_id = %post_id, count = wanted.len(), "Replaced post platforms");
    Ok(())
}
