use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::content::characters::require_active_character;
use crate::content::{clean_text, nullable, FileType};
use crate::db::models::{now_timestamp, MediaContent};
use crate::error::{AppError, AppResult};

const COLUMNS: &str = "id, title, description, file_url, file_type, file_size, storage_key, \
                       character_profile_id, created_at, updated_at";

/// A library item ready to be inserted. The upload, if any, has already happened.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub title: String,
    pub description: Option<String>,
    pub file_type: FileType,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
    pub storage_key: Option<String>,
    pub character_profile_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub character_profile_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFilter {
    pub character_id: Option<String>,
    pub file_type: Option<FileType>,
}

/// Compact media reference embedded in post views.
#[derive(Debug, Clone, Serialize, async_graphql::SimpleObject)]
pub struct MediaRef {
    pub id: String,
    pub title: String,
    pub file_url: Option<String>,
    pub file_type: FileType,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<MediaContent> {
    let file_type: String = row.get(4)?;
    Ok(MediaContent {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        file_url: row.get(3)?,
        file_type: file_type.parse().unwrap_or(FileType::Other),
        file_size: row.get(5)?,
        storage_key: row.get(6)?,
        character_profile_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".into()));
    }
    Ok(title.to_string())
}

/// Interactive items point at an externally hosted experience.
pub fn validate_interactive_url(raw: &str) -> AppResult<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid interactive URL: {}", raw)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::BadRequest(
            "Interactive URL must use http or https".into(),
        ));
    }
    Ok(parsed.to_string())
}

pub fn create_media(conn: &Connection, input: &NewMedia) -> AppResult<MediaContent> {
    let title = validate_title(&input.title)?;
    if let Some(character_id) = &input.character_profile_id {
        require_active_character(conn, character_id)?;
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO media_content
            (id, title, description, file_url, file_type, file_size, storage_key,
             character_profile_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            id,
            title,
            clean_text(input.description.as_deref()),
            input.file_url,
            input.file_type.as_str(),
            input.file_size,
            input.storage_key,
            input.character_profile_id,
            now_timestamp(),
        ],
    )?;

    tracing::info!(media_id = %id, file_type = input.file_type.as_str(), "Created media item");
    get_media(conn, &id)
}

pub fn get_media(conn: &Connection, id: &str) -> AppResult<MediaContent> {
    conn.query_row(
        &format!("SELECT {} FROM media_content WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn list_media(conn: &Connection, filter: &MediaFilter) -> AppResult<Vec<MediaContent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM media_content
         WHERE (?1 IS NULL OR character_profile_id = ?1)
           AND (?2 IS NULL OR file_type = ?2)
         ORDER BY created_at DESC, id DESC",
        COLUMNS
    ))?;
    let media = stmt
        .query_map(
            params![
                filter.character_id,
                filter.file_type.map(|t| t.as_str())
            ],
            from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}

pub fn update_media(conn: &Connection, id: &str, update: &MediaUpdate) -> AppResult<MediaContent> {
    let mut current = get_media(conn, id)?;

    if let Some(title) = &update.title {
        current.title = validate_title(title)?;
    }
    if let Some(description) = &update.description {
        current.description = clean_text(description.as_deref());
    }
    if let Some(character_id) = &update.character_profile_id {
        if let Some(character_id) = character_id {
            require_active_character(conn, character_id)?;
        }
        current.character_profile_id = character_id.clone();
    }

    conn.execute(
        "UPDATE media_content
         SET title = ?1, description = ?2, character_profile_id = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            current.title,
            current.description,
            current.character_profile_id,
            now_timestamp(),
            id
        ],
    )?;

    get_media(conn, id)
}

/// Removes the row and returns it, so the caller can clean up the stored object.
/// Posts that used the item keep existing with the reference set to null.
pub fn delete_media(conn: &Connection, id: &str) -> AppResult<MediaContent> {
    let media = get_media(conn, id)?;
    conn.execute("DELETE FROM media_content WHERE id = ?1", params![id])?;
    tracing::info!(media_id = %id, "Deleted media item");
    Ok(media)
}

pub fn require_media(conn: &Connection, id: &str) -> AppResult<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM media_content WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::BadRequest(format!(
            "Media item {} does not exist",
            id
        )));
    }
    Ok(())
}
