use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::content::{clean_text, nullable, CharacterRole};
use crate::db::models::{now_timestamp, CharacterProfile};
use crate::error::{AppError, AppResult};

const COLUMNS: &str =
    "id, name, username, avatar_url, description, role, is_active, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewCharacter {
    pub name: String,
    pub username: String,
    pub description: Option<String>,
    pub role: CharacterRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharacterUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub role: Option<CharacterRole>,
    pub is_active: Option<bool>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<CharacterProfile> {
    let role: String = row.get(5)?;
    Ok(CharacterProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        avatar_url: row.get(3)?,
        description: row.get(4)?,
        // CHECK constraint keeps this in range; fall back rather than fail the list
        role: role.parse().unwrap_or(CharacterRole::Mascot),
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Usernames are stored without a leading `@`.
fn normalize_username(value: &str) -> AppResult<String> {
    required("Username", value.trim().trim_start_matches('@'))
}

pub fn create_character(conn: &Connection, input: &NewCharacter) -> AppResult<CharacterProfile> {
    let name = required("Name", &input.name)?;
    let username = normalize_username(&input.username)?;
    let id = uuid::Uuid::now_v7().to_string();
    let now = now_timestamp();

    conn.execute(
        "INSERT INTO character_profiles
            (id, name, username, description, role, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id,
            name,
            username,
            clean_text(input.description.as_deref()),
            input.role.as_str(),
            input.is_active,
            now,
        ],
    )?;

    tracing::info!(character_id = %id, "Created character profile");
    get_character(conn, &id)
}

pub fn get_character(conn: &Connection, id: &str) -> AppResult<CharacterProfile> {
    conn.query_row(
        &format!("SELECT {} FROM character_profiles WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn list_characters(conn: &Connection, active_only: bool) -> AppResult<Vec<CharacterProfile>> {
    let sql = if active_only {
        format!(
            "SELECT {} FROM character_profiles WHERE is_active = 1 ORDER BY name COLLATE NOCASE",
            COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM character_profiles ORDER BY name COLLATE NOCASE",
            COLUMNS
        )
    };

    let mut stmt = conn.prepare(&sql)?;
    let characters = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(characters)
}

pub fn update_character(
    conn: &Connection,
    id: &str,
    update: &CharacterUpdate,
) -> AppResult<CharacterProfile> {
    let mut current = get_character(conn, id)?;

    if let Some(name) = &update.name {
        current.name = required("Name", name)?;
    }
    if let Some(username) = &update.username {
        current.username = normalize_username(username)?;
    }
    if let Some(description) = &update.description {
        current.description = clean_text(description.as_deref());
    }
    if let Some(role) = update.role {
        current.role = role;
    }
    if let Some(is_active) = update.is_active {
        current.is_active = is_active;
    }

    conn.execute(
        "UPDATE character_profiles
         SET name = ?1, username = ?2, description = ?3, role = ?4, is_active = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            current.name,
            current.username,
            current.description,
            current.role.as_str(),
            current.is_active,
            now_timestamp(),
            id,
        ],
    )?;

    get_character(conn, id)
}

pub fn set_avatar_url(
    conn: &Connection,
    id: &str,
    avatar_url: Option<&str>,
) -> AppResult<CharacterProfile> {
    let updated = conn.execute(
        "UPDATE character_profiles SET avatar_url = ?1, updated_at = ?2 WHERE id = ?3",
        params![avatar_url, now_timestamp(), id],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    get_character(conn, id)
}

/// Hard delete. Posts and media that referenced the profile keep existing with
/// the reference resolved to null by the schema.
pub fn delete_character(conn: &Connection, id: &str) -> AppResult<()> {
    let deleted = conn.execute("DELETE FROM character_profiles WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!(character_id = %id, "Deleted character profile");
    Ok(())
}

/// Guard for assigning a persona to a post or media item.
pub fn require_active_character(conn: &Connection, id: &str) -> AppResult<()> {
    let is_active: Option<bool> = conn
        .query_row(
            "SELECT is_active FROM character_profiles WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    match is_active {
        Some(true) => Ok(()),
        Some(false) => Err(AppError::BadRequest(format!(
            "Character profile {} is inactive",
            id
        ))),
        None => Err(AppError::BadRequest(format!(
            "Character profile {} does not exist",
            id
        ))),
    }
}
