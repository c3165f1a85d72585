use rusqlite::{params, Connection};

use crate::auth::oauth::ProviderUser;
use crate::db::models::{now_timestamp, User};
use crate::error::AppResult;

/// Insert or refresh the local record for a provider account.
pub fn upsert_user(conn: &Connection, profile: &ProviderUser) -> AppResult<User> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO users (id, username, display_name, avatar_url, profile_url, created_at, last_login_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(username) DO UPDATE SET
            display_name = excluded.display_name,
            avatar_url = excluded.avatar_url,
            profile_url = excluded.profile_url,
            last_login_at = excluded.last_login_at",
        params![
            uuid::Uuid::now_v7().to_string(),
            profile.login,
            profile.name,
            profile.avatar_url,
            profile.html_url,
            now,
        ],
    )?;

    let user = conn.query_row(
        "SELECT id, username, display_name, avatar_url, profile_url, created_at
         FROM users WHERE username = ?1",
        params![profile.login],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                display_name: row.get(2)?,
                avatar_url: row.get(3)?,
                profile_url: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )?;
    Ok(user)
}
