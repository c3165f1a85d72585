use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{format_timestamp, parse_timestamp, Session, User};
use crate::error::AppResult;

/// Create a new session for a user.
pub fn create_session(conn: &Connection, user_id: &str, hours: u64) -> AppResult<Session> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let expires_at = Utc::now() + Duration::hours(hours as i64);

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, user_id, token, format_timestamp(&expires_at)],
    )?;

    Ok(Session {
        id,
        user_id: user_id.to_string(),
        token,
        // round-trip through storage precision
        expires_at: parse_timestamp(&format_timestamp(&expires_at)).unwrap_or(expires_at),
    })
}

/// A session is valid while its stored expiry is strictly in the future.
pub fn is_session_valid(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at > now
}

/// Look up a session and its user. Expired sessions are treated as absent.
pub fn find_session(conn: &Connection, token: &str) -> AppResult<Option<(Session, User)>> {
    let row = conn
        .query_row(
            "SELECT s.id, s.user_id, s.token, s.expires_at,
                    u.id, u.username, u.display_name, u.avatar_url, u.profile_url, u.created_at
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1",
            params![token],
            |row| {
                let expires_at: String = row.get(3)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    expires_at,
                    User {
                        id: row.get(4)?,
                        username: row.get(5)?,
                        display_name: row.get(6)?,
                        avatar_url: row.get(7)?,
                        profile_url: row.get(8)?,
                        created_at: row.get(9)?,
                    },
                ))
            },
        )
        .optional()?;

    let Some((id, user_id, token, expires_at, user)) = row else {
        return Ok(None);
    };
    let Some(expires_at) = parse_timestamp(&expires_at) else {
        tracing::warn!(session_id = %id, "Session has unreadable expiry");
        return Ok(None);
    };
    if !is_session_valid(expires_at, Utc::now()) {
        return Ok(None);
    }

    Ok(Some((
        Session {
            id,
            user_id,
            token,
            expires_at,
        },
        user,
    )))
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> AppResult<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every session that expired before `now`.
pub fn purge_expired(conn: &Connection, now: DateTime<Utc>) -> AppResult<usize> {
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![format_timestamp(&now)],
    )?;
    Ok(removed)
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    hex::encode(bytes)
}
