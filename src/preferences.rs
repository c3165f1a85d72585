//! Per-user dashboard settings (open tab, theme).

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::models::now_timestamp;
use crate::error::AppResult;
use crate::state::DbPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DashboardTab {
    #[default]
    Dashboard,
    Characters,
    Platforms,
    Media,
    Schedule,
    Calendar,
}

impl DashboardTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Characters => "characters",
            Self::Platforms => "platforms",
            Self::Media => "media",
            Self::Schedule => "schedule",
            Self::Calendar => "calendar",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "characters" => Self::Characters,
            "platforms" => Self::Platforms,
            "media" => Self::Media,
            "schedule" => Self::Schedule,
            "calendar" => Self::Calendar,
            _ => Self::Dashboard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub active_tab: DashboardTab,
    pub dark_mode: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub active_tab: Option<DashboardTab>,
    pub dark_mode: Option<bool>,
}

impl Preferences {
    pub fn apply(self, update: &PreferencesUpdate) -> Self {
        Self {
            active_tab: update.active_tab.unwrap_or(self.active_tab),
            dark_mode: update.dark_mode.unwrap_or(self.dark_mode),
        }
    }
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Stored preferences, or the defaults for a user who never saved any.
    async fn load(&self, user_id: &str) -> AppResult<Preferences>;

    async fn save(&self, user_id: &str, prefs: &Preferences) -> AppResult<()>;
}

pub struct SqlitePreferenceStore {
    db: DbPool,
}

impl SqlitePreferenceStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn load(&self, user_id: &str) -> AppResult<Preferences> {
        let conn = self.db.get()?;
        let row: Option<(String, bool)> = conn
            .query_row(
                "SELECT active_tab, dark_mode FROM preferences WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row
            .map(|(tab, dark_mode)| Preferences {
                active_tab: DashboardTab::parse(&tab),
                dark_mode,
            })
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, prefs: &Preferences) -> AppResult<()> {
        let conn = self.db.get()?;
        conn.execute(
            "INSERT INTO preferences (user_id, active_tab, dark_mode, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                active_tab = excluded.active_tab,
                dark_mode = excluded.dark_mode,
                updated_at = excluded.updated_at",
            params![user_id, prefs.active_tab.as_str(), prefs.dark_mode, now_timestamp()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn store() -> SqlitePreferenceStore {
        let pool = db::create_memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute("INSERT INTO users (id, username) VALUES ('u1', 'admin')", [])
            .unwrap();
        SqlitePreferenceStore::new(pool)
    }

    #[tokio::test]
    async fn defaults_when_nothing_saved() {
        let store = store();
        assert_eq!(store.load("u1").await.unwrap(), Preferences::default());
    }

    #[tokio::test]
    async fn saved_preferences_round_trip() {
        let store = store();
        let prefs = Preferences::default().apply(&PreferencesUpdate {
            active_tab: Some(DashboardTab::Calendar),
            dark_mode: Some(true),
        });
        store.save("u1", &prefs).await.unwrap();
        assert_eq!(store.load("u1").await.unwrap(), prefs);

        let prefs = prefs.apply(&PreferencesUpdate {
            dark_mode: Some(false),
            ..Default::default()
        });
        store.save("u1", &prefs).await.unwrap();
        let loaded = store.load("u1").await.unwrap();
        assert_eq!(loaded.active_tab, DashboardTab::Calendar);
        assert!(!loaded.dark_mode);
    }

    #[test]
    fn tab_names_use_kebab_case() {
        let tab: DashboardTab = serde_json::from_str(r#""calendar""#).unwrap();
        assert_eq!(tab, DashboardTab::Calendar);
        assert_eq!(DashboardTab::parse("unknown"), DashboardTab::Dashboard);
    }
}
