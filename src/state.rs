use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{IdentityProvider, OAuthClient};
use crate::chat::{ChatBackend, HttpChatBackend};
use crate::config::Config;
use crate::events::EventBus;
use crate::graphql::{build_schema, ContentSchema};
use crate::preferences::{PreferenceStore, SqlitePreferenceStore};
use crate::storage::MediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub store: MediaStore,
    pub identity: Arc<dyn IdentityProvider>,
    pub chat: Arc<dyn ChatBackend>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub events: EventBus,
    pub graphql_schema: ContentSchema,
}

impl AppState {
    /// Wire up the production collaborators from configuration.
    pub fn new(db: DbPool, config: Config) -> anyhow::Result<Self> {
        let store = MediaStore::new(config.uploads_path(), &config.storage.public_base_url);
        let identity = Arc::new(OAuthClient::new(config.oauth.clone()));
        let chat = Arc::new(HttpChatBackend::new(&config.chat)?);
        let preferences = Arc::new(SqlitePreferenceStore::new(db.clone()));

        Ok(Self {
            store,
            identity,
            chat,
            preferences,
            events: EventBus::default(),
            graphql_schema: build_schema(),
            config: Arc::new(config),
            db,
        })
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatBackend>) -> Self {
        self.chat = chat;
        self
    }
}
