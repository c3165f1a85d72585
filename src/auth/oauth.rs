//! OAuth authorization-code sign-in for the single admin account.
//!
//! The provider is behind [`IdentityProvider`] so handlers can be exercised
//! without a network. [`OAuthClient`] speaks the GitHub-style flavour of the
//! protocol: form-encoded token exchange answered with JSON, then a bearer
//! request for the profile.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("OAuth is not configured")]
    NotConfigured,

    #[error("provider rejected the request: {0}")]
    Rejected(String),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::NotConfigured => AppError::Internal(err.to_string()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// Profile as returned by the provider's user endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

/// What the client gets to see about the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizedUser {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
}

impl From<&crate::db::models::User> for SanitizedUser {
    fn from(user: &crate::db::models::User) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            profile_url: user.profile_url.clone(),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start sign-in.
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError>;

    /// Trade an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError>;

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, OAuthError>;
}

pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn ensure_configured(&self) -> Result<(), OAuthError> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(OAuthError::NotConfigured);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        if self.config.client_id.is_empty() {
            return Err(OAuthError::NotConfigured);
        }
        let mut url = url::Url::parse(&self.config.authorize_url)
            .map_err(|e| OAuthError::Rejected(format!("bad authorize URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scope)
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        self.ensure_configured()?;

        let response: TokenResponse = self
            .http
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Errors come back as 200 with an `error` field
        if let Some(error) = response.error {
            return Err(OAuthError::Rejected(
                response.error_description.unwrap_or(error),
            ));
        }
        response
            .access_token
            .ok_or_else(|| OAuthError::Rejected("no access token in response".into()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, OAuthError> {
        let user = self
            .http
            .get(&self.config.user_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, "content-center")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(user)
    }
}

/// Only the configured account may sign in. Logins compare ASCII case-insensitively.
pub fn authorize_username(user: &ProviderUser, allowed: &str) -> Result<(), AppError> {
    let allowed = allowed.trim();
    if !allowed.is_empty() && user.login.eq_ignore_ascii_case(allowed) {
        return Ok(());
    }
    tracing::warn!(login = %user.login, "Rejected sign-in from unauthorized account");
    Err(AppError::Forbidden(format!(
        "Access is restricted to the '{}' account",
        allowed
    )))
}

/// Random value for the `state` parameter.
pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}
