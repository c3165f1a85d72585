pub mod oauth;
pub mod session;
pub mod users;
pub mod worker;

pub use oauth::{IdentityProvider, OAuthClient, ProviderUser, SanitizedUser};
