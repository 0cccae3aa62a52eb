//! OAuth credential lifecycle for the Responses backends.
//!
//! A [`CredentialManager`] owns exactly one credential identity (an issuer
//! plus client id, or a static API key) and lends out immutable
//! [`TokenSnapshot`]s. Refreshes are single-flight: concurrent callers that
//! observe an expiring token share one in-flight refresh.

mod auth_manager;
mod credential;
mod error;
mod oauth;
mod pkce;
mod storage;
mod token_data;

pub use auth_manager::AuthState;
pub use auth_manager::CredentialManager;
pub use credential::Credential;
pub use credential::TokenSnapshot;
pub use error::AuthError;
pub use oauth::CLIENT_ID;
pub use oauth::DEFAULT_ISSUER;
pub use oauth::OAuthConfig;
pub use oauth::build_authorize_url;
pub use pkce::PkceCodes;
pub use pkce::generate_pkce;
pub use pkce::generate_state;
pub use storage::AuthDotJson;
pub use storage::get_auth_file;
pub use storage::try_read_auth_json;
pub use storage::write_auth_json;
pub use token_data::IdTokenInfo;
pub use token_data::parse_id_token;
