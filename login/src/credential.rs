use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::oauth::OAuthConfig;
use crate::oauth::TokenResponse;
use crate::token_data::IdTokenInfo;
use crate::token_data::jwt_expiry;
use crate::token_data::parse_id_token;

/// Used when the issuer reports neither `expires_in` nor a JWT `exp` claim.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 60 * 60;

/// Tokens for one issuer/client identity. Only the
/// [`CredentialManager`](crate::CredentialManager) holds these; everyone
/// else receives a [`TokenSnapshot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub client_id: String,
    pub issuer: String,
    #[serde(default)]
    pub id_token: IdTokenInfo,
}

impl Credential {
    /// Builds the next credential from a token-endpoint response. On refresh
    /// the issuer may omit the id token or the refresh token; those carry
    /// over from `previous`.
    pub(crate) fn from_token_response(
        tokens: TokenResponse,
        config: &OAuthConfig,
        previous: Option<&Credential>,
    ) -> Result<Self, String> {
        let refresh_token = match (tokens.refresh_token, previous) {
            (Some(token), _) => token,
            (None, Some(previous)) => previous.refresh_token.clone(),
            (None, None) => return Err("token response did not include a refresh_token".into()),
        };

        let id_token = match (tokens.id_token.as_deref(), previous) {
            (Some(raw), _) => parse_id_token(raw).unwrap_or_else(|err| {
                debug!("ignoring unparseable id_token: {err}");
                IdTokenInfo::default()
            }),
            (None, Some(previous)) => previous.id_token.clone(),
            (None, None) => IdTokenInfo::default(),
        };

        let now = Utc::now();
        let expires_at = tokens
            .expires_in
            .map(|secs| now + chrono::Duration::seconds(secs))
            .or_else(|| jwt_expiry(&tokens.access_token))
            .unwrap_or_else(|| now + chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        Ok(Self {
            access_token: tokens.access_token,
            refresh_token,
            expires_at,
            client_id: config.client_id.clone(),
            issuer: config.issuer.clone(),
            id_token,
        })
    }

    /// True when the access token expires within `margin` of `now` (or has
    /// already expired).
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
        self.expires_at - now <= margin
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot {
            access_token: self.access_token.clone(),
            expires_at: Some(self.expires_at),
            account_id: self.id_token.chatgpt_account_id.clone(),
        }
    }
}

/// Immutable copy of the bearer token handed to request senders.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub access_token: String,
    /// `None` for static API keys.
    pub expires_at: Option<DateTime<Utc>>,
    pub account_id: Option<String>,
}

impl TokenSnapshot {
    pub(crate) fn api_key(key: &str) -> Self {
        Self {
            access_token: key.to_string(),
            expires_at: None,
            account_id: None,
        }
    }
}

impl std::fmt::Debug for TokenSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSnapshot")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("account_id", &self.account_id)
            .finish()
    }
}
