use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::credential::Credential;
use crate::error::AuthError;
use crate::pkce::PkceCodes;

pub const CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
pub const DEFAULT_ISSUER: &str = "https://auth.openai.com";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:1455/auth/callback";
const DEFAULT_SCOPE: &str = "openid profile email offline_access";
const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed issuer and client identity for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub issuer: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    /// A token expiring within this window is refreshed before use.
    pub refresh_margin: Duration,
    pub request_timeout: Duration,
}

impl OAuthConfig {
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            request_timeout: DEFAULT_TOKEN_REQUEST_TIMEOUT,
        }
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth/token", self.issuer.trim_end_matches('/'))
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ISSUER, CLIENT_ID)
    }
}

pub fn build_authorize_url(config: &OAuthConfig, pkce: &PkceCodes, state: &str) -> String {
    let query = vec![
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("scope", config.scope.as_str()),
        ("code_challenge", pkce.code_challenge.as_str()),
        ("code_challenge_method", "S256"),
        ("id_token_add_organizations", "true"),
        ("state", state),
    ];
    let qs = query
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}/oauth/authorize?{qs}", config.issuer.trim_end_matches('/'))
}

#[derive(Deserialize, Clone)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub(crate) id_token: Option<String>,
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    grant_type: &'static str,
    refresh_token: &'a str,
    scope: &'static str,
}

/// Talks to the issuer's token endpoint.
#[derive(Debug, Clone)]
pub(crate) struct TokenEndpoint {
    pub(crate) config: OAuthConfig,
    client: reqwest::Client,
}

impl TokenEndpoint {
    pub(crate) fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Authorization-code grant with the PKCE verifier.
    pub(crate) async fn exchange_code(
        &self,
        code_verifier: &str,
        code: &str,
    ) -> Result<Credential, AuthError> {
        let url = self.config.token_endpoint();
        debug!(url, "exchanging authorization code");
        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(format!(
                "grant_type=authorization_code&code={}&redirect_uri={}&client_id={}&code_verifier={}",
                urlencoding::encode(code),
                urlencoding::encode(&self.config.redirect_uri),
                urlencoding::encode(&self.config.client_id),
                urlencoding::encode(code_verifier)
            ))
            .send();
        let resp = tokio::time::timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| AuthError::Transport("timed out waiting for token endpoint".into()))?
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::InvalidGrant(format!("{status}: {body}")));
        }
        if !status.is_success() {
            return Err(AuthError::Transport(format!(
                "token endpoint returned status {status}"
            )));
        }

        let tokens: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Credential::from_token_response(tokens, &self.config, None).map_err(AuthError::InvalidGrant)
    }

    /// Refresh-token grant. Any failure is reported as `RefreshFailed`.
    pub(crate) async fn refresh(&self, current: &Credential) -> Result<Credential, AuthError> {
        let url = self.config.token_endpoint();
        debug!(url, "refreshing access token");
        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&RefreshRequest {
                client_id: &self.config.client_id,
                grant_type: "refresh_token",
                refresh_token: &current.refresh_token,
                scope: "openid profile email",
            })
            .send();
        let resp = tokio::time::timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| AuthError::RefreshFailed("timed out while refreshing token".into()))?
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("{status}: {body}")));
        }

        let tokens: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        Credential::from_token_response(tokens, &self.config, Some(current))
            .map_err(AuthError::RefreshFailed)
    }
}
