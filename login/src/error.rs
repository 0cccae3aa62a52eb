use thiserror::Error;

/// Failures surfaced by the credential lifecycle. Every variant requires the
/// caller to re-run authorization (or fix configuration); none of them are
/// retried silently.
///
/// The type is `Clone` so that one refresh outcome can be handed to every
/// caller waiting on the same in-flight refresh.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The issuer rejected the authorization code (or PKCE verifier).
    #[error("authorization code was rejected by the issuer: {0}")]
    InvalidGrant(String),

    /// The refresh grant failed; the credential is now expired.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The backend still answered 401 after a forced refresh, or the
    /// credential cannot be refreshed at all (static API key).
    #[error("request unauthorized; re-authorization is required")]
    Unauthorized,

    #[error("not authenticated; run the authorization flow first")]
    NotAuthenticated,

    /// The token endpoint could not be reached or answered with something
    /// other than a grant decision.
    #[error("token endpoint request failed: {0}")]
    Transport(String),

    #[error("unable to persist credentials: {0}")]
    Storage(String),
}
