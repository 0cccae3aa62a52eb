use base64::Engine;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Flat subset of useful claims in the id_token returned by the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdTokenInfo {
    pub email: Option<String>,
    /// The ChatGPT subscription plan type (e.g. "plus", "pro").
    pub chatgpt_plan_type: Option<String>,
    /// Sent as `chatgpt-account-id` by subscription backends.
    pub chatgpt_account_id: Option<String>,
}

#[derive(Deserialize)]
struct IdClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "https://api.openai.com/auth", default)]
    auth: Option<AuthClaims>,
}

#[derive(Deserialize)]
struct AuthClaims {
    #[serde(default)]
    chatgpt_plan_type: Option<String>,
    #[serde(default)]
    chatgpt_account_id: Option<String>,
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

#[derive(Debug, Error)]
pub enum IdTokenInfoError {
    #[error("invalid JWT format")]
    InvalidFormat,
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn decode_payload(jwt: &str) -> Result<Vec<u8>, IdTokenInfoError> {
    // JWT format: header.payload.signature
    let mut parts = jwt.split('.');
    let payload_b64 = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) if !h.is_empty() && !p.is_empty() && !s.is_empty() => p,
        _ => return Err(IdTokenInfoError::InvalidFormat),
    };
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload_b64)?)
}

pub fn parse_id_token(id_token: &str) -> Result<IdTokenInfo, IdTokenInfoError> {
    let claims: IdClaims = serde_json::from_slice(&decode_payload(id_token)?)?;
    let (chatgpt_plan_type, chatgpt_account_id) = match claims.auth {
        Some(auth) => (auth.chatgpt_plan_type, auth.chatgpt_account_id),
        None => (None, None),
    };
    Ok(IdTokenInfo {
        email: claims.email,
        chatgpt_plan_type,
        chatgpt_account_id,
    })
}

/// Reads the `exp` claim of a JWT access token. Opaque (non-JWT) tokens
/// yield `None`.
pub(crate) fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = decode_payload(token).ok()?;
    let claims: ExpiryClaims = serde_json::from_slice(&payload).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}
