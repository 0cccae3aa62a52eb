use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::header::RETRY_AFTER;
use reqwest::header::USER_AGENT;
use responses_login::AuthError;
use responses_login::CredentialManager;
use responses_login::TokenSnapshot;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;
use uuid::Uuid;

use crate::assembler::RequestOptions;
use crate::assembler::WireRequest;
use crate::assembler::build;
use crate::conversation::ConversationSnapshot;
use crate::error::ProtocolError;
use crate::error::ResponsesErr;
use crate::error::Result;
use crate::error::TransientError;
use crate::flags::RESPONSES_REQUEST_MAX_RETRIES;
use crate::flags::RESPONSES_REQUEST_TIMEOUT_MS;
use crate::user_agent::get_user_agent;
use crate::util::MAX_BACKOFF;
use crate::util::backoff;
use crate::variant_profile::VariantProfile;

const ORIGINATOR_HEADER: &str = "originator";
const ACCOUNT_ID_HEADER: &str = "chatgpt-account-id";
const SESSION_ID_HEADER: &str = "session_id";

/// Successful response, returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePayload {
    pub status: StatusCode,
    pub body: String,
}

impl ResponsePayload {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

enum Attempt {
    Done(ResponsePayload),
    Unauthorized,
}

/// Sends assembled requests to one backend.
///
/// The bearer token is read from the [`CredentialManager`] on every attempt,
/// never cached here.
#[derive(Debug, Clone)]
pub struct ResponsesClient {
    http: reqwest::Client,
    profile: Arc<VariantProfile>,
    credentials: Arc<CredentialManager>,
    headers: HeaderMap,
    max_retries: u64,
}

impl ResponsesClient {
    pub fn new(profile: VariantProfile, credentials: Arc<CredentialManager>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(*RESPONSES_REQUEST_TIMEOUT_MS)
            .build()?;
        let headers = static_headers(&profile)?;
        Ok(Self {
            http,
            profile: Arc::new(profile),
            credentials,
            headers,
            max_retries: *RESPONSES_REQUEST_MAX_RETRIES,
        })
    }

    /// Overrides `RESPONSES_REQUEST_MAX_RETRIES` for this client.
    pub fn with_max_retries(mut self, max_retries: u64) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn profile(&self) -> &VariantProfile {
        &self.profile
    }

    /// Builds the request for `snapshot` and sends it once, tagged with the
    /// conversation id.
    pub async fn send_conversation(
        &self,
        snapshot: ConversationSnapshot<'_>,
        options: &RequestOptions,
    ) -> Result<ResponsePayload> {
        let request = build(snapshot, &self.profile, options)?;
        self.send(&request, Some(snapshot.conversation_id())).await
    }

    /// POSTs `request` once. A 401 triggers exactly one credential refresh
    /// followed by one retry; nothing else is retried here.
    pub async fn send(
        &self,
        request: &WireRequest,
        session_id: Option<Uuid>,
    ) -> Result<ResponsePayload> {
        let payload = serde_json::to_string(request)?;
        debug!(url = %self.profile.endpoint_url, backend = %self.profile.backend_id, "POST");
        trace!("request payload: {payload}");

        let token = self.credentials.get_valid_token().await?;
        match self.post(&payload, &token, session_id).await? {
            Attempt::Done(response) => Ok(response),
            Attempt::Unauthorized => {
                debug!("backend returned 401; refreshing credential");
                let fresh = self.credentials.force_refresh(&token).await?;
                match self.post(&payload, &fresh, session_id).await? {
                    Attempt::Done(response) => Ok(response),
                    Attempt::Unauthorized => {
                        warn!("backend rejected refreshed credential");
                        Err(AuthError::Unauthorized.into())
                    }
                }
            }
        }
    }

    /// [`send`](Self::send) with bounded exponential backoff for transient
    /// failures. Honours `Retry-After` when the server provides one, up to
    /// [`MAX_BACKOFF`].
    pub async fn send_with_retry(
        &self,
        request: &WireRequest,
        session_id: Option<Uuid>,
    ) -> Result<ResponsePayload> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send(request, session_id).await {
                Err(err) if err.is_retryable() && attempt <= self.max_retries => {
                    let delay = retry_delay(&err, attempt);
                    warn!(attempt, ?delay, "retrying after {err}");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn post(
        &self,
        payload: &str,
        token: &TokenSnapshot,
        session_id: Option<Uuid>,
    ) -> Result<Attempt> {
        let mut builder = self
            .http
            .post(&self.profile.endpoint_url)
            .headers(self.headers.clone())
            .bearer_auth(&token.access_token)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string());
        if let Some(account_id) = &token.account_id {
            builder = builder.header(ACCOUNT_ID_HEADER, account_id);
        }
        if let Some(session_id) = session_id {
            builder = builder.header(SESSION_ID_HEADER, session_id.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized);
        }
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await?;

        let result = classify(status, body, retry_after);
        if let Err(ResponsesErr::Protocol(ProtocolError::RequestRejected { status, detail })) =
            &result
        {
            error!(%status, detail = %detail, payload = %payload, "backend rejected request");
        }
        result.map(Attempt::Done)
    }
}

fn retry_delay(err: &ResponsesErr, attempt: u64) -> Duration {
    err.retry_after()
        .map_or_else(|| backoff(attempt), |delay| delay.min(MAX_BACKOFF))
}

/// Maps a non-401 HTTP outcome onto the error taxonomy.
pub(crate) fn classify(
    status: StatusCode,
    body: String,
    retry_after: Option<Duration>,
) -> Result<ResponsePayload> {
    if status.is_success() {
        return Ok(ResponsePayload { status, body });
    }
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(ProtocolError::RequestRejected {
                status,
                detail: body,
            }
            .into())
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            Err(transient(status, body, retry_after))
        }
        s if s.is_server_error() => Err(transient(status, body, retry_after)),
        _ => Err(ResponsesErr::UnexpectedStatus(status, body)),
    }
}

fn transient(status: StatusCode, body: String, retry_after: Option<Duration>) -> ResponsesErr {
    TransientError {
        status: Some(status),
        retry_after,
        message: body,
    }
    .into()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Headers that do not change between attempts. Profile headers are merged
/// last and win over the computed ones.
fn static_headers(profile: &VariantProfile) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ORIGINATOR_HEADER,
        header_value(ORIGINATOR_HEADER, &profile.originator_header_value)?,
    );
    let user_agent = match &profile.user_agent {
        Some(user_agent) => user_agent.clone(),
        None => get_user_agent(Some(&profile.originator_header_value)),
    };
    headers.insert(USER_AGENT, header_value("user-agent", &user_agent)?);
    if profile.requires_streaming {
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    }

    for (name, value) in &profile.http_headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ResponsesErr::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        if let Some(previous) = headers.insert(header_name, header_value(name, value)?) {
            warn!(
                header = %name,
                previous = ?previous,
                backend = %profile.backend_id,
                "profile header overrides computed value"
            );
        }
    }
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ResponsesErr::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::variant_profile::CHATGPT_CODEX_PROFILE_ID;
    use crate::variant_profile::built_in_profiles;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_statuses() {
        assert_eq!(
            classify(StatusCode::OK, "{}".to_string(), None).unwrap(),
            ResponsePayload {
                status: StatusCode::OK,
                body: "{}".to_string()
            }
        );

        for status in [StatusCode::BAD_REQUEST, StatusCode::UNPROCESSABLE_ENTITY] {
            let err = classify(status, "Instructions are not valid".to_string(), None)
                .unwrap_err();
            assert!(
                matches!(
                    &err,
                    ResponsesErr::Protocol(ProtocolError::RequestRejected { detail, .. })
                        if detail == "Instructions are not valid"
                ),
                "{status}: {err:?}"
            );
            assert!(!err.is_retryable());
        }

        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = classify(status, String::new(), Some(Duration::from_secs(3))).unwrap_err();
            assert!(err.is_retryable(), "{status}");
            assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        }

        assert!(matches!(
            classify(StatusCode::NOT_FOUND, "nope".to_string(), None),
            Err(ResponsesErr::UnexpectedStatus(StatusCode::NOT_FOUND, _))
        ));
    }

    #[test]
    fn retry_after_is_read_in_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn retry_delay_is_capped() {
        let err = |retry_after| {
            ResponsesErr::Transient(TransientError {
                status: Some(StatusCode::TOO_MANY_REQUESTS),
                retry_after,
                message: String::new(),
            })
        };
        assert_eq!(
            retry_delay(&err(Some(Duration::from_secs(86_400))), 1),
            MAX_BACKOFF
        );
        assert_eq!(
            retry_delay(&err(Some(Duration::from_secs(3))), 1),
            Duration::from_secs(3)
        );
        assert!(retry_delay(&err(None), 40) <= MAX_BACKOFF);
    }

    #[test]
    fn profile_headers_win_case_insensitively() {
        let mut profile = built_in_profiles()
            .remove(CHATGPT_CODEX_PROFILE_ID)
            .unwrap();
        profile
            .http_headers
            .insert("Originator".to_string(), "gateway".to_string());

        let headers = static_headers(&profile).unwrap();
        assert_eq!(headers.get_all(ORIGINATOR_HEADER).iter().count(), 1);
        assert_eq!(headers[ORIGINATOR_HEADER], "gateway");
        assert_eq!(headers["openai-beta"], "responses=experimental");
        assert_eq!(headers[ACCEPT], "text/event-stream");
        assert!(
            headers[USER_AGENT]
                .to_str()
                .unwrap()
                .starts_with("codex_cli_rs/")
        );
    }

    #[test]
    fn invalid_profile_header_is_reported() {
        let mut profile = built_in_profiles()
            .remove(CHATGPT_CODEX_PROFILE_ID)
            .unwrap();
        profile
            .http_headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            static_headers(&profile),
            Err(ResponsesErr::InvalidHeader { name, .. }) if name == "bad header"
        ));
    }
}
