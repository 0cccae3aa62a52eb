#![allow(clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use responses_core::VariantProfile;
use responses_core::built_in_profiles;
use responses_core::variant_profile::OPENAI_PROFILE_ID;
use responses_login::Credential;
use responses_login::CredentialManager;
use responses_login::IdTokenInfo;
use responses_login::OAuthConfig;
use serde_json::json;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

pub const RESPONSES_PATH: &str = "/v1/responses";
pub const TOKEN_PATH: &str = "/oauth/token";

/// The built-in `openai` profile pointed at `server`.
pub fn profile_for(server: &MockServer) -> VariantProfile {
    let mut profile = built_in_profiles()
        .remove(OPENAI_PROFILE_ID)
        .expect("openai profile is built in");
    profile.endpoint_url = format!("{}{RESPONSES_PATH}", server.uri());
    profile
}

/// OAuth credential issued by `server` that stays valid for an hour.
pub fn credential_for(server: &MockServer, access_token: &str) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        client_id: "client".to_string(),
        issuer: server.uri(),
        id_token: IdTokenInfo {
            email: Some("user@example.com".to_string()),
            chatgpt_plan_type: None,
            chatgpt_account_id: Some("acc-123".to_string()),
        },
    }
}

/// Manager that starts authenticated with `access_token` and refreshes
/// against `server`.
pub fn oauth_manager(server: &MockServer, access_token: &str) -> Arc<CredentialManager> {
    Arc::new(CredentialManager::with_credential(
        OAuthConfig::new(server.uri(), "client"),
        credential_for(server, access_token),
    ))
}

/// Token endpoint response carrying `access_token`.
pub fn token_response(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "refresh_token": "refresh-2",
        "expires_in": 3600
    }))
}

/// Minimal completed response body.
pub fn completed_response(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": id,
        "status": "completed",
        "output": []
    }))
}
