use serde::Deserialize;
use serde::Serialize;

use crate::conversation::ConversationSnapshot;
use crate::correlation;
use crate::error::AssemblyError;
use crate::models::WireItem;
use crate::variant_profile::VariantProfile;
use crate::variant_profile::transform;

/// Caller-requested options. Each key is only forwarded if the active
/// profile allows it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Defaults to `false` (stateless) where the backend accepts the key.
    #[serde(default)]
    pub store: Option<bool>,
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Only sent together with `reasoning_effort`.
    #[serde(default)]
    pub reasoning_summary: Option<ReasoningSummaryMode>,
    /// Ask for `reasoning.encrypted_content` on stateless requests so
    /// reasoning can be replayed without server-side storage.
    #[serde(default)]
    pub encrypted_reasoning: bool,
    /// Extra `include` entries, forwarded as given.
    #[serde(default)]
    pub include: Vec<String>,
}

/// See https://platform.openai.com/docs/guides/reasoning?api-mode=responses#get-started-with-reasoning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

/// See https://platform.openai.com/docs/guides/reasoning?api-mode=responses#reasoning-summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummaryMode {
    Auto,
    Concise,
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reasoning {
    pub effort: ReasoningEffort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReasoningSummaryMode>,
}

pub const ENCRYPTED_REASONING_INCLUDE: &str = "reasoning.encrypted_content";

/// Option keys after profile filtering. `None` means the key is absent from
/// the JSON body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WireOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Request object that is serialized as JSON and POST'ed to the profile's
/// endpoint. Built fresh for every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireRequest {
    pub model: String,
    pub instructions: String,
    #[serde(rename = "input")]
    pub input_items: Vec<WireItem>,
    #[serde(flatten)]
    pub options: WireOptions,
}

/// Turns a conversation snapshot into the payload for `profile`.
///
/// Pure and synchronous: no I/O, no shared state. Both failure modes are
/// caller bugs and must not be retried.
pub fn build(
    snapshot: ConversationSnapshot<'_>,
    profile: &VariantProfile,
    options: &RequestOptions,
) -> Result<WireRequest, AssemblyError> {
    let input_items = transform(snapshot, profile);
    if input_items.is_empty() {
        return Err(AssemblyError::EmptyInput);
    }
    correlation::validate(&input_items, profile.requires_same_batch_pairing)?;

    Ok(WireRequest {
        model: profile.model_name.clone(),
        instructions: profile.instructions_text.trim().to_string(),
        input_items,
        options: profile.filter_options(options),
    })
}
