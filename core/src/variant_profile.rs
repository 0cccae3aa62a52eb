//! Registry of backend variants.
//!
//! Every backend quirk the serializer has to honour lives in a
//! [`VariantProfile`]; adding a backend means adding a profile, never a new
//! branch in the assembler. Profiles come from two places:
//!   1. Built-in defaults compiled into the binary.
//!   2. User-defined entries under `[profiles.<id>]` in
//!      `~/.responses/config.toml`, which override or extend the defaults.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

use crate::assembler::ENCRYPTED_REASONING_INCLUDE;
use crate::assembler::Reasoning;
use crate::assembler::RequestOptions;
use crate::assembler::WireOptions;
use crate::conversation::ConversationSnapshot;
use crate::conversation::Turn;
use crate::models::ContentItem;
use crate::models::MessageItem;
use crate::models::MessageKind;
use crate::models::ReasoningSummary;
use crate::models::Role;
use crate::models::TypedItem;
use crate::models::WireItem;
use crate::user_agent::DEFAULT_ORIGINATOR;

/// The `instructions` sent by the built-in profiles.
pub const BASE_INSTRUCTIONS: &str = include_str!("../prompt.md");

pub const OPENAI_PROFILE_ID: &str = "openai";
pub const CHATGPT_CODEX_PROFILE_ID: &str = "chatgpt-codex";

/// Immutable description of one backend's wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantProfile {
    pub backend_id: String,
    /// Full URL of the responses endpoint.
    pub endpoint_url: String,
    /// Sent verbatim (after trimming) as `instructions`. Some backends only
    /// accept one exact string here.
    #[serde(default)]
    pub instructions_text: String,
    pub model_name: String,

    /// Emit `"type": "message"` on message items.
    #[serde(default)]
    pub wraps_content_in_type_field: bool,
    /// Prefix leading system content onto the first user message instead of
    /// sending it as its own item.
    #[serde(default)]
    pub moves_system_into_first_user_message: bool,
    #[serde(default)]
    pub allows_max_output_tokens: bool,
    #[serde(default)]
    pub allows_store_flag: bool,
    /// Sent as `store` whatever the caller asked for.
    #[serde(default)]
    pub forced_store: Option<bool>,
    /// Sent as `temperature` on every request.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Sent as `tool_choice` on every request.
    #[serde(default)]
    pub tool_choice: Option<String>,
    /// Accept the `reasoning` and `include` keys.
    #[serde(default)]
    pub allows_reasoning_options: bool,
    /// Backends without reasoning support reject the item type outright.
    #[serde(default)]
    pub supports_reasoning_items: bool,
    /// Every tool output must be preceded by its tool call within the same
    /// request, not merely somewhere in history.
    #[serde(default = "default_true")]
    pub requires_same_batch_pairing: bool,
    /// Emit `"stream": true`; the backend refuses non-streaming requests.
    #[serde(default)]
    pub requires_streaming: bool,

    #[serde(default = "default_originator")]
    pub originator_header_value: String,
    /// Overrides the computed `User-Agent`.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Static headers added to every request (e.g. for an API gateway).
    #[serde(default)]
    pub http_headers: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_originator() -> String {
    DEFAULT_ORIGINATOR.to_string()
}

impl VariantProfile {
    fn message(&self, role: Role, content: ContentItem) -> WireItem {
        WireItem::Message(MessageItem {
            kind: self
                .wraps_content_in_type_field
                .then_some(MessageKind::Message),
            role,
            content: vec![content],
        })
    }

    /// Keeps only the option keys this backend accepts. A forbidden key is
    /// omitted entirely, never sent as `null`.
    pub fn filter_options(&self, options: &RequestOptions) -> WireOptions {
        let store = self
            .forced_store
            .or_else(|| self.allows_store_flag.then(|| options.store.unwrap_or(false)));
        let (reasoning, include) = if self.allows_reasoning_options {
            let reasoning = options.reasoning_effort.map(|effort| Reasoning {
                effort,
                summary: options.reasoning_summary,
            });
            let mut include = options.include.clone();
            if store != Some(true)
                && options.encrypted_reasoning
                && !include.iter().any(|i| i == ENCRYPTED_REASONING_INCLUDE)
            {
                include.push(ENCRYPTED_REASONING_INCLUDE.to_string());
            }
            (reasoning, (!include.is_empty()).then_some(include))
        } else {
            (None, None)
        };

        WireOptions {
            max_output_tokens: options
                .max_output_tokens
                .filter(|_| self.allows_max_output_tokens),
            temperature: self.temperature,
            tool_choice: self.tool_choice.clone(),
            reasoning,
            include,
            store,
            stream: self.requires_streaming.then_some(true),
        }
    }
}

/// Maps a conversation snapshot to draft input items for `profile`.
///
/// Pure: the same snapshot and profile always yield the same items.
pub fn transform(snapshot: ConversationSnapshot<'_>, profile: &VariantProfile) -> Vec<WireItem> {
    let turns = snapshot.turns();
    let leading_system = turns
        .iter()
        .take_while(|t| matches!(t, Turn::SystemMessage { .. }))
        .count();
    let (system, rest) = turns.split_at(leading_system);

    let mut items = Vec::with_capacity(turns.len());
    let mut pending_prefix = None;

    if profile.moves_system_into_first_user_message {
        let texts = system
            .iter()
            .filter_map(|t| match t {
                Turn::SystemMessage { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();
        if !texts.is_empty() {
            pending_prefix = Some(texts.join("\n\n"));
        }
        let has_user_message = rest.iter().any(|t| matches!(t, Turn::UserMessage { .. }));
        if !has_user_message {
            if let Some(text) = pending_prefix.take() {
                items.push(profile.message(Role::User, ContentItem::InputText { text }));
            }
        }
    } else {
        for turn in system {
            if let Turn::SystemMessage { text } = turn {
                let text = text.clone();
                items.push(profile.message(Role::System, ContentItem::InputText { text }));
            }
        }
    }

    for turn in rest {
        match turn {
            Turn::UserMessage { text } => {
                let text = match pending_prefix.take() {
                    Some(prefix) => format!("{prefix}\n\n{text}"),
                    None => text.clone(),
                };
                items.push(profile.message(Role::User, ContentItem::InputText { text }));
            }
            Turn::AssistantMessage { text } => {
                items.push(profile.message(
                    Role::Assistant,
                    ContentItem::OutputText { text: text.clone() },
                ));
            }
            // `Conversation::append` keeps system messages at the front.
            Turn::SystemMessage { .. } => {}
            Turn::ReasoningItem {
                opaque_id,
                content,
                encrypted_content,
            } => {
                if profile.supports_reasoning_items {
                    items.push(WireItem::Typed(TypedItem::Reasoning {
                        id: opaque_id.clone(),
                        summary: vec![ReasoningSummary::SummaryText {
                            text: content.clone(),
                        }],
                        encrypted_content: encrypted_content.clone(),
                    }));
                } else {
                    trace!(
                        id = %opaque_id,
                        backend = %profile.backend_id,
                        "dropping reasoning item"
                    );
                }
            }
            Turn::ToolCall {
                call_id,
                tool_name,
                arguments,
            } => items.push(WireItem::Typed(TypedItem::FunctionCall {
                call_id: call_id.clone(),
                name: tool_name.clone(),
                arguments: arguments.clone(),
            })),
            Turn::ToolResult { call_id, output } => {
                items.push(WireItem::Typed(TypedItem::FunctionCallOutput {
                    call_id: call_id.clone(),
                    output: output.clone(),
                }))
            }
        }
    }

    items
}

/// Built-in default profile list.
pub fn built_in_profiles() -> HashMap<String, VariantProfile> {
    use VariantProfile as P;

    [
        (
            OPENAI_PROFILE_ID,
            P {
                backend_id: OPENAI_PROFILE_ID.into(),
                endpoint_url: "https://api.openai.com/v1/responses".into(),
                instructions_text: BASE_INSTRUCTIONS.trim().into(),
                model_name: "gpt-5-mini".into(),
                wraps_content_in_type_field: true,
                moves_system_into_first_user_message: false,
                allows_max_output_tokens: true,
                allows_store_flag: true,
                forced_store: None,
                temperature: Some(1.0),
                tool_choice: Some("auto".into()),
                allows_reasoning_options: true,
                supports_reasoning_items: true,
                requires_same_batch_pairing: true,
                requires_streaming: false,
                originator_header_value: DEFAULT_ORIGINATOR.into(),
                user_agent: None,
                http_headers: BTreeMap::new(),
            },
        ),
        (
            CHATGPT_CODEX_PROFILE_ID,
            P {
                backend_id: CHATGPT_CODEX_PROFILE_ID.into(),
                endpoint_url: "https://chatgpt.com/backend-api/codex/responses".into(),
                instructions_text: BASE_INSTRUCTIONS.trim().into(),
                model_name: "gpt-5-codex".into(),
                wraps_content_in_type_field: false,
                moves_system_into_first_user_message: true,
                allows_max_output_tokens: false,
                allows_store_flag: true,
                forced_store: Some(false),
                temperature: None,
                tool_choice: None,
                allows_reasoning_options: false,
                supports_reasoning_items: false,
                requires_same_batch_pairing: true,
                requires_streaming: true,
                originator_header_value: "codex_cli_rs".into(),
                user_agent: None,
                http_headers: [("OpenAI-Beta".to_string(), "responses=experimental".to_string())]
                    .into_iter()
                    .collect(),
            },
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
