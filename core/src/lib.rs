//! Root of the `responses-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// diagnostics go through the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod assembler;
mod client;
pub mod config;
pub mod conversation;
pub mod correlation;
pub mod error;
mod flags;
pub mod models;
mod user_agent;
pub mod util;
pub mod variant_profile;

pub use assembler::ReasoningEffort;
pub use assembler::ReasoningSummaryMode;
pub use assembler::RequestOptions;
pub use assembler::WireOptions;
pub use assembler::WireRequest;
pub use assembler::build;
pub use client::ResponsePayload;
pub use client::ResponsesClient;
pub use config::Config;
pub use conversation::Conversation;
pub use conversation::ConversationSnapshot;
pub use conversation::Turn;
pub use models::ToolOutput;
pub use models::WireItem;
pub use user_agent::DEFAULT_ORIGINATOR;
pub use user_agent::get_user_agent;
pub use variant_profile::VariantProfile;
pub use variant_profile::built_in_profiles;
pub use variant_profile::transform;
