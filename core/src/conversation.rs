use std::collections::HashSet;

use uuid::Uuid;

use crate::error::InvariantViolation;
use crate::models::ToolOutput;

/// One dialogue unit in backend-agnostic form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Leading system/instruction content. Only allowed before any other
    /// turn.
    SystemMessage {
        text: String,
    },
    UserMessage {
        text: String,
    },
    AssistantMessage {
        text: String,
    },
    ReasoningItem {
        opaque_id: String,
        content: String,
        /// Opaque reasoning state returned by the backend, replayed when
        /// nothing is stored server-side.
        encrypted_content: Option<String>,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        /// Raw JSON arguments exactly as the model produced them.
        arguments: String,
    },
    ToolResult {
        call_id: String,
        output: ToolOutput,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::UserMessage { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn::AssistantMessage { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Turn::SystemMessage { text: text.into() }
    }
}

/// Append-only transcript for one logical session. Turns are never removed.
///
/// The agent loop owns it; the request assembler only ever sees a
/// [`ConversationSnapshot`].
#[derive(Debug, Clone)]
pub struct Conversation {
    id: Uuid,
    /// The oldest turns are at the beginning of the vector.
    turns: Vec<Turn>,
    call_ids: HashSet<String>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            turns: Vec::new(),
            call_ids: HashSet::new(),
        }
    }

    /// Builds a conversation by appending `turns` in order.
    pub fn from_turns<I>(turns: I) -> Result<Self, InvariantViolation>
    where
        I: IntoIterator<Item = Turn>,
    {
        let mut conversation = Self::new();
        for turn in turns {
            conversation.append(turn)?;
        }
        Ok(conversation)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends `turn`, rejecting it (and leaving history untouched) if it
    /// would break call/result pairing or system-message placement.
    pub fn append(&mut self, turn: Turn) -> Result<(), InvariantViolation> {
        match &turn {
            Turn::SystemMessage { .. } => {
                let only_system_so_far = self
                    .turns
                    .iter()
                    .all(|t| matches!(t, Turn::SystemMessage { .. }));
                if !only_system_so_far {
                    return Err(InvariantViolation::SystemMessageAfterDialogue);
                }
            }
            Turn::ToolCall { call_id, .. } => {
                if !self.call_ids.insert(call_id.clone()) {
                    return Err(InvariantViolation::DuplicateCallId {
                        call_id: call_id.clone(),
                    });
                }
            }
            Turn::ToolResult { call_id, .. } => {
                if !self.call_ids.contains(call_id) {
                    return Err(InvariantViolation::UnknownCallId {
                        call_id: call_id.clone(),
                    });
                }
            }
            Turn::UserMessage { .. }
            | Turn::AssistantMessage { .. }
            | Turn::ReasoningItem { .. } => {}
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Read-only view of the first `upto` turns (the whole history when
    /// `None`). `upto` past the end is clamped.
    pub fn snapshot(&self, upto: Option<usize>) -> ConversationSnapshot<'_> {
        let end = upto.map_or(self.turns.len(), |n| n.min(self.turns.len()));
        ConversationSnapshot {
            conversation_id: self.id,
            turns: &self.turns[..end],
        }
    }
}

/// Borrowed, immutable prefix of a [`Conversation`].
#[derive(Debug, Clone, Copy)]
pub struct ConversationSnapshot<'a> {
    conversation_id: Uuid,
    turns: &'a [Turn],
}

impl<'a> ConversationSnapshot<'a> {
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn turns(&self) -> &'a [Turn] {
        self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
