//! Conversation and per-entity session state.
//!
//! A conversation moves `Active -> Ended -> Archived`. It ends when a
//! respondent message carrying a terminal score is appended, and it is
//! immutable once archived.

use crate::cooldown::CooldownStatus;
use crate::message::Message;
use chrono::{DateTime, Utc};
use lucy_core::ConversationId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Lifecycle of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Accepting messages.
    Active,
    /// Terminal score received; waiting to be claimed or superseded.
    Ended,
    /// Moved to history.
    Archived,
}

/// A conversation between the initiator and the respondent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: ConversationId,
    /// Lifecycle status.
    pub status: ConversationStatus,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
    /// When the conversation was started.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    /// When the terminal score was received.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Score copied from the terminal message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<u32>,
    /// Rationale copied from the terminal message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_rationale: Option<String>,
    /// Metadata attached on archive.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, JsonValue>,
}

impl Conversation {
    /// Starts an empty conversation.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::new(),
            status: ConversationStatus::Active,
            messages: Vec::new(),
            started_at,
            ended_at: None,
            final_score: None,
            final_rationale: None,
            extra: Map::new(),
        }
    }

    /// Returns true once a terminal score has been received.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        matches!(
            self.status,
            ConversationStatus::Ended | ConversationStatus::Archived
        )
    }

    /// Appends a batch of messages in order.
    ///
    /// If the last message of the batch carries a terminal score the
    /// conversation ends at `now`. Returns true if it ended.
    pub fn append(&mut self, messages: Vec<Message>, now: DateTime<Utc>) -> bool {
        let terminal = messages
            .last()
            .and_then(Message::terminal_score)
            .cloned();
        self.messages.extend(messages);

        match terminal {
            Some(score) => {
                self.status = ConversationStatus::Ended;
                self.ended_at = Some(now);
                self.final_score = Some(score.score);
                self.final_rationale = Some(score.score_rationale);
                true
            }
            None => false,
        }
    }

    /// Consumes the conversation into its archived form.
    #[must_use]
    pub fn into_archived(mut self, extra: Map<String, JsonValue>) -> Self {
        self.status = ConversationStatus::Archived;
        self.extra.extend(extra);
        self
    }

    /// Number of respondent replies so far.
    #[must_use]
    pub fn respondent_replies(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender == crate::message::Sender::Respondent)
            .count()
    }
}

/// Phase of an entity's conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No conversation accepting messages; the next input starts one.
    Idle,
    /// A conversation is accepting messages.
    Active,
    /// The last conversation ended and the window has not elapsed.
    Cooldown,
}

/// Persisted per-entity session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// The conversation currently owned by the entity.
    #[serde(default)]
    pub current_conversation: Option<Conversation>,
    /// End of the most recently finished conversation.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_conversation_end: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Returns the phase given a cooldown status computed for this state.
    #[must_use]
    pub fn phase(&self, cooldown: &CooldownStatus) -> Phase {
        if !cooldown.can_send_message {
            return Phase::Cooldown;
        }
        match &self.current_conversation {
            Some(conversation) if conversation.status == ConversationStatus::Active => {
                Phase::Active
            }
            _ => Phase::Idle,
        }
    }

    /// Returns true if the next append must start a new conversation.
    #[must_use]
    pub fn needs_new_conversation(&self) -> bool {
        self.current_conversation.is_none() || self.last_conversation_end.is_some()
    }
}
