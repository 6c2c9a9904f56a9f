//! Message types for conversations.

use chrono::{DateTime, Utc};
use lucy_core::MessageId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two fixed roles in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person talking to the character.
    Initiator,
    /// The character.
    Respondent,
}

/// The mood the respondent attaches to each reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Angry,
    Annoyed,
    Confident,
    Confused,
    Curious,
    Dreamy,
    Embarrassed,
    Excited,
    Flirty,
    Happy,
    Playful,
    Pouty,
    Sad,
    Sassy,
    Shy,
    Surprised,
}

impl Mood {
    /// Every mood, in prompt order.
    pub const ALL: [Mood; 16] = [
        Mood::Flirty,
        Mood::Happy,
        Mood::Sassy,
        Mood::Excited,
        Mood::Pouty,
        Mood::Shy,
        Mood::Confident,
        Mood::Embarrassed,
        Mood::Playful,
        Mood::Curious,
        Mood::Angry,
        Mood::Sad,
        Mood::Surprised,
        Mood::Dreamy,
        Mood::Confused,
        Mood::Annoyed,
    ];

    /// Lowercase name as used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Angry => "angry",
            Self::Annoyed => "annoyed",
            Self::Confident => "confident",
            Self::Confused => "confused",
            Self::Curious => "curious",
            Self::Dreamy => "dreamy",
            Self::Embarrassed => "embarrassed",
            Self::Excited => "excited",
            Self::Flirty => "flirty",
            Self::Happy => "happy",
            Self::Playful => "playful",
            Self::Pouty => "pouty",
            Self::Sad => "sad",
            Self::Sassy => "sassy",
            Self::Shy => "shy",
            Self::Surprised => "surprised",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal evaluation that ends a conversation.
///
/// Score and rationale only exist together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalScore {
    /// Numeric evaluation, 1 to 100.
    pub score: u32,
    /// Short explanation of the score.
    pub score_rationale: String,
}

impl TerminalScore {
    /// Creates a terminal score.
    #[must_use]
    pub fn new(score: u32, rationale: impl Into<String>) -> Self {
        Self {
            score,
            score_rationale: rationale.into(),
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Who sent the message.
    pub sender: Sender,
    /// Message content.
    pub text: String,
    /// Respondent mood.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
    /// Set when the respondent chose to end the conversation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub finished: bool,
    /// Terminal evaluation, only ever on a respondent message.
    #[serde(flatten)]
    pub terminal: Option<TerminalScore>,
    /// When the message was created.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(sender: Sender, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            text: text.into(),
            mood: None,
            finished: false,
            terminal: None,
            timestamp,
        }
    }

    /// Creates an initiator message.
    #[must_use]
    pub fn initiator(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(Sender::Initiator, text, timestamp)
    }

    /// Creates a respondent reply.
    #[must_use]
    pub fn respondent(text: impl Into<String>, mood: Mood, timestamp: DateTime<Utc>) -> Self {
        Self {
            mood: Some(mood),
            ..Self::new(Sender::Respondent, text, timestamp)
        }
    }

    /// Creates the respondent reply that ends a conversation.
    #[must_use]
    pub fn terminal(
        text: impl Into<String>,
        mood: Mood,
        score: TerminalScore,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            finished: true,
            terminal: Some(score),
            ..Self::respondent(text, mood, timestamp)
        }
    }

    /// Returns the terminal score if this is a respondent message carrying one.
    #[must_use]
    pub fn terminal_score(&self) -> Option<&TerminalScore> {
        match self.sender {
            Sender::Respondent => self.terminal.as_ref(),
            Sender::Initiator => None,
        }
    }

    /// Returns true if this message ends its conversation.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.terminal_score().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiator_is_never_terminal() {
        let mut msg = Message::initiator("hi", Utc::now());
        msg.terminal = Some(TerminalScore::new(90, "smuggled"));

        assert_eq!(msg.sender, Sender::Initiator);
        assert!(!msg.is_terminal());
    }

    #[test]
    fn terminal_reply_carries_score() {
        let msg = Message::terminal(
            "bye!",
            Mood::Happy,
            TerminalScore::new(85, "well done"),
            Utc::now(),
        );

        assert!(msg.is_terminal());
        assert!(msg.finished);
        assert_eq!(msg.terminal_score().map(|t| t.score), Some(85));
    }

    #[test]
    fn wire_format_flattens_score() {
        let msg = Message::terminal(
            "bye!",
            Mood::Sassy,
            TerminalScore::new(42, "meh"),
            Utc::now(),
        );
        let json = serde_json::to_value(&msg).expect("serialize");

        assert_eq!(json["sender"], "respondent");
        assert_eq!(json["mood"], "sassy");
        assert_eq!(json["score"], 42);
        assert_eq!(json["scoreRationale"], "meh");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn plain_reply_omits_optional_fields() {
        let json = serde_json::to_value(Message::initiator("hey", Utc::now())).expect("serialize");

        assert!(json.get("score").is_none());
        assert!(json.get("mood").is_none());
        assert!(json.get("finished").is_none());
    }

    #[test]
    fn message_serde_roundtrip() {
        let msg = Message::terminal("ok", Mood::Shy, TerminalScore::new(7, "try harder"), Utc::now());
        let json = serde_json::to_string(&msg).expect("serialize");
        let parsed: Message = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(parsed.id, msg.id);
        assert_eq!(parsed.terminal, msg.terminal);
        assert_eq!(parsed.timestamp.timestamp_millis(), msg.timestamp.timestamp_millis());
    }

    #[test]
    fn mood_names_match_wire_format() {
        for mood in Mood::ALL {
            let json = serde_json::to_string(&mood).expect("serialize");
            assert_eq!(json, format!("\"{mood}\""));
        }
    }
}
