//! Sharing claimed conversations.

use crate::network::{SocialNetwork, post_thread};
use async_trait::async_trait;
use lucy_conversation::{ClaimPublisher, Conversation, Message, PublishError, Sender};
use lucy_core::EntityId;
use std::sync::Arc;
use tracing::info;

const INITIATOR_MARKER: &str = "👤";
const RESPONDENT_MARKER: &str = "👩";
const HASHTAG: &str = "#Simp2Earn";

fn share_line(message: &Message) -> String {
    match (message.sender, message.mood) {
        (Sender::Respondent, Some(mood)) => {
            format!("{RESPONDENT_MARKER} *{mood}*: {}\n", message.text)
        }
        (Sender::Respondent, None) => format!("{RESPONDENT_MARKER}: {}\n", message.text),
        (Sender::Initiator, _) => format!("{INITIATOR_MARKER}: {}\n", message.text),
    }
}

/// Composes the share text for a finished conversation.
///
/// The header carries the score, the evaluation and both handles. Message
/// lines follow until the first one that would push the text past `limit`
/// characters.
#[must_use]
pub fn compose_share_text(
    conversation: &Conversation,
    account_handle: &str,
    participant_handle: &str,
    limit: usize,
) -> String {
    let score = conversation.final_score.unwrap_or_default();
    let rationale = conversation.final_rationale.as_deref().unwrap_or_default();
    let mut text = format!(
        "Score: {score}/100\nLucy's Evaluation: \"{rationale}\"\n\n@{account_handle} & @{participant_handle}\n{HASHTAG}\n\n"
    );
    let mut length = text.chars().count();

    for message in &conversation.messages {
        let line = share_line(message);
        let line_length = line.chars().count();
        if length + line_length > limit {
            break;
        }
        text.push_str(&line);
        length += line_length;
    }
    text
}

/// Publishes claimed conversations to a social network.
pub struct SharePublisher {
    network: Arc<dyn SocialNetwork>,
    account_handle: String,
}

impl SharePublisher {
    /// Creates a publisher posting as `account_handle`.
    #[must_use]
    pub fn new(network: Arc<dyn SocialNetwork>, account_handle: impl Into<String>) -> Self {
        Self {
            network,
            account_handle: account_handle.into(),
        }
    }
}

#[async_trait]
impl ClaimPublisher for SharePublisher {
    async fn publish(
        &self,
        entity: &EntityId,
        conversation: &Conversation,
    ) -> Result<String, PublishError> {
        let text = compose_share_text(
            conversation,
            &self.account_handle,
            entity.as_str(),
            self.network.max_post_chars(),
        );
        let id = post_thread(self.network.as_ref(), &text)
            .await
            .map_err(|e| PublishError {
                reason: e.to_string(),
            })?;
        info!(%entity, post = %id, "shared claimed conversation");
        Ok(id.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SocialError;
    use crate::network::PostId;
    use chrono::Utc;
    use lucy_conversation::{Mood, TerminalScore};
    use std::sync::Mutex;

    fn finished_conversation() -> Conversation {
        let now = Utc::now();
        let mut conversation = Conversation::new(now);
        conversation.append(
            vec![
                Message::initiator("hey lucy", now),
                Message::respondent("hi there", Mood::Flirty, now),
                Message::initiator("gotta go", now),
                Message::terminal("bye!", Mood::Pouty, TerminalScore::new(85, "well done"), now),
            ],
            now,
        );
        conversation
    }

    #[test]
    fn share_text_layout() {
        let text = compose_share_text(&finished_conversation(), "SimpsForLucy", "alice", 4_000);

        assert_eq!(
            text,
            "Score: 85/100\nLucy's Evaluation: \"well done\"\n\n@SimpsForLucy & @alice\n#Simp2Earn\n\n\
             👤: hey lucy\n👩 *flirty*: hi there\n👤: gotta go\n👩 *pouty*: bye!\n"
        );
    }

    #[test]
    fn share_text_stops_before_limit() {
        let conversation = finished_conversation();
        let full = compose_share_text(&conversation, "SimpsForLucy", "alice", 4_000);
        let limit = full.chars().count() - 1;

        let text = compose_share_text(&conversation, "SimpsForLucy", "alice", limit);
        assert!(text.chars().count() <= limit);
        assert!(text.ends_with("👤: gotta go\n"));
    }

    struct CapturingNetwork {
        posts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl SocialNetwork for CapturingNetwork {
        async fn post(
            &self,
            text: &str,
            _in_reply_to: Option<&PostId>,
        ) -> Result<PostId, SocialError> {
            if self.fail {
                return Err(SocialError::AuthenticationFailed {
                    reason: "expired token".to_string(),
                });
            }
            self.posts.lock().unwrap().push(text.to_string());
            Ok(PostId::new("1880"))
        }

        fn max_post_chars(&self) -> usize {
            4_000
        }
    }

    #[tokio::test]
    async fn publisher_posts_share_text() {
        let network = Arc::new(CapturingNetwork {
            posts: Mutex::new(Vec::new()),
            fail: false,
        });
        let publisher = SharePublisher::new(network.clone(), "SimpsForLucy");
        let entity = EntityId::new("alice").unwrap();

        let id = publisher
            .publish(&entity, &finished_conversation())
            .await
            .unwrap();

        assert_eq!(id, "1880");
        let posts = network.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].starts_with("Score: 85/100"));
        assert!(posts[0].contains("@alice"));
    }

    #[tokio::test]
    async fn publisher_maps_errors() {
        let publisher = SharePublisher::new(
            Arc::new(CapturingNetwork {
                posts: Mutex::new(Vec::new()),
                fail: true,
            }),
            "SimpsForLucy",
        );
        let entity = EntityId::new("alice").unwrap();

        let err = publisher
            .publish(&entity, &finished_conversation())
            .await
            .unwrap_err();
        assert!(err.reason.contains("expired token"));
    }
}
