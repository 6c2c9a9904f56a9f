//! Conversation store.
//!
//! Owns one entity's session state and archived history, and persists
//! every mutation before it becomes visible. Layout per entity:
//!
//! - `entity:{id}:state` holds the [`SessionState`]
//! - `entity:{id}:history:{startedAtMillis}:{conversationId}` holds one
//!   archived conversation
//!
//! Archiving writes the history entry before the state. A state write that
//! fails in between leaves the conversation both current and archived;
//! [`ConversationStore::load`] completes such an archive.

use crate::cooldown::{CooldownPolicy, CooldownStatus};
use crate::error::{StorageError, StoreError};
use crate::message::Message;
use crate::session::{Conversation, SessionState};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use lucy_core::EntityId;
use serde_json::{Map, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of archived conversations kept per entity.
pub const DEFAULT_HISTORY_CAP: usize = 500;

/// Store settings shared by every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Cooldown applied after a conversation ends.
    pub cooldown: CooldownPolicy,
    /// Maximum archived conversations kept.
    pub history_cap: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cooldown: CooldownPolicy::default(),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

fn state_key(entity: &EntityId) -> String {
    format!("entity:{entity}:state")
}

fn history_prefix(entity: &EntityId) -> String {
    format!("entity:{entity}:history:")
}

fn history_key(entity: &EntityId, conversation: &Conversation) -> String {
    format!(
        "{}{:013}:{}",
        history_prefix(entity),
        conversation.started_at.timestamp_millis(),
        conversation.id
    )
}

fn storage_failed(err: StorageError) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}

/// One entity's conversation state, loaded from durable storage.
pub struct ConversationStore {
    kv: Arc<dyn KeyValueStore>,
    entity: EntityId,
    config: StoreConfig,
    state: SessionState,
    /// Archived conversations, most recent first.
    history: VecDeque<Conversation>,
}

impl ConversationStore {
    /// Loads an entity's state, or a fresh empty state if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or a document cannot be decoded.
    pub async fn load(
        kv: Arc<dyn KeyValueStore>,
        entity: EntityId,
        config: StoreConfig,
    ) -> lucy_core::Result<Self, StoreError> {
        let key = state_key(&entity);
        let state = match kv.get(&key).await.map_err(storage_failed)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })?,
            None => SessionState::default(),
        };

        let mut history = Vec::new();
        for (key, raw) in kv
            .list(&history_prefix(&entity))
            .await
            .map_err(storage_failed)?
        {
            let conversation: Conversation =
                serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                    key,
                    reason: e.to_string(),
                })?;
            history.push(conversation);
        }
        history.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        debug!(%entity, archived = history.len(), "loaded conversation state");

        let mut store = Self {
            kv,
            entity,
            config,
            state,
            history: history.into(),
        };
        store.finish_interrupted_archive().await;
        Ok(store)
    }

    /// Clears a current conversation that already sits in history.
    ///
    /// The cooldown keeps running from the recorded end. Persisting the
    /// cleared state is best effort; the next mutation writes it anyway.
    async fn finish_interrupted_archive(&mut self) {
        let Some(current) = &self.state.current_conversation else {
            return;
        };
        let Some(archived) = self.history.iter().find(|c| c.id == current.id) else {
            return;
        };

        let next = SessionState {
            current_conversation: None,
            last_conversation_end: self
                .state
                .last_conversation_end
                .or(archived.ended_at)
                .or(current.ended_at),
        };
        warn!(entity = %self.entity, conversation = %archived.id, "completing interrupted archive");

        if let Err(e) = self.put_state(&next).await {
            warn!(entity = %self.entity, error = %e, "failed to persist completed archive");
        }
        self.state = next;
    }

    /// The entity this store belongs to.
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    /// The current session state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The current conversation, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Conversation> {
        self.state.current_conversation.as_ref()
    }

    /// Archived conversations, most recent first.
    #[must_use]
    pub fn history(&self) -> &VecDeque<Conversation> {
        &self.history
    }

    /// Cooldown status at `now`.
    #[must_use]
    pub fn cooldown_status(&self, now: DateTime<Utc>) -> CooldownStatus {
        self.config
            .cooldown
            .status(self.state.last_conversation_end, now)
    }

    /// Messages the next turn continues from: empty if the next append
    /// starts a new conversation.
    #[must_use]
    pub fn continuing_messages(&self) -> &[Message] {
        if self.state.needs_new_conversation() {
            return &[];
        }
        self.current()
            .map(|conversation| conversation.messages.as_slice())
            .unwrap_or_default()
    }

    /// Appends a batch of messages to the current conversation.
    ///
    /// Starts a new conversation first if none exists or the previous one
    /// ended, archiving the previous one. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error during the cooldown window or if persisting fails.
    /// Nothing is changed on error.
    pub async fn append_messages(
        &mut self,
        messages: Vec<Message>,
        now: DateTime<Utc>,
    ) -> lucy_core::Result<(), StoreError> {
        if messages.is_empty() {
            return Ok(());
        }

        let cooldown = self.cooldown_status(now);
        if let (false, Some(cooldown_ends)) = (cooldown.can_send_message, cooldown.cooldown_ends) {
            return Err(StoreError::CooldownActive { cooldown_ends }.into());
        }

        let mut next = self.state.clone();
        let mut superseded = None;
        if next.needs_new_conversation() {
            superseded = next
                .current_conversation
                .take()
                .map(|previous| previous.into_archived(Map::new()));
            next.current_conversation = Some(Conversation::new(now));
            next.last_conversation_end = None;
        }

        let Some(conversation) = next.current_conversation.as_mut() else {
            return Err(StoreError::NoConversation.into());
        };
        let ended = conversation.append(messages, now);
        if ended {
            next.last_conversation_end = Some(now);
        }

        if let Some(previous) = &superseded {
            self.put_history(previous).await?;
        }
        self.put_state(&next).await?;

        self.state = next;
        if let Some(previous) = superseded {
            info!(entity = %self.entity, conversation = %previous.id, "archived superseded conversation");
            self.push_history(previous).await;
        }
        if ended {
            info!(entity = %self.entity, "conversation ended");
        }
        Ok(())
    }

    /// Archives the ended current conversation with `extra` metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no current conversation, it has not
    /// ended, or persisting fails. Nothing is changed on error.
    pub async fn archive_current(
        &mut self,
        extra: Map<String, JsonValue>,
        now: DateTime<Utc>,
    ) -> lucy_core::Result<Conversation, StoreError> {
        let Some(current) = self.current() else {
            return Err(StoreError::NoConversation.into());
        };
        if !current.is_ended() {
            return Err(StoreError::NotEnded.into());
        }

        let archived = current.clone().into_archived(extra);
        let next = SessionState {
            current_conversation: None,
            last_conversation_end: Some(now),
        };

        self.put_history(&archived).await?;
        self.put_state(&next).await?;

        self.state = next;
        info!(entity = %self.entity, conversation = %archived.id, "archived conversation");
        self.push_history(archived.clone()).await;
        Ok(archived)
    }

    async fn put_state(&self, state: &SessionState) -> lucy_core::Result<(), StoreError> {
        let key = state_key(&self.entity);
        let raw = serde_json::to_string(state).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.kv
            .put(&key, raw, None)
            .await
            .map_err(storage_failed)?;
        Ok(())
    }

    async fn put_history(&self, conversation: &Conversation) -> lucy_core::Result<(), StoreError> {
        let key = history_key(&self.entity, conversation);
        let raw = serde_json::to_string(conversation).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.kv
            .put(&key, raw, None)
            .await
            .map_err(storage_failed)?;
        Ok(())
    }

    /// Adds an archived conversation and evicts the oldest beyond the cap.
    async fn push_history(&mut self, conversation: Conversation) {
        self.history.retain(|c| c.id != conversation.id);
        self.history.push_front(conversation);
        while self.history.len() > self.config.history_cap {
            let Some(evicted) = self.history.pop_back() else {
                break;
            };
            let key = history_key(&self.entity, &evicted);
            if let Err(e) = self.kv.delete(&key).await {
                warn!(%key, error = %e, "failed to delete evicted history entry");
            }
        }
    }
}
