//! Conversation controller.
//!
//! Orchestrates one turn or claim for one entity inside that entity's
//! serialized section: cooldown check, prompt assembly, completion, and a
//! single persisted append.

use crate::cooldown::CooldownStatus;
use crate::error::{ControllerError, PublishError, StoreError};
use crate::message::{Message, Mood, TerminalScore};
use crate::persona::{EVALUATION_TEMPERATURE, EvaluationVerdict, PromptPolicy, Reply};
use crate::registry::{EntityGuard, EntityRegistry};
use crate::session::{Conversation, Phase};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lucy_ai::{CompletionError, CompletionOptions, Dispatcher};
use lucy_core::EntityId;
use rootcause::prelude::Report;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Default maximum input length, in characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 200;

/// Response budget reserved when fitting a prompt.
const RESERVED_RESPONSE_TOKENS: u32 = 100;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shares a claimed conversation before it is archived.
#[async_trait]
pub trait ClaimPublisher: Send + Sync {
    /// Publishes the conversation and returns the post id.
    async fn publish(
        &self,
        entity: &EntityId,
        conversation: &Conversation,
    ) -> Result<String, PublishError>;
}

/// Controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Maximum input length, in characters.
    pub max_message_length: usize,
    /// Finish nudges.
    pub prompt: PromptPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            prompt: PromptPolicy::default(),
        }
    }
}

/// The caller's view of an entity's conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    /// Messages of the current conversation.
    pub messages: Vec<Message>,
    /// Final score, once the conversation ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    /// Final rationale, once the conversation ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_rationale: Option<String>,
    /// Cooldown window and whether input is accepted.
    #[serde(flatten)]
    pub cooldown: CooldownStatus,
    /// State machine phase.
    pub phase: Phase,
}

impl ConversationView {
    fn of(store: &EntityGuard, now: DateTime<Utc>) -> Self {
        let cooldown = store.cooldown_status(now);
        let current = store.current();
        Self {
            messages: current.map(|c| c.messages.clone()).unwrap_or_default(),
            score: current.and_then(|c| c.final_score),
            score_rationale: current.and_then(|c| c.final_rationale.clone()),
            phase: store.state().phase(&cooldown),
            cooldown,
        }
    }
}

/// Result of a successful claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    /// State after archiving.
    #[serde(flatten)]
    pub view: ConversationView,
    /// The archived conversation.
    pub archived: Conversation,
    /// Id of the published post, if a publisher is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

fn store_failed(report: Report<StoreError>) -> ControllerError {
    ControllerError::from(report.current_context())
}

fn completion_failed(err: CompletionError) -> ControllerError {
    ControllerError::Completion {
        reason: err.to_string(),
    }
}

/// Runs turns and claims against per-entity conversation state.
pub struct ConversationController {
    registry: EntityRegistry,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    publisher: Option<Arc<dyn ClaimPublisher>>,
    config: ControllerConfig,
}

impl ConversationController {
    /// Creates a controller using the system clock and no publisher.
    #[must_use]
    pub fn new(registry: EntityRegistry, dispatcher: Dispatcher, config: ControllerConfig) -> Self {
        Self {
            registry,
            dispatcher,
            clock: Arc::new(SystemClock),
            publisher: None,
            config,
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publishes claimed conversations through `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn ClaimPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// The entity registry.
    #[must_use]
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    async fn lock(&self, entity: &EntityId) -> lucy_core::Result<EntityGuard, ControllerError> {
        let guard = self.registry.lock(entity).await.map_err(store_failed)?;
        Ok(guard)
    }

    /// Returns the current conversation and cooldown status.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity's state cannot be loaded.
    #[instrument(skip(self, entity), fields(entity = %entity))]
    pub async fn snapshot(
        &self,
        entity: &EntityId,
    ) -> lucy_core::Result<ConversationView, ControllerError> {
        let store = self.lock(entity).await?;
        Ok(ConversationView::of(&store, self.clock.now()))
    }

    /// Returns archived conversations, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity's state cannot be loaded.
    #[instrument(skip(self, entity), fields(entity = %entity))]
    pub async fn history(
        &self,
        entity: &EntityId,
    ) -> lucy_core::Result<Vec<Conversation>, ControllerError> {
        let store = self.lock(entity).await?;
        Ok(store.history().iter().cloned().collect())
    }

    fn validate_input(&self, input: &str) -> Result<String, ControllerError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(ControllerError::InvalidInput {
                reason: "message is required".to_string(),
            });
        }
        let max = self.config.max_message_length;
        if text.chars().count() > max {
            return Err(ControllerError::InvalidInput {
                reason: format!("message too long, maximum length is {max} characters"),
            });
        }
        Ok(text.to_string())
    }

    /// Runs one turn: the initiator's input and the respondent's reply are
    /// appended together, or not at all.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid input, during the cooldown window, if
    /// completion fails, or if persisting fails.
    #[instrument(skip(self, entity, input), fields(entity = %entity, len = input.len()))]
    pub async fn submit_turn(
        &self,
        entity: &EntityId,
        input: &str,
    ) -> lucy_core::Result<ConversationView, ControllerError> {
        let text = self.validate_input(input)?;
        let mut store = self.lock(entity).await?;

        let now = self.clock.now();
        let cooldown = store.cooldown_status(now);
        if let (false, Some(cooldown_ends)) = (cooldown.can_send_message, cooldown.cooldown_ends) {
            warn!(%cooldown_ends, "input rejected during cooldown");
            return Err(ControllerError::Cooldown { cooldown_ends }.into());
        }

        let mut exchange = store.continuing_messages().to_vec();
        let prompt = self.config.prompt.turn_prompt(&exchange, &text);
        let reply = self.reply(prompt).await?;

        let initiator = Message::initiator(text, now);
        let respondent = if reply.is_finished() {
            exchange.push(initiator.clone());
            exchange.push(Message::respondent(reply.text(), reply.mood, now));
            let score = self.evaluate(&exchange).await?;
            info!(score = score.score, "conversation finished");
            Message::terminal(reply.text(), reply.mood, score, now)
        } else {
            Message::respondent(reply.text(), reply.mood, now)
        };

        let appended_at = self.clock.now();
        store
            .append_messages(vec![initiator, respondent], appended_at)
            .await
            .map_err(store_failed)?;
        Ok(ConversationView::of(&store, appended_at))
    }

    async fn reply(
        &self,
        prompt: Vec<lucy_ai::ChatMessage>,
    ) -> lucy_core::Result<Reply, ControllerError> {
        let options = CompletionOptions::reserving(RESERVED_RESPONSE_TOKENS);
        match self.dispatcher.complete::<Reply>(prompt, &options).await {
            Ok(reply) => Ok(reply),
            Err(e) if e.is_invalid_response() => {
                warn!(error = %e, "unusable reply, substituting placeholder");
                Ok(Reply {
                    message: String::new(),
                    mood: Mood::Curious,
                    finished: None,
                })
            }
            Err(e) => Err(completion_failed(e).into()),
        }
    }

    async fn evaluate(
        &self,
        exchange: &[Message],
    ) -> lucy_core::Result<TerminalScore, ControllerError> {
        let prompt = self.config.prompt.evaluation_prompt(exchange);
        let options = CompletionOptions::reserving(RESERVED_RESPONSE_TOKENS)
            .with_temperature(EVALUATION_TEMPERATURE);
        match self
            .dispatcher
            .complete::<EvaluationVerdict>(prompt, &options)
            .await
        {
            Ok(verdict) => Ok(verdict.into_score()),
            Err(e) if e.is_invalid_response() => {
                warn!(error = %e, "unusable evaluation, using default score");
                Ok(EvaluationVerdict::default_score())
            }
            Err(e) => Err(completion_failed(e).into()),
        }
    }

    /// Claims the ended conversation: publishes it if a publisher is
    /// configured, then archives it with `extra` metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no ended conversation, publishing
    /// fails, or persisting fails. Nothing is archived on error.
    #[instrument(skip(self, entity, extra), fields(entity = %entity))]
    pub async fn claim(
        &self,
        entity: &EntityId,
        mut extra: Map<String, JsonValue>,
    ) -> lucy_core::Result<ClaimOutcome, ControllerError> {
        let mut store = self.lock(entity).await?;

        let Some(current) = store.current() else {
            return Err(ControllerError::NoConversation.into());
        };
        if !current.is_ended() {
            return Err(ControllerError::NotEnded.into());
        }

        let post_id = match &self.publisher {
            Some(publisher) => {
                let post_id = publisher
                    .publish(entity, current)
                    .await
                    .map_err(|e| ControllerError::Publish { reason: e.reason })?;
                extra.insert("postId".to_string(), JsonValue::from(post_id.clone()));
                Some(post_id)
            }
            None => None,
        };

        let now = self.clock.now();
        extra.insert(
            "claimedAt".to_string(),
            JsonValue::from(now.timestamp_millis()),
        );
        let archived = store
            .archive_current(extra, now)
            .await
            .map_err(store_failed)?;

        Ok(ClaimOutcome {
            view: ConversationView::of(&store, now),
            archived,
            post_id,
        })
    }
}
