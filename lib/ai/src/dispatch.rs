//! Completion dispatcher.
//!
//! One dispatch is:
//! 1. pick a tier from the estimated prompt size,
//! 2. evict the oldest non-instruction messages until the prompt fits,
//! 3. call the tier's provider and parse the reply against the schema,
//! 4. on a provider or validation failure, try the schema-enforcing
//!    fallback provider exactly once.

use crate::backend::{ChatMessage, CompletionBackend, CompletionRequest};
use crate::error::CompletionError;
use crate::model::{AiModel, FALLBACK_MODEL};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A structured response type the dispatcher can parse and validate.
pub trait ResponseSchema: DeserializeOwned {
    /// Schema name reported to providers that enforce schemas.
    const NAME: &'static str;

    /// JSON schema describing the response object.
    fn json_schema() -> JsonValue;

    /// Checks constraints the schema cannot express.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated constraint.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Backends keyed by provider.
///
/// Routing goes through an exhaustive match on [`AiModel`], so adding a
/// model without a backend does not compile.
#[derive(Clone)]
pub struct ProviderTable {
    /// Serves the fast tier.
    pub cerebras: Arc<dyn CompletionBackend>,
    /// Serves the large tier.
    pub deepseek: Arc<dyn CompletionBackend>,
    /// Schema-enforcing fallback.
    pub fallback: Arc<dyn CompletionBackend>,
}

impl ProviderTable {
    /// Returns the backend serving a model.
    #[must_use]
    pub fn primary(&self, model: AiModel) -> &dyn CompletionBackend {
        match model {
            AiModel::Llama33_70b => self.cerebras.as_ref(),
            AiModel::DeepSeekChat => self.deepseek.as_ref(),
        }
    }
}

/// Per-call dispatch options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Tokens reserved for the response when fitting the prompt.
    pub reserved_response_tokens: u32,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Temperature for sampling.
    pub temperature: Option<f32>,
}

impl CompletionOptions {
    /// Options reserving the given response budget.
    #[must_use]
    pub fn reserving(reserved_response_tokens: u32) -> Self {
        Self {
            reserved_response_tokens,
            ..Self::default()
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            reserved_response_tokens: 1_000,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Evicts messages at index 1 until the prompt fits the model's budget.
///
/// Index 0 (the persona/instruction message) and the most recent turns are
/// kept. Stops once fewer than three messages remain. Returns the number of
/// evicted messages.
pub fn truncate_to_fit(
    messages: &mut Vec<ChatMessage>,
    model: AiModel,
    reserved_response_tokens: u32,
) -> usize {
    let mut removed = 0;
    while messages.len() > 2 && !model.fits(messages, reserved_response_tokens) {
        messages.remove(1);
        removed += 1;
    }
    removed
}

/// Parses raw provider text as a schema object.
///
/// Tolerates surrounding whitespace and a Markdown code fence.
///
/// # Errors
///
/// Returns the decode or validation failure as text.
pub fn parse_structured<T: ResponseSchema>(raw: &str) -> Result<T, String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: T = serde_json::from_str(body).map_err(|e| e.to_string())?;
    value.validate()?;
    Ok(value)
}

/// Routes prompts to providers and returns validated structured results.
#[derive(Clone)]
pub struct Dispatcher {
    providers: ProviderTable,
}

impl Dispatcher {
    /// Creates a dispatcher over the given provider table.
    #[must_use]
    pub fn new(providers: ProviderTable) -> Self {
        Self { providers }
    }

    /// Completes a prompt into a validated `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary attempt and the single fallback
    /// attempt both fail to produce a valid `T`.
    #[instrument(skip(self, messages, options), fields(schema = T::NAME, messages = messages.len()))]
    pub async fn complete<T: ResponseSchema>(
        &self,
        mut messages: Vec<ChatMessage>,
        options: &CompletionOptions,
    ) -> Result<T, CompletionError> {
        let model = AiModel::select(&messages, options.reserved_response_tokens);
        let removed = truncate_to_fit(&mut messages, model, options.reserved_response_tokens);
        if removed > 0 {
            info!(%model, removed, "truncated prompt to fit token budget");
        }
        debug!(%model, "dispatching completion");

        let request = CompletionRequest::new(model.id(), messages)
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens);

        match self.providers.primary(model).complete(&request).await {
            Ok(response) => match parse_structured::<T>(&response.content) {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    warn!(%model, %reason, "primary response failed validation, using fallback");
                }
            },
            Err(e) => {
                warn!(%model, error = %e, "primary provider failed, using fallback");
            }
        }

        self.complete_with_fallback(request).await
    }

    async fn complete_with_fallback<T: ResponseSchema>(
        &self,
        request: CompletionRequest,
    ) -> Result<T, CompletionError> {
        let request = CompletionRequest {
            model: FALLBACK_MODEL.to_string(),
            ..request
        }
        .with_json_schema(T::NAME, T::json_schema());

        let response = self
            .providers
            .fallback
            .complete(&request)
            .await
            .map_err(|e| CompletionError::Provider {
                reason: e.to_string(),
            })?;

        parse_structured::<T>(&response.content).map_err(|reason| {
            warn!(%reason, "fallback response failed validation");
            CompletionError::InvalidResponse {
                schema: T::NAME,
                raw: response.content.clone(),
            }
        })
    }
}
