//! Model table: token estimation, context limits and provider routing.
//!
//! Token counts are approximations. They only need to be conservative and
//! monotonic in the prompt size; exact tokenizer parity is not required.

use crate::backend::{ChatMessage, Provider};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens kept free below a model's context limit.
pub const SAFETY_MARGIN_TOKENS: u32 = 500;

/// Model used for the schema-enforcing fallback attempt.
pub const FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Models the dispatcher can route a prompt to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiModel {
    /// Fast, low-capacity tier.
    #[serde(rename = "llama-3.3-70b")]
    Llama33_70b,
    /// Larger-context tier.
    #[serde(rename = "deepseek-chat")]
    DeepSeekChat,
}

impl AiModel {
    /// The fast tier, tried first for small prompts.
    pub const FAST: Self = Self::Llama33_70b;
    /// The large tier, used once a prompt outgrows the fast tier.
    pub const LARGE: Self = Self::DeepSeekChat;

    /// Provider-side model identifier.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Llama33_70b => "llama-3.3-70b",
            Self::DeepSeekChat => "deepseek-chat",
        }
    }

    /// Provider serving this model.
    #[must_use]
    pub fn provider(&self) -> Provider {
        match self {
            Self::Llama33_70b => Provider::Cerebras,
            Self::DeepSeekChat => Provider::DeepSeek,
        }
    }

    /// Context window in tokens.
    #[must_use]
    pub fn token_limit(&self) -> u32 {
        match self {
            Self::Llama33_70b => 8_192,
            Self::DeepSeekChat => 33_000,
        }
    }

    /// Approximate token count of a single text.
    ///
    /// Llama: about 1.4 tokens per whitespace-separated word.
    /// DeepSeek: about 0.3 tokens per character.
    #[must_use]
    pub fn estimate_tokens(&self, text: &str) -> u32 {
        let estimate = match self {
            Self::Llama33_70b => (text.split_whitespace().count() as f64 * 1.4).ceil(),
            Self::DeepSeekChat => (text.chars().count() as f64 * 0.3).ceil(),
        };
        estimate as u32
    }

    /// Approximate token count of a whole prompt.
    #[must_use]
    pub fn estimate_prompt(&self, messages: &[ChatMessage]) -> u32 {
        messages
            .iter()
            .map(|m| self.estimate_tokens(&m.content))
            .sum()
    }

    /// Returns true if the prompt plus the reserved response budget fits
    /// below this model's limit minus the safety margin.
    #[must_use]
    pub fn fits(&self, messages: &[ChatMessage], reserved_response_tokens: u32) -> bool {
        self.estimate_prompt(messages) + reserved_response_tokens
            <= self.token_limit().saturating_sub(SAFETY_MARGIN_TOKENS)
    }

    /// Picks the tier for a prompt: the fast tier while it fits, the large
    /// tier otherwise.
    #[must_use]
    pub fn select(messages: &[ChatMessage], reserved_response_tokens: u32) -> Self {
        if Self::FAST.fits(messages, reserved_response_tokens) {
            Self::FAST
        } else {
            Self::LARGE
        }
    }
}

impl fmt::Display for AiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
