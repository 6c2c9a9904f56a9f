//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating sections (`CONVERSATION__COOLDOWN_MINUTES`).

use lucy_conversation::controller::DEFAULT_MAX_MESSAGE_LENGTH;
use lucy_conversation::cooldown::DEFAULT_COOLDOWN_MINUTES;
use lucy_conversation::store::DEFAULT_HISTORY_CAP;
use lucy_conversation::{ControllerConfig, CooldownPolicy, PromptPolicy, StoreConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Interval between idle entity cell sweeps, in seconds.
    #[serde(default = "default_prune_interval_seconds")]
    pub prune_interval_seconds: u64,

    /// Conversation rules.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Durable storage backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Completion provider endpoints and keys.
    pub providers: ProvidersConfig,

    /// Sharing claimed conversations.
    #[serde(default)]
    pub social: SocialConfig,
}

/// Conversation rules.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Cooldown window after a conversation ends.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,

    /// Archived conversations kept per entity.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Maximum input length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    #[serde(default = "default_soft_finish_after")]
    pub soft_finish_after: usize,

    #[serde(default = "default_hard_finish_after")]
    pub hard_finish_after: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_prune_interval_seconds() -> u64 {
    300
}

fn default_cooldown_minutes() -> u32 {
    DEFAULT_COOLDOWN_MINUTES
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

fn default_soft_finish_after() -> usize {
    PromptPolicy::default().soft_finish_after
}

fn default_hard_finish_after() -> usize {
    PromptPolicy::default().hard_finish_after
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            history_cap: default_history_cap(),
            max_message_length: default_max_message_length(),
            soft_finish_after: default_soft_finish_after(),
            hard_finish_after: default_hard_finish_after(),
        }
    }
}

impl ConversationConfig {
    /// Settings for the per-entity stores.
    #[must_use]
    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            cooldown: CooldownPolicy::from_minutes(self.cooldown_minutes),
            history_cap: self.history_cap,
        }
    }

    /// Settings for the controller.
    #[must_use]
    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            max_message_length: self.max_message_length,
            prompt: PromptPolicy {
                soft_finish_after: self.soft_finish_after,
                hard_finish_after: self.hard_finish_after,
            },
        }
    }
}

/// Which key-value backend holds conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory; state is lost on restart.
    #[default]
    Memory,
    /// One JSON file per key under `path`.
    File,
}

/// Durable storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the file backend.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_cerebras_api_url")]
    pub cerebras_api_url: String,
    pub cerebras_api_key: String,

    #[serde(default = "default_deepseek_api_url")]
    pub deepseek_api_url: String,
    pub deepseek_api_key: String,

    /// Schema-enforcing fallback provider.
    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,
    pub openai_api_key: String,
}

fn default_cerebras_api_url() -> String {
    "https://api.cerebras.ai/v1".to_string()
}

fn default_deepseek_api_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Social network configuration. Without a bearer token claims are archived
/// without being shared.
#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    pub bearer_token: Option<String>,

    /// Handle of the bot's own account, mentioned in shared posts.
    #[serde(default = "default_account_handle")]
    pub account_handle: String,

    #[serde(default = "default_social_api_url")]
    pub api_url: String,

    #[serde(default = "default_max_post_chars")]
    pub max_post_chars: usize,
}

fn default_account_handle() -> String {
    "SimpsForLucy".to_string()
}

fn default_social_api_url() -> String {
    lucy_social::DEFAULT_API_URL.to_string()
}

fn default_max_post_chars() -> usize {
    lucy_social::DEFAULT_MAX_POST_CHARS
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            account_handle: default_account_handle(),
            api_url: default_social_api_url(),
            max_post_chars: default_max_post_chars(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
