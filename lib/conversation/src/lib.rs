//! Cooldown-gated conversations for lucy.
//!
//! This crate provides:
//!
//! - **Cooldown Policy**: the window after a conversation ends in which new
//!   input is rejected
//! - **Conversation Store**: one entity's current conversation and archived
//!   history over a key-value cell
//! - **Conversation Controller**: turn and claim orchestration, serialized
//!   per entity through the registry

pub mod controller;
pub mod cooldown;
pub mod error;
pub mod message;
pub mod persona;
pub mod registry;
pub mod session;
pub mod storage;
pub mod store;

pub use controller::{
    ClaimOutcome, ClaimPublisher, Clock, ControllerConfig, ConversationController,
    ConversationView, SystemClock,
};
pub use cooldown::{CooldownPolicy, CooldownStatus};
pub use error::{ControllerError, PublishError, StorageError, StoreError};
pub use message::{Message, Mood, Sender, TerminalScore};
pub use persona::{PromptPolicy, Reply};
pub use registry::EntityRegistry;
pub use session::{Conversation, ConversationStatus, Phase, SessionState};
pub use storage::{FileStore, InMemoryStore, KeyValueStore};
pub use store::{ConversationStore, StoreConfig};
