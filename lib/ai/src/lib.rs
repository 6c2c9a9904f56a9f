//! Completion dispatch for lucy.
//!
//! This crate wraps the external completion providers behind a narrow
//! interface:
//!
//! - **Backend**: one request/response exchange with a provider
//! - **Model table**: per-model token estimation, context limits and
//!   provider routing
//! - **Dispatcher**: tier selection, history truncation, structured parsing
//!   and the single fallback attempt

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod model;

pub use backend::{
    ChatMessage, ChatRole, CompletionBackend, CompletionRequest, CompletionResponse, Provider,
    ResponseFormat, TokenUsage,
};
pub use dispatch::{CompletionOptions, Dispatcher, ProviderTable, ResponseSchema};
pub use error::{CompletionError, LlmError};
pub use http::{HttpBackend, HttpBackendConfig};
pub use model::AiModel;
