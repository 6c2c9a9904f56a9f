//! Core domain types and utilities for lucy.
//!
//! This crate provides the identifiers and the error-handling foundation
//! shared by the conversation, AI and social crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConversationId, EntityId, MessageId, ParseIdError};
