//! HTTP server for the lucy conversation bot.
//!
//! Exposes the conversation controller over axum: the current conversation,
//! turn submission, claiming and archived history.

pub mod config;
pub mod entity;
pub mod error;
pub mod routes;

pub use routes::{AppState, router};
