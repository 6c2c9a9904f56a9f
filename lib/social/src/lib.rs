//! Social network publishing for lucy.
//!
//! This crate provides:
//!
//! - **Social network trait**: posting text, optionally as a reply
//! - **Thread splitter**: breaking text at the per-post character limit
//! - **Share publisher**: composing and posting a claimed conversation

pub mod error;
pub mod network;
pub mod share;
pub mod thread;

pub use error::SocialError;
pub use network::{
    DEFAULT_API_URL, DEFAULT_MAX_POST_CHARS, PostId, SocialNetwork, XApiClient, XApiConfig,
    post_thread,
};
pub use share::{SharePublisher, compose_share_text};
pub use thread::split_thread;
