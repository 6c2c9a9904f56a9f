//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StorageError`: Errors from the key-value backends
//! - `StoreError`: Errors from conversation store operations
//! - `PublishError`: Errors from sharing a claimed conversation
//! - `ControllerError`: Caller-facing taxonomy of a turn or claim

use chrono::{DateTime, Utc};
use std::fmt;

/// Errors from key-value storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend failed to read or write.
    Backend { reason: String },
    /// A stored envelope could not be encoded or decoded.
    Serialization { reason: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend { reason } => write!(f, "storage backend failed: {reason}"),
            Self::Serialization { reason } => {
                write!(f, "storage serialization failed: {reason}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors from conversation store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// New input arrived before the cooldown window elapsed.
    CooldownActive { cooldown_ends: DateTime<Utc> },
    /// Archive attempted before the conversation received a terminal score.
    NotEnded,
    /// Archive attempted without a current conversation.
    NoConversation,
    /// Reading or writing the durable cell failed.
    Storage { reason: String },
    /// A persisted document could not be decoded.
    Corrupt { key: String, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CooldownActive { cooldown_ends } => {
                write!(f, "conversation in cooldown until {cooldown_ends}")
            }
            Self::NotEnded => write!(f, "conversation has not ended yet"),
            Self::NoConversation => write!(f, "no active conversation"),
            Self::Storage { reason } => write!(f, "conversation storage failed: {reason}"),
            Self::Corrupt { key, reason } => {
                write!(f, "corrupt conversation document at {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from publishing a claimed conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishError {
    pub reason: String,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to publish conversation: {}", self.reason)
    }
}

impl std::error::Error for PublishError {}

/// Caller-facing errors of the conversation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Input rejected until the cooldown window elapses.
    Cooldown { cooldown_ends: DateTime<Utc> },
    /// Claim attempted before the conversation ended.
    NotEnded,
    /// Claim attempted without a current conversation.
    NoConversation,
    /// The caller's input was rejected.
    InvalidInput { reason: String },
    /// The completion provider failed after the fallback attempt.
    Completion { reason: String },
    /// The durable store failed.
    Storage { reason: String },
    /// Sharing the claimed conversation failed.
    Publish { reason: String },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cooldown { cooldown_ends } => {
                write!(f, "conversation in cooldown until {cooldown_ends}")
            }
            Self::NotEnded => write!(f, "conversation has not ended yet"),
            Self::NoConversation => write!(f, "no active conversation"),
            Self::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            Self::Completion { reason } => write!(f, "completion failed: {reason}"),
            Self::Storage { reason } => write!(f, "storage failed: {reason}"),
            Self::Publish { reason } => write!(f, "publish failed: {reason}"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<&StoreError> for ControllerError {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::CooldownActive { cooldown_ends } => Self::Cooldown {
                cooldown_ends: *cooldown_ends,
            },
            StoreError::NotEnded => Self::NotEnded,
            StoreError::NoConversation => Self::NoConversation,
            StoreError::Storage { .. } | StoreError::Corrupt { .. } => Self::Storage {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display() {
        let err = StorageError::Backend {
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn store_errors_map_to_controller_taxonomy() {
        let ends = Utc::now();
        assert_eq!(
            ControllerError::from(&StoreError::CooldownActive { cooldown_ends: ends }),
            ControllerError::Cooldown { cooldown_ends: ends }
        );
        assert_eq!(
            ControllerError::from(&StoreError::NotEnded),
            ControllerError::NotEnded
        );

        let corrupt = StoreError::Corrupt {
            key: "entity:a:state".to_string(),
            reason: "eof".to_string(),
        };
        match ControllerError::from(&corrupt) {
            ControllerError::Storage { reason } => assert!(reason.contains("entity:a:state")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn publish_error_display() {
        let err = PublishError {
            reason: "401".to_string(),
        };
        assert_eq!(err.to_string(), "failed to publish conversation: 401");
    }
}
