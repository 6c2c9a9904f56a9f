//! Error types for the AI crate.
//!
//! - `LlmError`: a single provider exchange failed
//! - `CompletionError`: the dispatcher gave up after the fallback attempt

use std::fmt;

/// Errors from a single completion backend exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider is unavailable.
    ProviderUnavailable { provider: String, reason: String },
    /// Request failed with a non-success status.
    RequestFailed { status: Option<u16>, reason: String },
    /// Response body could not be decoded.
    ResponseParseFailed { reason: String },
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { status, reason } => match status {
                Some(status) => write!(f, "LLM request failed ({status}): {reason}"),
                None => write!(f, "LLM request failed: {reason}"),
            },
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Errors surfaced by the completion dispatcher.
///
/// Both variants are produced only after the fallback provider has been
/// tried once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The fallback provider itself failed; carries its raw error text.
    Provider { reason: String },
    /// The fallback answered, but not with content matching the schema.
    InvalidResponse { schema: &'static str, raw: String },
}

impl CompletionError {
    /// Returns true if a provider answered but the content was unusable.
    #[must_use]
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, Self::InvalidResponse { .. })
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider { reason } => write!(f, "completion provider failed: {reason}"),
            Self::InvalidResponse { schema, raw } => {
                write!(f, "response does not match schema '{schema}': {raw}")
            }
        }
    }
}

impl std::error::Error for CompletionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "cerebras".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("cerebras"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn request_failed_display_includes_status() {
        let err = LlmError::RequestFailed {
            status: Some(402),
            reason: "quota".to_string(),
        };
        assert_eq!(err.to_string(), "LLM request failed (402): quota");
    }

    #[test]
    fn completion_error_kind() {
        let err = CompletionError::InvalidResponse {
            schema: "reply",
            raw: "{}".to_string(),
        };
        assert!(err.is_invalid_response());
        assert!(
            !CompletionError::Provider {
                reason: "timeout".to_string()
            }
            .is_invalid_response()
        );
    }
}
