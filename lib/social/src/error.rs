//! Error types for the social crate.

use std::fmt;

/// Errors from posting to a social network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialError {
    /// Connection to the service failed.
    ConnectionFailed { reason: String },
    /// The service rejected the credentials.
    AuthenticationFailed { reason: String },
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// The service answered with an unexpected status or body.
    ProtocolError {
        status: Option<u16>,
        reason: String,
    },
    /// The post cannot be sent as given.
    InvalidPost { reason: String },
}

impl fmt::Display for SocialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "connection failed: {reason}")
            }
            Self::AuthenticationFailed { reason } => {
                write!(f, "authentication failed: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::ProtocolError { status, reason } => match status {
                Some(status) => write!(f, "protocol error ({status}): {reason}"),
                None => write!(f, "protocol error: {reason}"),
            },
            Self::InvalidPost { reason } => write!(f, "invalid post: {reason}"),
        }
    }
}

impl std::error::Error for SocialError {}
