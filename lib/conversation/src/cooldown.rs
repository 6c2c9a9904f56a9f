//! Cooldown policy.
//!
//! A pure mapping from the end of the last conversation to the window in
//! which new input is rejected.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default cooldown window, in minutes (14 hours).
pub const DEFAULT_COOLDOWN_MINUTES: u32 = 14 * 60;

/// Fixed-duration cooldown after a conversation ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    duration: Duration,
}

impl CooldownPolicy {
    /// Creates a policy with the given window.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Creates a policy with a window given in minutes.
    #[must_use]
    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(Duration::minutes(i64::from(minutes)))
    }

    /// The cooldown window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Computes the cooldown status at `now`.
    #[must_use]
    pub fn status(
        &self,
        last_conversation_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CooldownStatus {
        match last_conversation_end {
            None => CooldownStatus {
                cooldown_ends: None,
                can_send_message: true,
            },
            Some(ended) => {
                let cooldown_ends = ended + self.duration;
                CooldownStatus {
                    cooldown_ends: Some(cooldown_ends),
                    can_send_message: now >= cooldown_ends,
                }
            }
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_COOLDOWN_MINUTES)
    }
}

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatus {
    /// When new input is accepted again; `None` outside a cooldown.
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub cooldown_ends: Option<DateTime<Utc>>,
    /// Whether new input is accepted at the time of the check.
    pub can_send_message: bool,
}
