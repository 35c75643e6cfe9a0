use serde::{Deserialize, Serialize};

use crate::BackoffPolicy;

/// Status codes retried by default: 408, 429, 500, 502, 503, 504.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// What to do with a terminal (non-retryable) status code.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Return every terminal status as a [`crate::Response`].
    #[default]
    Passthrough,
    /// Turn statuses at or above this code into [`crate::ClientError::Http`].
    ErrorFrom(u16),
}

impl StatusPolicy {
    pub fn rejects(self, status: u16) -> bool {
        match self {
            Self::Passthrough => false,
            Self::ErrorFrom(threshold) => status >= threshold,
        }
    }
}

/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Backoff applied to transport failures and retryable statuses.
    pub backoff: BackoffPolicy,
    /// Statuses that trigger a retry.
    pub retryable_status_codes: Vec<u16>,
    /// Mapping of terminal statuses to errors.
    pub status_policy: StatusPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            backoff: BackoffPolicy::default(),
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
            status_policy: StatusPolicy::Passthrough,
        }
    }
}

impl ClientOptions {
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}
