use std::time::Duration;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid client or descriptor configuration, or a rate limiter that
    /// refused admission.
    #[error("configuration error: {0}")]
    Config(String),
    /// The descriptor could not be turned into a wire request.
    #[error("translation error: {0}")]
    Translation(String),
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// `reqwest` rejected the request before or after the exchange, for
    /// example a builder or redirect error. Never retried.
    #[error("request error: {0}")]
    Request(reqwest::Error),
    /// Response status is a member of the configured retryable set.
    #[error("retryable status {status}: {body}")]
    RetryableStatus { status: u16, body: String },
    /// Response declared JSON but the body failed to parse.
    #[error("decode error: {0}")]
    Decode(String),
    /// The retry loop ran out of elapsed time before a terminal outcome.
    #[error("retry budget exhausted after {attempts} attempts in {elapsed:?}: {last}")]
    BudgetExhausted {
        /// Number of requests sent.
        attempts: usize,
        /// Wall-clock time spent inside the retry loop.
        elapsed: Duration,
        /// Last transport error or retryable status observed.
        #[source]
        last: Box<ClientError>,
    },
    /// Terminal status rejected by [`crate::StatusPolicy::ErrorFrom`].
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// The caller's cancellation signal fired first.
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// Whether the pipeline retries this error under the backoff policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RetryableStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, time::Duration};

    use crate::ClientError;

    #[test]
    fn only_transport_and_retryable_status_are_retryable() {
        let status = ClientError::RetryableStatus {
            status: 503,
            body: String::new(),
        };
        assert!(status.is_retryable());
        assert!(!ClientError::Config("bad".to_owned()).is_retryable());
        assert!(!ClientError::Decode("bad".to_owned()).is_retryable());
        assert!(!ClientError::Http {
            status: 404,
            body: String::new()
        }
        .is_retryable());
        assert!(!ClientError::Cancelled.is_retryable());
    }

    #[test]
    fn request_builder_errors_are_not_retryable() {
        let err = reqwest::Client::new()
            .get("localhost:8080/users")
            .build()
            .expect_err("relative URL must not build");
        assert!(!ClientError::Request(err).is_retryable());
    }

    #[test]
    fn budget_exhausted_exposes_last_failure_as_source() {
        let err = ClientError::BudgetExhausted {
            attempts: 3,
            elapsed: Duration::from_millis(250),
            last: Box::new(ClientError::RetryableStatus {
                status: 500,
                body: "boom".to_owned(),
            }),
        };

        assert!(!err.is_retryable());
        let source = err.source().expect("must carry the last failure");
        assert_eq!(source.to_string(), "retryable status 500: boom");
        assert!(err.to_string().contains("3 attempts"));
    }
}
