//! `resilient-http` executes declarative HTTP calls with rate limiting,
//! jittered exponential backoff and content-type aware decoding.
//!
//! The entry points are on [`Client`]:
//! - [`Client::execute`] for any [`RequestDescriptor`]
//! - [`Client::get`], [`Client::post`], [`Client::put`], [`Client::patch`],
//!   [`Client::delete`] as shorthands

mod backoff;
mod client;
mod decode;
mod descriptor;
mod error;
mod limiter;
mod options;
mod response;
mod translate;

pub use backoff::{BackoffPolicy, BackoffState};
pub use client::Client;
pub use decode::{decode_body, is_json, ResponseBody};
pub use descriptor::{Method, RequestDescriptor};
pub use error::ClientError;
pub use limiter::{EnterFuture, FixedWindowLimiter, RateLimitConfig, RateLimiter};
pub use options::{ClientOptions, StatusPolicy, DEFAULT_RETRYABLE_STATUS_CODES};
pub use response::Response;
pub use translate::{translate, BasicAuth, RequestDefaults, ResolvedRequest};

/// Re-exported so callers can build headers without depending on `reqwest`.
pub use reqwest::header;

pub type Result<T> = std::result::Result<T, ClientError>;
