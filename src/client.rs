use std::{fmt, future::Future, sync::Arc, time::Duration};

use reqwest::header::HeaderMap;
use serde::Serialize;
use tokio::time::sleep;

use crate::{
    decode::decode_body,
    limiter::{FixedWindowLimiter, RateLimitConfig, RateLimiter},
    translate::{translate, BasicAuth, RequestDefaults, ResolvedRequest},
    BackoffState, ClientError, ClientOptions, RequestDescriptor, Response, Result,
};

/// Status, headers and bytes of one completed exchange.
struct RawResponse {
    status: u16,
    headers: HeaderMap,
    data: Vec<u8>,
}

#[derive(Clone)]
/// HTTP client bound to one base URL.
///
/// Configuration is fixed once the client is shared; every call gets its own
/// retry bookkeeping, so a single client can serve many concurrent callers.
pub struct Client {
    http: reqwest::Client,
    defaults: RequestDefaults,
    options: ClientOptions,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.defaults.base_url)
            .field("headers", &self.defaults.headers)
            .field("basic_auth", &self.defaults.basic_auth)
            .field("options", &self.options)
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}

impl Client {
    /// Creates a client for `base_url` with headers applied to every request.
    pub fn new(base_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            http: reqwest::Client::new(),
            defaults: RequestDefaults {
                base_url: base_url.into(),
                headers,
                basic_auth: None,
            },
            options: ClientOptions::default(),
            rate_limiter: None,
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `RESILIENT_HTTP_BASE_URL`: base URL, required
    /// - `RESILIENT_HTTP_USERNAME` / `RESILIENT_HTTP_PASSWORD`: optional
    ///   basic auth credentials, both or neither
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("RESILIENT_HTTP_BASE_URL")
            .map_err(|_| "missing RESILIENT_HTTP_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("RESILIENT_HTTP_BASE_URL is set but empty".to_owned());
        }

        let mut client = Self::new(base_url.trim(), HeaderMap::new());
        match (
            std::env::var("RESILIENT_HTTP_USERNAME"),
            std::env::var("RESILIENT_HTTP_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => client.set_basic_auth(username, password),
            (Err(_), Err(_)) => {}
            _ => {
                return Err(
                    "RESILIENT_HTTP_USERNAME and RESILIENT_HTTP_PASSWORD must be set together"
                        .to_owned(),
                )
            }
        }
        Ok(client)
    }

    /// Applies timeout, backoff and status handling options.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Configures basic authentication for every request.
    pub fn set_basic_auth(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.defaults.basic_auth = Some(BasicAuth::new(username, password));
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.set_basic_auth(username, password);
        self
    }

    /// Installs a fixed-window rate limiter built from `config`.
    pub fn set_rate_limiter(&mut self, config: RateLimitConfig) -> Result<()> {
        let limiter = FixedWindowLimiter::new(config)?;
        self.rate_limiter = Some(Arc::new(limiter));
        Ok(())
    }

    /// Installs any admission gate, shared with clones of this client.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.defaults.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Resolves a descriptor without sending it.
    pub fn translate(&self, descriptor: &RequestDescriptor) -> Result<ResolvedRequest> {
        translate(descriptor, &self.defaults)
    }

    /// Sends a GET request.
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.execute(RequestDescriptor::get(path)).await
    }

    /// Sends a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.execute(RequestDescriptor::delete(path)).await
    }

    /// Sends a POST request with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.execute(RequestDescriptor::post(path).json(body)).await
    }

    /// Sends a PUT request with a JSON body.
    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.execute(RequestDescriptor::put(path).json(body)).await
    }

    /// Sends a PATCH request with a JSON body.
    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.execute(RequestDescriptor::patch(path).json(body)).await
    }

    /// Executes the call described by `descriptor`.
    ///
    /// Transport failures and statuses in the retryable set are retried with
    /// jittered exponential backoff until the elapsed-time budget runs out.
    /// Any other status is returned as a [`Response`], subject to the
    /// configured [`crate::StatusPolicy`].
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response> {
        let resolved = self.translate(&descriptor)?;

        if let Some(limiter) = &self.rate_limiter {
            limiter.enter().await?;
        }

        self.send_with_retry(descriptor, &resolved).await
    }

    /// Like [`Client::execute`], but gives up with [`ClientError::Cancelled`]
    /// as soon as `cancel` resolves.
    ///
    /// The limiter wait, in-flight request and backoff sleep are all dropped
    /// on cancellation.
    pub async fn execute_until<F>(
        &self,
        descriptor: RequestDescriptor,
        cancel: F,
    ) -> Result<Response>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.execute(descriptor) => result,
            () = cancel => Err(ClientError::Cancelled),
        }
    }

    async fn send_with_retry(
        &self,
        descriptor: RequestDescriptor,
        resolved: &ResolvedRequest,
    ) -> Result<Response> {
        let mut backoff = BackoffState::new(&self.options.backoff);
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let failure = match self.send(resolved).await {
                Ok(raw) if self.options.is_retryable_status(raw.status) => {
                    ClientError::RetryableStatus {
                        status: raw.status,
                        body: String::from_utf8_lossy(&raw.data).into_owned(),
                    }
                }
                Ok(raw) => return self.finish(raw, descriptor, attempts),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            match backoff.next_delay() {
                Some(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        attempt = attempts,
                        error = %failure,
                        "retrying {} {} after {:?}",
                        resolved.method().as_str(),
                        resolved.url(),
                        delay
                    );
                    sleep(delay).await;
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempts,
                        error = %failure,
                        "retry budget exhausted for {} {}",
                        resolved.method().as_str(),
                        resolved.url()
                    );
                    return Err(ClientError::BudgetExhausted {
                        attempts,
                        elapsed: backoff.elapsed(),
                        last: Box::new(failure),
                    });
                }
            }
        }
    }

    /// Sends one attempt.
    async fn send(&self, resolved: &ResolvedRequest) -> Result<RawResponse> {
        let mut request = self
            .http
            .request(resolved.method().into(), resolved.url().clone())
            .headers(resolved.headers().clone())
            .timeout(Duration::from_millis(self.options.timeout_ms));
        if let Some(body) = resolved.body() {
            request = request.body(body.to_vec());
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let data = response.bytes().await.map_err(transport_error)?;

        Ok(RawResponse {
            status,
            headers,
            data: data.to_vec(),
        })
    }

    fn finish(
        &self,
        raw: RawResponse,
        descriptor: RequestDescriptor,
        attempts: usize,
    ) -> Result<Response> {
        if self.options.status_policy.rejects(raw.status) {
            return Err(ClientError::Http {
                status: raw.status,
                body: String::from_utf8_lossy(&raw.data).into_owned(),
            });
        }

        let body = decode_body(&raw.data, &raw.headers)?;
        Ok(Response {
            status: raw.status,
            headers: raw.headers,
            data: raw.data,
            body,
            request: descriptor,
            attempts,
        })
    }
}

fn should_retry_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Splits `reqwest` failures into retryable transport errors and the rest.
fn transport_error(err: reqwest::Error) -> ClientError {
    if should_retry_transport(&err) {
        ClientError::Transport(err)
    } else {
        ClientError::Request(err)
    }
}
