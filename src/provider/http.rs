//! Transport helpers shared by the provider API clients.
//!
//! Both clients classify HTTP failures the same way and retry read-only
//! calls on transient errors. Mutating calls are sent exactly once.

use reqwest::{Client, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ProviderApiError, ProviderResult};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Retry-After fallback when a 429 carries no usable header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt, for read-only calls.
    pub max_retries: u32,
    /// Base delay between retries; attempt `n` waits `n` times this.
    pub retry_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl HttpSettings {
    /// Builds a `reqwest` client honoring the timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn build_client(&self) -> ProviderResult<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| ProviderApiError::network(format!("Failed to create HTTP client: {e}")))
    }

    /// Runs a read-only call, retrying transient failures with linear backoff.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once retries
    /// are exhausted.
    pub async fn retry_reads<T, F, Fut>(&self, operation: &str, mut call: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{operation} failed ({e}), retry attempt {attempt} of {}",
                        self.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(
                        self.retry_delay_ms.saturating_mul(u64::from(attempt)),
                    ))
                    .await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Maps a transport failure to a network error.
pub fn network_error(e: &reqwest::Error) -> ProviderApiError {
    ProviderApiError::network(format!("Request failed: {e}"))
}

/// Classifies a response by status; returns it unchanged on success.
///
/// # Errors
///
/// Returns the matching [`ProviderApiError`] for any non-2xx status.
pub async fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            Err(ProviderApiError::RateLimited { retry_after_secs })
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(ProviderApiError::AuthenticationFailed {
                message: String::from("Invalid API key"),
            })
        }
        StatusCode::NOT_FOUND => {
            let message = response.text().await.unwrap_or_default();
            Err(ProviderApiError::NotFound { message })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            debug!("API returned {status}: {body}");
            Err(ProviderApiError::api_error(status.as_u16(), body))
        }
    }
}

/// Decodes a JSON body.
///
/// # Errors
///
/// Returns [`ProviderApiError::InvalidResponse`] if the body does not match `T`.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let body = response.text().await.map_err(|e| network_error(&e))?;
    serde_json::from_str(&body)
        .map_err(|e| ProviderApiError::invalid_response(format!("Failed to parse response: {e}")))
}

/// Joins a base URL and a path without doubling slashes.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Deserializes an explicit JSON `null` as the type's default.
///
/// # Errors
///
/// Returns the deserializer's error for values that are neither `null` nor a `T`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_settings(max_retries: u32) -> HttpSettings {
        HttpSettings {
            timeout_secs: 5,
            max_retries,
            retry_delay_ms: 0,
        }
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://x/api/", "/bundles"), "http://x/api/bundles");
        assert_eq!(join_url("http://x", "instances/1/"), "http://x/instances/1/");
    }

    #[tokio::test]
    async fn test_retry_reads_retries_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = fast_settings(3)
            .retry_reads("probe", || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderApiError::network("reset"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("should succeed"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_reads_stops_on_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: ProviderResult<()> = fast_settings(3)
            .retry_reads("probe", || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderApiError::api_error(400, "bad"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = fast_settings(0).build_client().expect("client");
        let get = |p: &str| client.get(format!("{}{p}", server.uri())).send();

        let limited = check_status(get("/limited").await.expect("send")).await;
        assert!(matches!(
            limited,
            Err(ProviderApiError::RateLimited { retry_after_secs: 12 })
        ));

        let denied = check_status(get("/denied").await.expect("send")).await;
        assert!(matches!(
            denied,
            Err(ProviderApiError::AuthenticationFailed { .. })
        ));

        let missing = check_status(get("/missing").await.expect("send")).await;
        assert!(matches!(missing, Err(ProviderApiError::NotFound { .. })));

        let broken = check_status(get("/broken").await.expect("send")).await;
        assert!(matches!(
            broken,
            Err(ProviderApiError::ApiRequestFailed { status: 500, .. })
        ));
    }
}
