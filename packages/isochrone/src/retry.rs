//! HTTP retry helpers for routing provider calls.
//!
//! Providers should use [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so every request gets
//! automatic retry with exponential backoff for transient failures
//! (timeouts, connection resets, server errors, rate limiting).
//!
//! ```ignore
//! let body = retry::send_json(|| client.post(&url).json(&payload), &policy).await?;
//! ```

use std::time::Duration;

use crate::ProviderError;

/// Maximum length of the response body kept in errors and logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base`, `2 * base`,
    /// `4 * base`...
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// Retries connection errors, timeouts, HTTP 429 and HTTP 5xx up to
/// `policy.max_retries` times. Other 4xx statuses are permanent.
///
/// # Errors
///
/// * [`ProviderError::Unauthorized`] on 401/403
/// * [`ProviderError::QuotaExceeded`] if 429 persists after all retries
/// * [`ProviderError::Status`] on other non-success statuses
/// * [`ProviderError::Network`] if the transport keeps failing
/// * [`ProviderError::MalformedResponse`] if the body is not JSON
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    build_request: F,
    policy: &RetryPolicy,
) -> Result<serde_json::Value, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, policy).await?;
    let status = response.status();

    let text = response.text().await.map_err(|e| ProviderError::Network {
        message: format!("failed to read response body: {e}"),
    })?;

    serde_json::from_str(&text).map_err(|e| {
        log::warn!(
            "JSON parse failed (status {status}, {} bytes): {e}\n  body preview: {}",
            text.len(),
            preview(&text)
        );
        ProviderError::MalformedResponse {
            message: e.to_string(),
        }
    })
}

/// Core retry loop. Returns the first 2xx/3xx response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut last_error: Option<ProviderError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                let error = ProviderError::Network {
                    message: e.to_string(),
                };
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }
            Ok(response) => {
                let status = response.status();
                if !status.is_client_error() && !status.is_server_error() {
                    return Ok(response);
                }

                if is_retryable_status(status) && attempt < max_retries {
                    log::warn!("  HTTP {status}");
                    last_error = Some(status_error(status, String::new(), max_retries));
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, preview(&body), max_retries));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::Network {
        message: "request failed after all retries".to_string(),
    }))
}

/// Returns `true` for statuses worth retrying (429 and 5xx).
#[must_use]
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Maps a final non-success status to a [`ProviderError`].
#[must_use]
pub fn status_error(status: reqwest::StatusCode, body: String, max_retries: u32) -> ProviderError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            ProviderError::Unauthorized {
                status: status.as_u16(),
            }
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => ProviderError::QuotaExceeded {
            message: format!("HTTP {status} after {max_retries} retries"),
        },
        _ => ProviderError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
