use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Statuses answered by an overloaded or restarting server.
pub const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Retry configuration for export downloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    300
}

fn default_max_delay() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay.max(0.0) as u64)
    }
}

/// GET `url`, retrying transient failures.
///
/// Retries on [`RETRY_STATUSES`] and on connect or timeout errors. When
/// attempts run out the last response is returned as is, so callers still
/// see the failing status.
pub async fn get_with_retry(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    retry: &RetryConfig,
) -> Result<Response, reqwest::Error> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = client.get(url).query(query).send().await;
        let last = attempt >= max_attempts;

        match result {
            Ok(response) if !last && RETRY_STATUSES.contains(&response.status().as_u16()) => {
                warn!(
                    "GET {} returned {} (attempt {}/{}), retrying",
                    url,
                    response.status(),
                    attempt,
                    max_attempts
                );
            }
            Err(e) if !last && (e.is_connect() || e.is_timeout()) => {
                warn!(
                    "GET {} failed (attempt {}/{}): {}, retrying",
                    url, attempt, max_attempts, e
                );
            }
            other => return other,
        }

        tokio::time::sleep(retry.delay_for(attempt)).await;
        attempt += 1;
    }
}
