// HTTP archive client - reqwest with bounded retry
use crate::application::archive_client::ArchiveClient;
use crate::domain::errors::NetworkError;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Wait used for HTTP 429 when the server sends no usable `Retry-After`.
    pub default_retry_after: Duration,
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (0-based): doubling, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum AttemptFailure {
    RateLimited(Option<Duration>),
    Transient(String),
    Fatal(String),
}

/// Runs `attempt` until it succeeds, fails fatally, or the policy is spent.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut attempt: F,
) -> Result<T, NetworkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = String::new();

    for n in 0..max_attempts {
        let wait = match attempt().await {
            Ok(value) => return Ok(value),
            Err(AttemptFailure::Fatal(reason)) => {
                return Err(NetworkError::Rejected {
                    url: url.to_string(),
                    reason,
                });
            }
            Err(AttemptFailure::RateLimited(hint)) => {
                let wait = hint.unwrap_or(policy.default_retry_after);
                last = "rate limited (HTTP 429)".to_string();
                tracing::warn!("Rate limited by {}; retrying after {:?}", url, wait);
                wait
            }
            Err(AttemptFailure::Transient(reason)) => {
                let wait = policy.backoff(n);
                tracing::debug!(
                    "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                    n + 1,
                    max_attempts,
                    url,
                    reason,
                    wait
                );
                last = reason;
                wait
            }
        };
        if n + 1 < max_attempts {
            tokio::time::sleep(wait).await;
        }
    }

    Err(NetworkError::Exhausted {
        url: url.to_string(),
        attempts: max_attempts,
        last,
    })
}

/// `None` for success statuses.
pub fn classify(status: StatusCode, headers: &HeaderMap) -> Option<AttemptFailure> {
    if status.is_success() {
        return None;
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let hint = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        return Some(AttemptFailure::RateLimited(hint));
    }
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return Some(AttemptFailure::Transient(format!("HTTP {}", status)));
    }
    Some(AttemptFailure::Fatal(format!("HTTP {}", status)))
}

/// Accepts delta-seconds or an HTTP-date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}

fn request_failure(e: reqwest::Error) -> AttemptFailure {
    if e.is_builder() {
        AttemptFailure::Fatal(e.to_string())
    } else {
        AttemptFailure::Transient(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct HttpArchiveClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpArchiveClient {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flare-energy/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, policy })
    }

    async fn get_bytes(&self, url: &Url) -> Result<Bytes, NetworkError> {
        let client = &self.client;
        with_retry(&self.policy, url.as_str(), move || async move {
            let response = client.get(url.clone()).send().await.map_err(request_failure)?;
            if let Some(failure) = classify(response.status(), response.headers()) {
                return Err(failure);
            }
            response.bytes().await.map_err(request_failure)
        })
        .await
    }
}

#[async_trait]
impl ArchiveClient for HttpArchiveClient {
    async fn fetch_listing(&self, url: &Url) -> Result<String, NetworkError> {
        tracing::debug!("Fetching listing {}", url);
        let body = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn fetch_file(&self, url: &Url) -> Result<Bytes, NetworkError> {
        tracing::debug!("Downloading {}", url);
        self.get_bytes(url).await
    }
}
