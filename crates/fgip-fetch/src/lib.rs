//! HTTP fetch utilities for FGIP source adapters: bounded retry with
//! exponential backoff and uniform timeout policy.

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info_span, warn};

pub const CRATE_NAME: &str = "fgip-fetch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

/// 5xx and 429 are transient; other 4xx means the request itself is wrong
/// and retrying cannot help.
pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    /// Three total attempts: first try plus two retries, 1s base doubling
    /// up to a 10s ceiling.
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub user_agent: Option<String>,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            user_agent: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl FetchError {
    /// Status code for structured logging, or "timeout"/"connect"/"request"
    /// when the failure never produced a response.
    pub fn status_label(&self) -> String {
        match self {
            FetchError::HttpStatus { status, .. } => status.to_string(),
            FetchError::Request(err) if err.is_timeout() => "timeout".to_string(),
            FetchError::Request(err) if err.is_connect() => "connect".to_string(),
            FetchError::Request(_) => "request".to_string(),
        }
    }
}

/// Retrying JSON fetcher shared by every source adapter.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            backoff: config.backoff,
        })
    }

    pub async fn get_json(
        &self,
        source_id: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<JsonValue, FetchError> {
        self.execute_json(source_id, url, || self.client.get(url).query(query))
            .await
    }

    pub async fn post_json(
        &self,
        source_id: &str,
        url: &str,
        body: &JsonValue,
        headers: &[(&str, String)],
    ) -> Result<JsonValue, FetchError> {
        self.execute_json(source_id, url, || {
            let mut req = self.client.post(url).json(body);
            for (name, value) in headers {
                req = req.header(*name, value);
            }
            req
        })
        .await
    }

    async fn execute_json<F>(
        &self,
        source_id: &str,
        url: &str,
        build: F,
    ) -> Result<JsonValue, FetchError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let span = info_span!("http_fetch", source_id, url);
        let _guard = span.enter();

        let mut last_request_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.backoff.max_retries {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        return Ok(resp.json::<JsonValue>().await?);
                    }

                    if classify_status(status) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        warn!(source_id, status = status.as_u16(), attempt, "retrying after status");
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }

                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        warn!(source_id, attempt, error = %err, "retrying after transport error");
                        last_request_error = Some(err);
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(FetchError::Request(err));
                }
            }
        }

        // The loop only falls through when every attempt hit a retryable
        // transport error.
        match last_request_error {
            Some(err) => Err(FetchError::Request(err)),
            None => Err(FetchError::HttpStatus {
                status: 0,
                url: url.to_string(),
            }),
        }
    }
}
