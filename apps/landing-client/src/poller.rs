//! Background polling of the data service.

use qr_tickets_core::retry::{RetryPolicy, retry_with_backoff};
use qr_tickets_web::handlers::DataPayload;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

/// Why a poll failed.
#[derive(Debug, Error)]
pub enum PollError {
    /// The data service could not be reached.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status.
    #[error("HTTP error! Status: {0}")]
    Status(u16),

    /// The body was not a data payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Fetches `/data` from the data service.
#[derive(Debug, Clone)]
pub struct DataPoller {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl DataPoller {
    /// Poller for the data service at `base_url`.
    ///
    /// # Errors
    ///
    /// [`PollError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, PollError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            url: format!("{}/data", base_url.trim_end_matches('/')),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// URL being polled.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the payload, retrying failures with backoff.
    ///
    /// # Errors
    ///
    /// The error of the last attempt.
    pub async fn poll_once(&self) -> Result<DataPayload, PollError> {
        retry_with_backoff(&self.retry, || self.fetch()).await
    }

    async fn fetch(&self) -> Result<DataPayload, PollError> {
        let response = self.http.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| PollError::InvalidPayload(e.to_string()))
    }

    /// Wait `initial_delay`, then poll every `interval` until `shutdown`
    /// resolves. Each payload's message is logged; failures are logged and
    /// polling continues.
    pub async fn run<F>(self, initial_delay: Duration, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tokio::select! {
            () = tokio::time::sleep(initial_delay) => {}
            () = &mut shutdown => return,
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(payload) => {
                            tracing::info!(value = payload.value, "{}", payload.message);
                        }
                        Err(err) => {
                            tracing::error!(url = %self.url, error = %err, "Error fetching message");
                        }
                    }
                }
                () = &mut shutdown => {
                    tracing::debug!("Poller stopping");
                    return;
                }
            }
        }
    }
}
