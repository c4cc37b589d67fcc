//! Cached machine tokens.

use crate::error::Result;
use crate::providers::{ClientCredentialsProvider, MachineToken};
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

/// Seconds before expiry at which a cached token is replaced.
const DEFAULT_REFRESH_MARGIN_SECS: i64 = 30;

/// Hands out a machine token, requesting a new one only when the cached token
/// is missing, invalidated, or close to expiry.
///
/// Concurrent callers share one in-flight request.
#[derive(Debug)]
pub struct CachedTokenSource<P> {
    provider: P,
    cached: Mutex<Option<MachineToken>>,
    refresh_margin: Duration,
}

impl<P: ClientCredentialsProvider> CachedTokenSource<P> {
    /// Wrap a provider with the default 30s refresh margin.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
            refresh_margin: Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
        }
    }

    /// Set how long before expiry a token is refreshed.
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// A valid access token.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error when a new token is needed and the
    /// request fails.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.expires_within(Utc::now(), self.refresh_margin) {
                return Ok(token.access_token.clone());
            }
            tracing::debug!("Cached machine token is about to expire");
        }

        let token = self.provider.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token, e.g. after the server rejected it.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
