//! Machine-to-machine client for `POST /generate-ticket`.
//!
//! Obtains a client-credentials token (cached until shortly before expiry),
//! posts the ticket request as JSON and retries transient failures with
//! exponential backoff. A 401 drops the cached token so the next attempt
//! fetches a fresh one.

use crate::api::GenerateTicketResponse;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use qr_tickets_auth::{AuthError, CachedTokenSource, ClientCredentialsProvider};
use qr_tickets_core::TicketRequest;
use qr_tickets_core::retry::{RetryPolicy, retry_with_predicate};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Why a ticket could not be obtained.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No machine token could be obtained.
    #[error("token request failed: {0}")]
    Token(#[from] AuthError),

    /// The server could not be reached.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server rejected the token.
    #[error("server rejected the access token")]
    Unauthorized,

    /// The server refused the request.
    #[error("server returned {status} {code}: {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Stable error code from the body.
        code: String,
        /// Message from the body.
        message: String,
    },

    /// The response body was not what the server promises.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Unauthorized => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::Token(err) => err.is_upstream_failure(),
            Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl GenerateTicketResponse {
    /// Decoded PNG bytes of the QR code.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidResponse`] if `qrCode` is not valid base64.
    pub fn qr_png(&self) -> Result<Vec<u8>, ClientError> {
        STANDARD
            .decode(&self.qr_code)
            .map_err(|e| ClientError::InvalidResponse(format!("qrCode is not base64: {e}")))
    }
}

/// Client for the ticket server's issuance endpoint.
#[derive(Debug)]
pub struct TicketClient<P> {
    http: reqwest::Client,
    endpoint: String,
    tokens: CachedTokenSource<P>,
    retry: RetryPolicy,
}

impl<P: ClientCredentialsProvider> TicketClient<P> {
    /// Client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, provider: P) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/generate-ticket", base_url.trim_end_matches('/')),
            tokens: CachedTokenSource::new(provider),
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Request a ticket.
    ///
    /// # Errors
    ///
    /// The last [`ClientError`] once retries are exhausted, or the first one
    /// that is not retryable (validation, quota).
    pub async fn issue(&self, request: &TicketRequest) -> Result<GenerateTicketResponse, ClientError> {
        retry_with_predicate(&self.retry, || self.attempt(request), ClientError::is_retryable).await
    }

    async fn attempt(&self, request: &TicketRequest) -> Result<GenerateTicketResponse, ClientError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ClientError::InvalidResponse(e.to_string()));
        }

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            return Err(ClientError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => (parsed.code, parsed.message),
            Err(_) => (String::new(), body),
        };

        Err(ClientError::Rejected {
            status: status.as_u16(),
            code,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retried() {
        let rejected = |status| ClientError::Rejected {
            status,
            code: String::new(),
            message: String::new(),
        };

        assert!(rejected(500).is_retryable());
        assert!(!rejected(400).is_retryable());
        assert!(ClientError::Unauthorized.is_retryable());
        assert!(!ClientError::InvalidResponse("x".into()).is_retryable());
        assert!(ClientError::Token(AuthError::TokenRequestFailed("503".into())).is_retryable());
        assert!(!ClientError::Token(AuthError::InvalidConfiguration("x".into())).is_retryable());
    }
}
