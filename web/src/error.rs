//! Error types for web handlers.
//!
//! [`AppError`] is the single place where domain and auth errors become HTTP
//! responses. Clients see `{code, message}`; the underlying cause is logged
//! for server errors and never serialized.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use qr_tickets_auth::AuthError;
use qr_tickets_core::{ErrorKind, IssuanceError, LedgerError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Path(id): Path<String>) -> Result<Json<TicketDetails>, AppError> {
///     let id: TicketId = id.parse().map_err(|_| AppError::not_found("Ticket", &id))?;
///     Ok(Json(ledger.get_ticket(id).await?))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the internal cause.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            ErrorKind::Auth.code().to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        metrics::counter!("http.errors", "code" => self.code.clone()).increment(1);

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

impl From<IssuanceError> for AppError {
    fn from(err: IssuanceError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::Validation | ErrorKind::QuotaExceeded => StatusCode::BAD_REQUEST,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Storage | ErrorKind::Encoding => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let app_error = Self::new(status, err.public_message(), kind.code().to_string());
        if status.is_server_error() {
            app_error.with_source(anyhow::Error::new(err))
        } else {
            app_error
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::TicketNotFound(id) => Self::not_found("Ticket", id),
            other => IssuanceError::from(other).into(),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if err.is_security_issue() {
            tracing::warn!(error = %err, "Possible tampering with sign-in state");
        }

        if err.requires_login() {
            return Self::unauthorized("Authentication required");
        }

        match err {
            AuthError::OAuthStateInvalid => Self::bad_request("Sign-in could not be completed"),
            AuthError::AuthorizationDenied(reason) => {
                tracing::info!(reason = %reason, "Identity provider denied authorization");
                Self::bad_request("Sign-in could not be completed")
            }
            other if other.is_upstream_failure() => {
                Self::internal("Identity provider request failed")
                    .with_source(anyhow::Error::new(other))
            }
            other => Self::internal("An internal error occurred")
                .with_source(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use qr_tickets_core::{CitizenId, EncodingError, TicketId};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let err = AppError::not_found("Ticket", "123");
        assert_eq!(err.to_string(), "[NOT_FOUND] Ticket 123 not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn quota_and_validation_are_client_errors() {
        let quota = AppError::from(IssuanceError::QuotaExceeded {
            owner_id: CitizenId::new("12345678901"),
            limit: 3,
        });
        assert_eq!(quota.status(), StatusCode::BAD_REQUEST);
        assert_eq!(quota.code(), "QUOTA_EXCEEDED");

        let unauthenticated = AppError::from(IssuanceError::Unauthenticated);
        assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthenticated.code(), "AUTH_ERROR");
    }

    #[test]
    fn storage_detail_stays_internal() {
        let err = AppError::from(IssuanceError::Storage(
            "connection refused to 10.0.0.5".into(),
        ));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(!err.message().contains("10.0.0.5"));

        let err = AppError::from(IssuanceError::Encoding(EncodingError("too long".into())));
        assert_eq!(err.code(), "ENCODING_ERROR");
        assert!(!err.message().contains("too long"));
    }

    #[test]
    fn missing_ticket_maps_to_not_found() {
        let err = AppError::from(LedgerError::TicketNotFound(TicketId::new()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn auth_errors_map_by_cause() {
        assert_eq!(
            AppError::from(AuthError::InvalidToken("expired".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::OAuthStateInvalid).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(AuthError::TokenExchangeFailed("502".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn warnings_while(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);
        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn tampered_session_is_401_and_logged() {
        let logs = warnings_while(|| {
            let err = AppError::from(AuthError::SessionTampered);
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        });
        assert!(logs.contains("Possible tampering"), "{logs}");

        let logs = warnings_while(|| {
            let err = AppError::from(AuthError::OAuthStateInvalid);
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        });
        assert!(logs.contains("Possible tampering"), "{logs}");
    }

    #[test]
    fn expired_session_is_not_logged_as_tampering() {
        let logs = warnings_while(|| {
            let err = AppError::from(AuthError::SessionExpired);
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        });
        assert!(logs.is_empty(), "{logs}");
    }

    #[tokio::test]
    async fn body_exposes_code_and_message_only() {
        let response = AppError::internal("An internal error occurred")
            .with_source(anyhow::anyhow!("password=hunter2"))
            .into_response();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
        assert!(!bytes.windows(7).any(|w| w == b"hunter2"));
    }
}
