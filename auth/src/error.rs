//! Error types for authentication operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication failure modes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Bearer Tokens
    // ═══════════════════════════════════════════════════════════

    /// No `Authorization: Bearer` header was sent.
    #[error("Missing bearer token")]
    MissingBearerToken,

    /// The token is inactive, expired, or issued for someone else.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// The machine token request was refused.
    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    // ═══════════════════════════════════════════════════════════
    // Authorization Code Flow
    // ═══════════════════════════════════════════════════════════

    /// The provider redirected back with an error.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// OAuth state parameter is missing or does not match (CSRF protection).
    #[error("Invalid OAuth state parameter")]
    OAuthStateInvalid,

    /// Exchanging the authorization code failed.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Fetching the user profile failed.
    #[error("User info request failed: {0}")]
    UserInfoFailed(String),

    // ═══════════════════════════════════════════════════════════
    // Sessions
    // ═══════════════════════════════════════════════════════════

    /// No session cookie was sent.
    #[error("Session not found")]
    SessionMissing,

    /// The session is past its expiry.
    #[error("Session has expired")]
    SessionExpired,

    /// The cookie could not be decrypted or parsed.
    #[error("Session cookie rejected")]
    SessionTampered,

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Configuration is incomplete or malformed.
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Returns `true` if the caller should (re-)authenticate.
    ///
    /// # Examples
    ///
    /// ```
    /// # use qr_tickets_auth::AuthError;
    /// assert!(AuthError::SessionExpired.requires_login());
    /// assert!(!AuthError::InternalError("boom".into()).requires_login());
    /// ```
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::MissingBearerToken
                | Self::InvalidToken(_)
                | Self::SessionMissing
                | Self::SessionExpired
                | Self::SessionTampered
        )
    }

    /// Returns `true` if this error indicates a security issue.
    ///
    /// # Examples
    ///
    /// ```
    /// # use qr_tickets_auth::AuthError;
    /// assert!(AuthError::OAuthStateInvalid.is_security_issue());
    /// assert!(!AuthError::SessionExpired.is_security_issue());
    /// ```
    #[must_use]
    pub const fn is_security_issue(&self) -> bool {
        matches!(self, Self::OAuthStateInvalid | Self::SessionTampered)
    }

    /// Returns `true` if the identity provider itself failed.
    #[must_use]
    pub const fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            Self::TokenRequestFailed(_) | Self::TokenExchangeFailed(_) | Self::UserInfoFailed(_)
        )
    }
}
