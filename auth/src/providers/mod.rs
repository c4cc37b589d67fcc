//! Identity provider seams.
//!
//! The ticket server talks to its identity provider through three traits:
//!
//! - [`OAuth2Provider`]: user sign-in (authorization-code flow)
//! - [`ClientCredentialsProvider`]: machine token acquisition
//! - [`TokenVerifier`]: bearer token verification
//!
//! [`OidcProvider`] implements all three over HTTP. Tests use
//! `mocks::MockIdentityProvider`.

use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::Future;

mod jwks;
pub mod oidc;

pub use oidc::OidcProvider;

/// OAuth2 authorization-code flow.
pub trait OAuth2Provider: Send + Sync {
    /// Build the URL to redirect the user to.
    ///
    /// # Errors
    ///
    /// Returns error if URL construction fails.
    fn authorization_url(&self, state: &str, nonce: &str, redirect_uri: &str) -> Result<String>;

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenExchangeFailed`] if the request fails or the
    /// provider rejects the code.
    fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> impl Future<Output = Result<OAuthTokenResponse>> + Send;

    /// Fetch the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UserInfoFailed`] if the request fails.
    fn fetch_user_info(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<OAuthUserInfo>> + Send;

    /// URL that ends the provider session and returns to `return_to`.
    ///
    /// # Errors
    ///
    /// Returns error if URL construction fails.
    fn logout_url(&self, return_to: &str) -> Result<String>;
}

/// OAuth2 client-credentials flow.
pub trait ClientCredentialsProvider: Send + Sync {
    /// Request a machine token for the configured audience.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenRequestFailed`] if the provider refuses.
    fn request_token(&self) -> impl Future<Output = Result<MachineToken>> + Send;
}

/// Bearer token verification.
pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer token and return its claims.
    ///
    /// Checks that the token is genuine, issued by the configured issuer, meant
    /// for the configured audience, and not expired.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if any check fails.
    fn verify(&self, token: &str) -> impl Future<Output = Result<TokenClaims>> + Send;
}

/// Tokens returned by the code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokenResponse {
    /// Access token.
    pub access_token: String,

    /// OIDC ID token, if `openid` was requested.
    pub id_token: Option<String>,

    /// Expiration timestamp (if provided).
    pub expires_at: Option<DateTime<Utc>>,
}

/// Signed-in user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthUserInfo {
    /// Provider subject identifier.
    pub sub: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// Machine token from the client-credentials flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineToken {
    /// The bearer token.
    pub access_token: String,

    /// Token type, normally `Bearer`.
    pub token_type: String,

    /// When the token stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl MachineToken {
    /// Whether the token expires within `margin` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at - margin <= now
    }
}

/// Verified bearer token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Token subject (`<client_id>@clients` for machine tokens).
    pub subject: String,

    /// OAuth client the token was issued to.
    pub client_id: Option<String>,

    /// Granted scopes.
    pub scopes: Vec<String>,

    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

/// The subset of ID token claims checked on sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject.
    pub sub: String,

    /// Audience.
    pub aud: Audience,

    /// Nonce echoed from the authorization request.
    #[serde(default)]
    pub nonce: Option<String>,
}

/// `aud` claim: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience.
    One(String),
    /// Several audiences.
    Many(Vec<String>),
}

impl Audience {
    /// Whether `audience` is included.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(aud) => aud == audience,
            Self::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Read the claims of an ID token returned by [`OAuth2Provider::exchange_code`].
///
/// Only decodes. Signature, issuer, audience and expiry are checked by the
/// provider during the exchange.
///
/// # Errors
///
/// Returns [`AuthError::TokenExchangeFailed`] if the token is not a
/// well-formed JWT.
pub fn decode_id_token_claims(id_token: &str) -> Result<IdTokenClaims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<IdTokenClaims>(id_token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::TokenExchangeFailed(format!("ID token: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn jwt(claims: &serde_json::Value) -> String {
        format!(
            "eyJhbGciOiJSUzI1NiJ9.{}.c2lnbmF0dXJl",
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    #[test]
    fn decodes_id_token_claims() {
        let token = jwt(&serde_json::json!({
            "iss": "https://idp.example.com/",
            "sub": "auth0|42",
            "aud": "client",
            "nonce": "n-123",
        }));

        let claims = decode_id_token_claims(&token).unwrap();

        assert_eq!(claims.sub, "auth0|42");
        assert_eq!(claims.nonce.as_deref(), Some("n-123"));
        assert!(claims.aud.contains("client"));
    }

    #[test]
    fn audience_may_be_a_list() {
        let token = jwt(&serde_json::json!({
            "iss": "https://idp.example.com/",
            "sub": "auth0|42",
            "aud": ["tickets-api", "client"],
        }));

        let claims = decode_id_token_claims(&token).unwrap();
        assert!(claims.aud.contains("client"));
        assert!(!claims.aud.contains("other"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(decode_id_token_claims("not-a-jwt").is_err());
        assert!(decode_id_token_claims("a.!!!.c").is_err());
    }

    #[test]
    fn machine_token_expiry_margin() {
        let now = Utc::now();
        let token = MachineToken {
            access_token: "t".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: now + chrono::Duration::seconds(20),
        };

        assert!(token.expires_within(now, chrono::Duration::seconds(30)));
        assert!(!token.expires_within(now, chrono::Duration::seconds(10)));
    }
}
