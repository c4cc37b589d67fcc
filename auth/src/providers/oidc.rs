//! HTTP implementation of the provider traits for an OAuth2/OIDC identity
//! provider (Auth0-style endpoints by default).

use crate::config::IdentityProviderConfig;
use crate::error::{AuthError, Result};
use crate::providers::jwks::{self, AccessTokenClaims, JwksCache};
use crate::providers::{
    Audience, ClientCredentialsProvider, IdTokenClaims, MachineToken, OAuth2Provider,
    OAuthTokenResponse, OAuthUserInfo, TokenClaims, TokenVerifier,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::Validation;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default lifetime assumed for machine tokens without `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Identity provider reached over HTTP.
///
/// Bearer tokens and ID tokens are verified locally against the provider's
/// signing keys (RS256). Setting
/// [`IdentityProviderConfig::introspection_url`] switches bearer token
/// verification to RFC 7662 introspection instead.
///
/// # Example
///
/// ```no_run
/// use qr_tickets_auth::{IdentityProviderConfig, OidcProvider};
///
/// # fn example() -> qr_tickets_auth::Result<()> {
/// let provider = OidcProvider::new(IdentityProviderConfig::new(
///     "https://tenant.eu.auth0.com",
///     "client-id",
///     "client-secret",
///     "https://tickets.example.com/api",
/// ))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct OidcProvider {
    config: IdentityProviderConfig,
    http_client: Client,
    jwks: Arc<JwksCache>,
    access_validation: Validation,
    id_validation: Validation,
}

impl OidcProvider {
    /// Create a provider with a default HTTP client (10s timeout).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if the configuration is
    /// incomplete, or [`AuthError::InternalError`] if the HTTP client cannot
    /// be built.
    pub fn new(config: IdentityProviderConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::InternalError(format!("Failed to build HTTP client: {e}")))?;

        Self::with_client(config, http_client)
    }

    /// Create a provider with a caller-supplied HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if the configuration is
    /// incomplete.
    pub fn with_client(config: IdentityProviderConfig, http_client: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            jwks: Arc::new(JwksCache::new(config.jwks_endpoint())),
            access_validation: jwks::access_token_validation(&config),
            id_validation: jwks::id_token_validation(&config),
            config,
            http_client,
        })
    }

    /// The provider configuration.
    #[must_use]
    pub const fn config(&self) -> &IdentityProviderConfig {
        &self.config
    }

    async fn introspect(&self, endpoint: &str, token: &str) -> Result<TokenClaims> {
        let params = [("token", token), ("token_type_hint", "access_token")];

        let response = self
            .http_client
            .post(endpoint)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::InternalError(format!("Introspection request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(%status, "Introspection endpoint refused request");
            return Err(AuthError::InternalError(format!(
                "Introspection endpoint returned {status}"
            )));
        }

        let introspection: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InternalError(format!("Introspection response: {e}")))?;

        claims_from_introspection(&self.config, introspection, Utc::now())
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Client-credentials request body (JSON, as Auth0 expects).
#[derive(Debug, Serialize)]
struct ClientCredentialsRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

/// RFC 7662 introspection response.
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
}

impl OAuth2Provider for OidcProvider {
    fn authorization_url(&self, state: &str, nonce: &str, redirect_uri: &str) -> Result<String> {
        let scope = self.config.scopes.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
            ("nonce", nonce),
        ];

        let query = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::InternalError(format!("Failed to build URL: {e}")))?;

        Ok(format!("{}?{query}", self.config.authorize_endpoint()))
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<OAuthTokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %error_body, "Token exchange failed");
            return Err(AuthError::TokenExchangeFailed(format!(
                "Token endpoint returned {status}"
            )));
        }

        let tokens: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        if let Some(id_token) = &tokens.id_token {
            let claims: IdTokenClaims = self
                .jwks
                .verify(&self.http_client, id_token, &self.id_validation)
                .await
                .map_err(|e| match e {
                    AuthError::InvalidToken(reason) => {
                        tracing::warn!(%reason, "ID token rejected");
                        AuthError::TokenExchangeFailed(format!("ID token rejected: {reason}"))
                    }
                    other => other,
                })?;
            tracing::debug!(sub = %claims.sub, "ID token verified");
        }

        Ok(OAuthTokenResponse {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            expires_at: tokens
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<OAuthUserInfo> {
        let response = self
            .http_client
            .get(self.config.userinfo_endpoint())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::UserInfoFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %error_body, "UserInfo request failed");
            return Err(AuthError::UserInfoFailed(format!(
                "UserInfo endpoint returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::UserInfoFailed(e.to_string()))
    }

    fn logout_url(&self, return_to: &str) -> Result<String> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("returnTo", return_to),
        ];
        let query = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::InternalError(format!("Failed to build URL: {e}")))?;

        Ok(format!("{}?{query}", self.config.logout_endpoint()))
    }
}

impl ClientCredentialsProvider for OidcProvider {
    async fn request_token(&self) -> Result<MachineToken> {
        let body = ClientCredentialsRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            audience: &self.config.audience,
        };

        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::TokenRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %error_body, "Client credentials request failed");
            return Err(AuthError::TokenRequestFailed(format!(
                "Token endpoint returned {status}"
            )));
        }

        let token: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenRequestFailed(e.to_string()))?;

        let lifetime = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        tracing::debug!(expires_in = lifetime, "Obtained machine token");

        Ok(MachineToken {
            access_token: token.access_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        })
    }
}

impl TokenVerifier for OidcProvider {
    async fn verify(&self, token: &str) -> Result<TokenClaims> {
        if let Some(endpoint) = self.config.introspection_endpoint() {
            return self.introspect(endpoint, token).await;
        }

        let claims: AccessTokenClaims = self
            .jwks
            .verify(&self.http_client, token, &self.access_validation)
            .await?;
        claims.into_claims()
    }
}

fn claims_from_introspection(
    config: &IdentityProviderConfig,
    introspection: IntrospectionResponse,
    now: DateTime<Utc>,
) -> Result<TokenClaims> {
    if !introspection.active {
        return Err(AuthError::InvalidToken("token is not active".to_string()));
    }

    if let Some(iss) = &introspection.iss {
        if !config.is_issuer(iss) {
            return Err(AuthError::InvalidToken(format!("unexpected issuer {iss}")));
        }
    }

    if !introspection
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(&config.audience))
    {
        return Err(AuthError::InvalidToken("audience mismatch".to_string()));
    }

    let expires_at = introspection
        .exp
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
        .ok_or_else(|| AuthError::InvalidToken("missing expiry".to_string()))?;
    if expires_at <= now {
        return Err(AuthError::InvalidToken("token has expired".to_string()));
    }

    let subject = introspection
        .sub
        .clone()
        .or_else(|| introspection.client_id.clone())
        .ok_or_else(|| AuthError::InvalidToken("missing subject".to_string()))?;

    Ok(TokenClaims {
        subject,
        client_id: introspection.client_id,
        scopes: introspection
            .scope
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        expires_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> IdentityProviderConfig {
        IdentityProviderConfig::new("https://idp.example.com", "client", "secret", "tickets-api")
    }

    fn active(now: DateTime<Utc>) -> IntrospectionResponse {
        IntrospectionResponse {
            active: true,
            sub: Some("svc@clients".to_string()),
            client_id: Some("svc".to_string()),
            scope: Some("tickets:write tickets:read".to_string()),
            exp: Some(now.timestamp() + 600),
            iss: Some("https://idp.example.com/".to_string()),
            aud: Some(Audience::One("tickets-api".to_string())),
        }
    }

    #[test]
    fn accepts_active_token_for_our_audience() {
        let now = Utc::now();
        let claims = claims_from_introspection(&config(), active(now), now).unwrap();

        assert_eq!(claims.subject, "svc@clients");
        assert_eq!(claims.scopes, vec!["tickets:write", "tickets:read"]);
    }

    #[test]
    fn rejects_inactive_expired_and_foreign_tokens() {
        let now = Utc::now();

        let inactive = IntrospectionResponse {
            active: false,
            ..active(now)
        };
        let expired = IntrospectionResponse {
            exp: Some(now.timestamp() - 1),
            ..active(now)
        };
        let foreign_audience = IntrospectionResponse {
            aud: Some(Audience::Many(vec!["other-api".to_string()])),
            ..active(now)
        };
        let foreign_issuer = IntrospectionResponse {
            iss: Some("https://evil.example.com/".to_string()),
            ..active(now)
        };

        for response in [inactive, expired, foreign_audience, foreign_issuer] {
            assert!(matches!(
                claims_from_introspection(&config(), response, now),
                Err(AuthError::InvalidToken(_))
            ));
        }
    }

    #[test]
    fn falls_back_to_client_id_as_subject() {
        let now = Utc::now();
        let response = IntrospectionResponse {
            sub: None,
            ..active(now)
        };

        let claims = claims_from_introspection(&config(), response, now).unwrap();
        assert_eq!(claims.subject, "svc");
    }

    #[test]
    fn authorization_url_carries_state_and_nonce() {
        let provider = OidcProvider::new(config()).unwrap();
        let url = provider
            .authorization_url("s-1", "n-1", "http://localhost:3000/callback")
            .unwrap();

        assert!(url.starts_with("https://idp.example.com/authorize?"));
        assert!(url.contains("state=s-1"));
        assert!(url.contains("nonce=n-1"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
    }

    #[test]
    fn logout_url_returns_to_app() {
        let provider = OidcProvider::new(config()).unwrap();
        let url = provider.logout_url("http://localhost:3000/").unwrap();

        assert_eq!(
            url,
            "https://idp.example.com/v2/logout?client_id=client&returnTo=http%3A%2F%2Flocalhost%3A3000%2F"
        );
    }
}
