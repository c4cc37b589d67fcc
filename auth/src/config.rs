//! Identity provider configuration.
//!
//! Endpoints default to the conventional paths under the issuer URL and can be
//! overridden one by one.

use crate::error::{AuthError, Result};

/// Identity provider connection settings.
#[derive(Debug, Clone)]
pub struct IdentityProviderConfig {
    /// Issuer base URL (e.g. `https://tenant.eu.auth0.com`).
    pub issuer: String,

    /// OAuth client id of this application.
    pub client_id: String,

    /// OAuth client secret (keep confidential).
    pub client_secret: String,

    /// API audience requested for, and required in, machine tokens.
    pub audience: String,

    /// Scopes requested in the authorization-code flow.
    ///
    /// Default: `openid profile email`
    pub scopes: Vec<String>,

    /// Authorization endpoint override. Default: `{issuer}/authorize`
    pub authorize_url: Option<String>,

    /// Token endpoint override. Default: `{issuer}/oauth/token`
    pub token_url: Option<String>,

    /// User info endpoint override. Default: `{issuer}/userinfo`
    pub userinfo_url: Option<String>,

    /// JSON Web Key Set endpoint override.
    /// Default: `{issuer}/.well-known/jwks.json`
    pub jwks_url: Option<String>,

    /// Token introspection (RFC 7662) endpoint. When set, bearer tokens are
    /// introspected instead of verified locally against the JWKS.
    pub introspection_url: Option<String>,

    /// Logout endpoint override. Default: `{issuer}/v2/logout`
    pub logout_url: Option<String>,
}

impl IdentityProviderConfig {
    /// Create a configuration with default scopes and endpoints.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: audience.into(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            authorize_url: None,
            token_url: None,
            userinfo_url: None,
            jwks_url: None,
            introspection_url: None,
            logout_url: None,
        }
    }

    /// Set custom scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the JWKS endpoint.
    #[must_use]
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    /// Introspect bearer tokens at `url` instead of verifying them locally.
    #[must_use]
    pub fn with_introspection_url(mut self, url: impl Into<String>) -> Self {
        self.introspection_url = Some(url.into());
        self
    }

    /// Override the logout endpoint.
    #[must_use]
    pub fn with_logout_url(mut self, url: impl Into<String>) -> Self {
        self.logout_url = Some(url.into());
        self
    }

    /// Check that required values are present.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] naming the first missing value.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("issuer", &self.issuer),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AuthError::InvalidConfiguration(format!("{name} is required")));
            }
        }
        if !self.issuer.starts_with("http://") && !self.issuer.starts_with("https://") {
            return Err(AuthError::InvalidConfiguration(
                "issuer must be an http(s) URL".to_string(),
            ));
        }
        Ok(())
    }

    /// Authorization endpoint.
    #[must_use]
    pub fn authorize_endpoint(&self) -> String {
        self.endpoint(self.authorize_url.as_ref(), "/authorize")
    }

    /// Token endpoint.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        self.endpoint(self.token_url.as_ref(), "/oauth/token")
    }

    /// User info endpoint.
    #[must_use]
    pub fn userinfo_endpoint(&self) -> String {
        self.endpoint(self.userinfo_url.as_ref(), "/userinfo")
    }

    /// JSON Web Key Set endpoint.
    #[must_use]
    pub fn jwks_endpoint(&self) -> String {
        self.endpoint(self.jwks_url.as_ref(), "/.well-known/jwks.json")
    }

    /// Introspection endpoint, if introspection is enabled.
    #[must_use]
    pub fn introspection_endpoint(&self) -> Option<&str> {
        self.introspection_url.as_deref()
    }

    /// Accepted `iss` values: the issuer with and without a trailing slash.
    #[must_use]
    pub fn issuer_aliases(&self) -> [String; 2] {
        [self.issuer.clone(), format!("{}/", self.issuer)]
    }

    /// Logout endpoint.
    #[must_use]
    pub fn logout_endpoint(&self) -> String {
        self.endpoint(self.logout_url.as_ref(), "/v2/logout")
    }

    /// Whether `iss` names this provider. Trailing slashes are ignored.
    #[must_use]
    pub fn is_issuer(&self, iss: &str) -> bool {
        iss.trim_end_matches('/') == self.issuer
    }

    fn endpoint(&self, over: Option<&String>, path: &str) -> String {
        over.cloned()
            .unwrap_or_else(|| format!("{}{path}", self.issuer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> IdentityProviderConfig {
        IdentityProviderConfig::new("https://idp.example.com/", "client", "secret", "tickets-api")
    }

    #[test]
    fn derives_endpoints_from_issuer() {
        let config = config();
        assert_eq!(config.authorize_endpoint(), "https://idp.example.com/authorize");
        assert_eq!(config.token_endpoint(), "https://idp.example.com/oauth/token");
        assert_eq!(config.userinfo_endpoint(), "https://idp.example.com/userinfo");
        assert_eq!(
            config.jwks_endpoint(),
            "https://idp.example.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn introspection_is_opt_in() {
        assert_eq!(config().introspection_endpoint(), None);

        let config = config().with_introspection_url("https://other.example.com/introspect");
        assert_eq!(
            config.introspection_endpoint(),
            Some("https://other.example.com/introspect")
        );
    }

    #[test]
    fn overrides_win() {
        let config = config().with_jwks_url("https://keys.example.com/jwks");
        assert_eq!(config.jwks_endpoint(), "https://keys.example.com/jwks");
    }

    #[test]
    fn issuer_comparison_ignores_trailing_slash() {
        let config = config();
        assert!(config.is_issuer("https://idp.example.com/"));
        assert!(config.is_issuer("https://idp.example.com"));
        assert!(!config.is_issuer("https://evil.example.com/"));
    }

    #[test]
    fn validation_requires_client_secret() {
        let mut config = config();
        config.client_secret = String::new();
        assert!(matches!(
            config.validate(),
            Err(AuthError::InvalidConfiguration(msg)) if msg.contains("client_secret")
        ));
    }
}
