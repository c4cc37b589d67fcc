//! Configuration management for the ticket server.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file is read first (see [`qr_tickets_web::load_env_file`]); real
//! environment variables win over it.

use qr_tickets_auth::IdentityProviderConfig;
use qr_tickets_postgres::PostgresConfig;
use qr_tickets_web::env_parse;
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// `PostgreSQL` configuration
    pub database: PostgresConfig,
    /// Identity provider and session configuration
    pub auth: AuthConfig,
    /// Apply migrations at startup
    pub run_migrations: bool,
    /// Minimum QR image dimension in pixels
    pub qr_min_dimension: u32,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Externally visible base URL; ticket links and the OAuth callback are
    /// built from it
    pub public_base_url: String,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Identity provider endpoints and client credentials
    pub provider: IdentityProviderConfig,
    /// Secret the session cookie key is derived from
    pub secret: String,
    /// Session lifetime in seconds (default: 1 day)
    pub session_ttl: u64,
    /// Mark cookies `Secure`
    pub cookie_secure: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.provider.issuer)
            .field("client_id", &self.provider.client_id)
            .field("audience", &self.provider.audience)
            .field("session_ttl", &self.session_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing values fall back to development defaults. Identity provider
    /// values are validated when the provider is built.
    #[must_use]
    pub fn from_env() -> Self {
        let port = env_parse("PORT", 3000);
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let mut provider = IdentityProviderConfig::new(
            env::var("AUTH_SERVER").unwrap_or_default(),
            env::var("CLIENT_ID").unwrap_or_default(),
            env::var("CLIENT_SECRET").unwrap_or_default(),
            env::var("AUDIENCE").unwrap_or_default(),
        );
        if let Ok(url) = env::var("AUTH_JWKS_URL") {
            provider = provider.with_jwks_url(url);
        }
        if let Ok(url) = env::var("AUTH_INTROSPECTION_URL") {
            provider = provider.with_introspection_url(url);
        }
        if let Ok(url) = env::var("AUTH_LOGOUT_URL") {
            provider = provider.with_logout_url(url);
        }

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port,
                public_base_url,
            },
            database: PostgresConfig::from_env(),
            auth: AuthConfig {
                provider,
                secret: env::var("SECRET").unwrap_or_default(),
                session_ttl: env_parse("SESSION_TTL", 86_400),
                cookie_secure: env_parse("SESSION_COOKIE_SECURE", false),
            },
            run_migrations: env_parse("RUN_MIGRATIONS", true),
            qr_min_dimension: env_parse("QR_MIN_DIMENSION", 256),
        }
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Where the identity provider sends users back to.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.server.public_base_url)
    }
}
