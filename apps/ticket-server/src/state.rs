//! Application state for the ticket server.

use axum::extract::FromRef;
use chrono::Duration;
use qr_tickets_auth::{OAuth2Provider, SessionCodec, TokenVerifier};
use qr_tickets_core::{IssuanceWorkflow, TicketLedger, TicketLinks};
use qr_tickets_web::CookieOptions;
use std::sync::Arc;

/// The identity provider operations the server needs.
pub trait IdentityProvider: OAuth2Provider + TokenVerifier + Send + Sync + 'static {}

impl<T> IdentityProvider for T where T: OAuth2Provider + TokenVerifier + Send + Sync + 'static {}

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is a cheap handle.
pub struct AppState<P> {
    /// Issuance workflow (owns the ledger handle and QR renderer)
    pub workflow: Arc<IssuanceWorkflow>,
    /// Identity provider for sign-in and bearer token verification
    pub provider: Arc<P>,
    /// Session and login-state cookie codec
    pub sessions: SessionCodec,
    /// Cookie attributes
    pub cookies: CookieOptions,
    /// Lifetime of new user sessions
    pub session_ttl: Duration,
    /// OAuth redirect URI (`{public_base_url}/callback`)
    pub callback_url: String,
}

impl<P> AppState<P> {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        workflow: IssuanceWorkflow,
        provider: P,
        sessions: SessionCodec,
        cookies: CookieOptions,
        session_ttl: Duration,
    ) -> Self {
        let callback_url = format!("{}/callback", workflow.links().base_url());
        Self {
            workflow: Arc::new(workflow),
            provider: Arc::new(provider),
            sessions,
            cookies,
            session_ttl,
            callback_url,
        }
    }

    /// The ticket ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn TicketLedger> {
        self.workflow.ledger()
    }

    /// Canonical URL builder.
    #[must_use]
    pub fn links(&self) -> &TicketLinks {
        self.workflow.links()
    }
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            workflow: Arc::clone(&self.workflow),
            provider: Arc::clone(&self.provider),
            sessions: self.sessions.clone(),
            cookies: self.cookies,
            session_ttl: self.session_ttl,
            callback_url: self.callback_url.clone(),
        }
    }
}

// Lets the shared readiness handler extract the ledger.
impl<P> FromRef<AppState<P>> for Arc<dyn TicketLedger> {
    fn from_ref(state: &AppState<P>) -> Self {
        Arc::clone(state.ledger())
    }
}
