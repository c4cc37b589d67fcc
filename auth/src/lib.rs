//! # QR Tickets Authentication
//!
//! Identity-provider integration for QR Tickets.
//!
//! Two kinds of principals reach the ticket server:
//!
//! - **Users** sign in through the OAuth2 authorization-code flow and carry an
//!   encrypted session cookie afterwards.
//! - **Machines** present a bearer token obtained through the
//!   client-credentials flow; the server verifies its RS256 signature against
//!   the identity provider's JWKS (or introspects it, when configured).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────────────┐   ┌───────────────┐
//! │ OAuth2Provider   │   │ ClientCredentialsProvider│   │ TokenVerifier │
//! │ authorize/code/  │   │ machine token request    │   │ JWKS / RFC7662│
//! │ userinfo/logout  │   └──────────────────────────┘   └───────────────┘
//! └──────────────────┘                │
//!          ▲                          ▼
//!          └──── OidcProvider ── CachedTokenSource
//!
//! SessionCodec: AES-256-GCM sealed cookies (UserSession, LoginState)
//! ```
//!
//! Providers are traits so handlers can be tested against
//! [`mocks::MockIdentityProvider`] (feature `test-utils`, on by default).

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod token_cache;

#[cfg(feature = "test-utils")]
pub mod mocks;

pub use config::IdentityProviderConfig;
pub use error::{AuthError, Result};
pub use providers::{
    ClientCredentialsProvider, MachineToken, OAuth2Provider, OAuthTokenResponse, OAuthUserInfo,
    OidcProvider, TokenClaims, TokenVerifier,
};
pub use session::{LoginState, SessionCodec, UserSession};
pub use token_cache::CachedTokenSource;
