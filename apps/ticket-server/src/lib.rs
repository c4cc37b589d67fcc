//! # Ticket Server
//!
//! The QR ticket web application: a landing page with the issued-ticket
//! count, ticket issuance for authenticated callers, and ticket detail pages
//! for signed-in users.
//!
//! ```text
//! browser / backend ─▶ routes ─▶ api::generate_ticket ─▶ IssuanceWorkflow ─▶ TicketLedger
//!                        │
//!                        ├─▶ pages (index, ticket details)
//!                        └─▶ auth (login, callback, logout) ─▶ identity provider
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod pages;
pub mod routes;
pub mod state;

pub use config::Config;
pub use routes::{build_router, build_router_with_metrics};
pub use state::{AppState, IdentityProvider};
