//! Shared Axum plumbing for the QR Tickets services.
//!
//! Handlers stay thin: they extract input, call into `qr-tickets-core` or
//! `qr-tickets-auth`, and let [`AppError`] turn failures into responses.
//!
//! # Request Flow
//!
//! ```text
//! request ─▶ correlation_id_layer ─▶ extractors ─▶ handler ─▶ workflow / ledger
//!                                       │                         │
//!                                       └──── AppError ◀──────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use qr_tickets_web::{AppError, correlation_id_layer, handlers};
//! use axum::{Router, routing::get};
//!
//! let app = Router::new()
//!     .route("/health", get(handlers::health_check))
//!     .route("/ready", get(handlers::readiness_check))
//!     .layer(correlation_id_layer())
//!     .with_state(ledger);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cookies;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod html;
pub mod middleware;
pub mod shutdown;

pub use config::{env_parse, load_env_file};
pub use cookies::CookieOptions;
pub use error::AppError;
pub use extractors::{BearerToken, Cookies, CorrelationId, WantsHtml};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};
pub use shutdown::shutdown_signal;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
