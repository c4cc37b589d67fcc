//! # Data Service
//!
//! A tiny microservice exposing a greeting at `/` and the static demo
//! payload at `/data`. The landing client polls it.

use axum::{Router, routing::get};
use qr_tickets_web::handlers::{data_handler, health_check};
use qr_tickets_web::{correlation_id_layer, env_parse};
use std::env;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Body of `GET /`.
pub const GREETING: &str = "Zdravo, ovo je osnovna ruta!";

/// Bind address of the data service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to (default `127.0.0.1`)
    pub host: String,
    /// Port to bind to (default `8080`)
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Read `HOST` and `PORT`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
        }
    }

    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[allow(clippy::unused_async)]
async fn greeting() -> &'static str {
    GREETING
}

/// Build the data service router.
pub fn build_router() -> Router {
    Router::new()
        .route("/", get(greeting))
        .route("/data", get(data_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}
