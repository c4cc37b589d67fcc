//! # Landing Client
//!
//! Serves a static landing page and, in the background, polls the data
//! service's `/data` endpoint, logging each payload's message.

pub mod poller;

pub use poller::{DataPoller, PollError};

use axum::{Router, response::Html, routing::get};
use qr_tickets_web::handlers::health_check;
use qr_tickets_web::{correlation_id_layer, env_parse};
use std::env;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// The landing page.
pub const LANDING_PAGE: &str = include_str!("../static/index.html");

/// Landing client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to (default `0.0.0.0`)
    pub host: String,
    /// Port to bind to (default `3000`)
    pub port: u16,
    /// Base URL of the data service
    pub data_service_url: String,
    /// Wait before the first poll
    pub initial_delay: Duration,
    /// Time between polls
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            data_service_url: "http://127.0.0.1:8080".to_string(),
            initial_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Read `HOST`, `PORT`, `DATA_SERVICE_URL`, `POLL_INITIAL_DELAY_MS` and
    /// `POLL_INTERVAL_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            data_service_url: env::var("DATA_SERVICE_URL").unwrap_or(defaults.data_service_url),
            initial_delay: env::var("POLL_INITIAL_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.initial_delay, Duration::from_millis),
            poll_interval: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .map_or(defaults.poll_interval, Duration::from_secs),
        }
    }

    /// `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[allow(clippy::unused_async)]
async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// Build the landing client router.
pub fn build_router() -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.initial_delay, Duration::from_secs(2));
    }

    #[test]
    fn landing_page_is_html() {
        assert!(LANDING_PAGE.contains("<html"));
    }
}
