//! Data service binary.
//!
//! ```bash
//! HOST=0.0.0.0 PORT=8080 cargo run --bin data-service
//! ```

use anyhow::Context;
use data_service::{Config, build_router};
use qr_tickets_web::{load_env_file, shutdown_signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env_file();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "data_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(env_file = ?env_file, bind = %config.bind_address(), "Starting data service");

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    tracing::info!("Server je pokrenut na http://{}", config.bind_address());

    axum::serve(listener, build_router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Data service stopped");
    Ok(())
}
