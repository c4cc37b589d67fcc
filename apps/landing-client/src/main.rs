//! Landing client binary.
//!
//! ```bash
//! DATA_SERVICE_URL=http://127.0.0.1:8080 cargo run --bin landing-client
//! ```

use anyhow::Context;
use landing_client::{Config, DataPoller, build_router};
use qr_tickets_web::{load_env_file, shutdown_signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env_file();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "landing_client=info,qr_tickets_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        env_file = ?env_file,
        bind = %config.bind_address(),
        data_service_url = %config.data_service_url,
        "Starting landing client"
    );

    let poller = DataPoller::new(&config.data_service_url).context("failed to build HTTP client")?;
    let poll_task = tokio::spawn(poller.run(
        config.initial_delay,
        config.poll_interval,
        std::future::pending(),
    ));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    tracing::info!("Klijentski server je pokrenut!");

    let served = axum::serve(listener, build_router())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    poll_task.abort();
    tracing::info!("Landing client stopped");
    served
}
