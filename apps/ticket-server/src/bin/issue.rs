//! Issue a ticket as a backend client.
//!
//! Uses the client-credentials flow (`AUTH_SERVER`, `CLIENT_ID`,
//! `CLIENT_SECRET`, `AUDIENCE`) and writes the returned QR code to a PNG.
//!
//! ```bash
//! TICKET_SERVER_URL=http://localhost:3000 \
//! cargo run --bin issue-ticket -- 12345678901 Ana Horvat ticket.png
//! ```

use anyhow::{Context, bail};
use qr_tickets_auth::OidcProvider;
use qr_tickets_core::TicketRequest;
use qr_tickets_web::load_env_file;
use std::path::PathBuf;
use ticket_server::Config;
use ticket_server::client::TicketClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "issue_ticket=info,ticket_server=info,qr_tickets_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [owner_id, first_name, last_name, rest @ ..] = args.as_slice() else {
        bail!("usage: issue-ticket <OIB> <FIRST_NAME> <LAST_NAME> [OUTPUT.png]");
    };
    let output = rest
        .first()
        .map_or_else(|| PathBuf::from("ticket.png"), PathBuf::from);

    let config = Config::from_env();
    let server_url = std::env::var("TICKET_SERVER_URL")
        .unwrap_or_else(|_| config.server.public_base_url.clone());

    let provider = OidcProvider::new(config.auth.provider.clone())
        .context("invalid identity provider configuration")?;
    let client = TicketClient::new(&server_url, provider)?;

    let request = TicketRequest::new(owner_id.as_str(), first_name.as_str(), last_name.as_str());
    let issued = client.issue(&request).await.context("ticket issuance failed")?;

    std::fs::write(&output, issued.qr_png()?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(
        ticket_id = %issued.ticket_id,
        ticket_url = %issued.ticket_url,
        output = %output.display(),
        "Ticket issued"
    );
    Ok(())
}
