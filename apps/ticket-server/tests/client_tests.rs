//! `TicketClient` against a running ticket server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use qr_tickets_auth::mocks::MockIdentityProvider;
use qr_tickets_auth::SessionCodec;
use qr_tickets_core::mocks::MockTicketLedger;
use qr_tickets_core::retry::RetryPolicy;
use qr_tickets_core::{IssuanceWorkflow, TicketLinks, TicketRequest};
use qr_tickets_web::CookieOptions;
use std::sync::Arc;
use ticket_server::client::{ClientError, TicketClient};
use ticket_server::{AppState, build_router};

/// Serve the router on an ephemeral port; returns its base URL.
async fn spawn_server(ledger: &MockTicketLedger, provider: MockIdentityProvider) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let workflow = IssuanceWorkflow::new(Arc::new(ledger.clone()), TicketLinks::new(&base_url));
    let state = AppState::new(
        workflow,
        provider,
        SessionCodec::new("client-test-secret").unwrap(),
        CookieOptions::new(false),
        chrono::Duration::hours(1),
    );

    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base_url
}

#[tokio::test]
async fn client_obtains_token_and_ticket() {
    let ledger = MockTicketLedger::new();
    let provider = MockIdentityProvider::new();
    let base_url = spawn_server(&ledger, provider.clone()).await;

    let client = TicketClient::new(&base_url, provider.clone()).unwrap();
    let issued = client
        .issue(&TicketRequest::new("00012345678", "Ana", "Horvat"))
        .await
        .unwrap();

    assert_eq!(issued.ticket_url, format!("{base_url}/ticket/{}", issued.ticket_id));
    assert!(issued.qr_png().unwrap().starts_with(b"\x89PNG"));
    assert_eq!(ledger.ticket_count(), 1);

    // The cached token is reused for the next request.
    client
        .issue(&TicketRequest::new("00012345678", "Ana", "Horvat"))
        .await
        .unwrap();
    assert_eq!(provider.token_requests(), 1);
}

#[tokio::test]
async fn quota_rejection_is_not_retried() {
    let ledger = MockTicketLedger::new();
    let provider = MockIdentityProvider::new();
    let base_url = spawn_server(&ledger, provider.clone()).await;
    let client = TicketClient::new(&base_url, provider).unwrap();
    let request = TicketRequest::new("12345678901", "Ana", "Horvat");

    for _ in 0..3 {
        client.issue(&request).await.unwrap();
    }
    let err = client.issue(&request).await.unwrap_err();

    match err {
        ClientError::Rejected { status, code, .. } => {
            assert_eq!(status, 400);
            assert_eq!(code, "QUOTA_EXCEEDED");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger.ticket_count(), 3);
}

#[tokio::test]
async fn validation_failure_is_reported() {
    let ledger = MockTicketLedger::new();
    let provider = MockIdentityProvider::new();
    let base_url = spawn_server(&ledger, provider.clone()).await;
    let client = TicketClient::new(&base_url, provider).unwrap();

    let err = client
        .issue(&TicketRequest::new("12345678901", "", "Horvat"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Rejected { status: 400, ref code, .. } if code == "VALIDATION_ERROR"));
    assert_eq!(ledger.owner_count(), 0);
}

#[tokio::test]
async fn token_request_failure_surfaces_after_retries() {
    let ledger = MockTicketLedger::new();
    let provider = MockIdentityProvider::new();
    provider.fail_token_requests(true);
    let base_url = spawn_server(&ledger, provider.clone()).await;

    let client = TicketClient::new(&base_url, provider)
        .unwrap()
        .with_retry_policy(RetryPolicy::none());
    let err = client
        .issue(&TicketRequest::new("12345678901", "Ana", "Horvat"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Token(_)));
    assert_eq!(ledger.ticket_count(), 0);
}

#[tokio::test]
async fn storage_outage_is_retried_then_reported() {
    let ledger = MockTicketLedger::new();
    ledger.set_unavailable(true);
    let provider = MockIdentityProvider::new();
    let base_url = spawn_server(&ledger, provider.clone()).await;

    let client = TicketClient::new(&base_url, provider.clone())
        .unwrap()
        .with_retry_policy(
            RetryPolicy::builder()
                .max_retries(2)
                .initial_delay(std::time::Duration::from_millis(5))
                .build(),
        );
    let err = client
        .issue(&TicketRequest::new("12345678901", "Ana", "Horvat"))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(err, ClientError::Rejected { status: 500, .. }));
    // One token served all three attempts.
    assert_eq!(provider.token_requests(), 1);
}
