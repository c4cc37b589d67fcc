//! Router configuration for the ticket server.

use crate::state::{AppState, IdentityProvider};
use crate::{api, auth, pages};
use axum::{
    Router,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use qr_tickets_web::correlation_id_layer;
use qr_tickets_web::handlers::{data_handler, health_check, readiness_check};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/`, `/ticket/:id`: pages
/// - `/generate-ticket`: issuance (bearer token or session)
/// - `/login`, `/callback`, `/logout`: user sign-in
/// - `/data`, `/api/data`: static demo payload (CORS open)
/// - `/health`, `/ready`: probes
pub fn build_router<P: IdentityProvider>(state: AppState<P>) -> Router {
    build_router_with_metrics(state, None)
}

/// [`build_router`] plus `/metrics` rendering `metrics` in the Prometheus
/// text format. The route sits behind the same trace and correlation layers.
pub fn build_router_with_metrics<P: IdentityProvider>(
    state: AppState<P>,
    metrics: Option<PrometheusHandle>,
) -> Router {
    let data_routes = Router::new()
        .route("/data", get(data_handler))
        .route("/api/data", get(data_handler))
        .layer(CorsLayer::permissive());

    let mut router = Router::new()
        .route("/", get(pages::index::<P>))
        .route("/generate-ticket", post(api::generate_ticket::<P>))
        .route("/ticket/:id", get(pages::ticket_details::<P>))
        .route("/login", get(auth::login::<P>))
        .route("/callback", get(auth::callback::<P>))
        .route("/logout", get(auth::logout::<P>))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(state)
        .merge(data_routes);

    if let Some(handle) = metrics {
        router = router.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
}
