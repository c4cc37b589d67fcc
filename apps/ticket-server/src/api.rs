//! Ticket issuance endpoint.

use crate::auth::resolve_caller;
use crate::pages;
use crate::state::{AppState, IdentityProvider};
use axum::{
    Form, Json, async_trait,
    extract::{FromRequest, Request, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use qr_tickets_core::{ErrorKind, IssuanceError, IssuedTicket, TicketRequest};
use qr_tickets_web::{AppError, CorrelationId, WantsHtml, WebResult};
use serde::{Deserialize, Serialize};

/// Public message for a body that does not deserialize into a request.
pub const INVALID_BODY_MESSAGE: &str = "Invalid ticket request body";

/// Ticket request body, accepted as JSON or as an HTML form.
#[derive(Debug, Clone)]
pub struct TicketForm(pub TicketRequest);

/// The deserializer's reason stays in the debug log.
fn invalid_body(reason: &str) -> AppError {
    tracing::debug!(reason, "Rejected ticket request body");
    AppError::new(
        StatusCode::BAD_REQUEST,
        INVALID_BODY_MESSAGE.to_string(),
        ErrorKind::Validation.code().to_string(),
    )
}

#[async_trait]
impl<S> FromRequest<S> for TicketForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            let Json(request) = Json::<TicketRequest>::from_request(req, state)
                .await
                .map_err(|e| invalid_body(&e.body_text()))?;
            Ok(Self(request))
        } else {
            let Form(request) = Form::<TicketRequest>::from_request(req, state)
                .await
                .map_err(|e| invalid_body(&e.body_text()))?;
            Ok(Self(request))
        }
    }
}

/// JSON response of `POST /generate-ticket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTicketResponse {
    /// Id of the new ticket.
    pub ticket_id: String,
    /// Canonical ticket URL (the QR payload).
    pub ticket_url: String,
    /// PNG QR code, standard base64.
    pub qr_code: String,
}

impl From<&IssuedTicket> for GenerateTicketResponse {
    fn from(issued: &IssuedTicket) -> Self {
        Self {
            ticket_id: issued.ticket.id.to_string(),
            ticket_url: issued.ticket_url.clone(),
            qr_code: issued.qr_png_base64.clone(),
        }
    }
}

/// `POST /generate-ticket`
///
/// The caller is authenticated before the body is looked at, so an anonymous
/// request with a malformed body still gets 401.
///
/// # Errors
///
/// - 401 `AUTH_ERROR`: no valid bearer token or session
/// - 400 `VALIDATION_ERROR` / `QUOTA_EXCEEDED`
/// - 500 `STORAGE_ERROR` / `ENCODING_ERROR`
pub async fn generate_ticket<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    correlation_id: CorrelationId,
    WantsHtml(wants_html): WantsHtml,
    headers: HeaderMap,
    body: Result<TicketForm, AppError>,
) -> WebResult<Response> {
    let caller = resolve_caller(&state, &headers).await?;
    let Some(caller) = caller else {
        return Err(IssuanceError::Unauthenticated.into());
    };
    let TicketForm(request) = body?;

    tracing::info!(
        correlation_id = %correlation_id.0,
        caller = %caller.subject(),
        caller_kind = caller.kind(),
        "Ticket requested"
    );

    let issued = state.workflow.issue(Some(&caller), &request).await?;

    if wants_html {
        Ok(pages::issued_ticket_page(&issued).into_response())
    } else {
        Ok(Json(GenerateTicketResponse::from(&issued)).into_response())
    }
}
