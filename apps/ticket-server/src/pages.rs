//! Server-rendered pages.

use crate::auth::SessionUser;
use crate::state::{AppState, IdentityProvider};
use axum::{
    Json,
    extract::{Path, State},
    response::{Html, IntoResponse, Response},
};
use qr_tickets_auth::UserSession;
use qr_tickets_core::{IssuedTicket, TicketDetails, TicketId};
use qr_tickets_web::html::{escape, page};
use qr_tickets_web::{AppError, WantsHtml, WebResult};
use serde::Serialize;

/// JSON body of `GET /` for non-browser clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    /// Tickets issued so far.
    pub ticket_count: u64,
}

/// Sign-in link on the landing page; returns the user to `/`.
const SIGN_IN_LINK: &str = "/login?returnTo=%2F";

/// `GET /`: issued-ticket count, plus the request form for signed-in users.
///
/// # Errors
///
/// 500 with a generic message when the ledger cannot be read.
pub async fn index<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    WantsHtml(wants_html): WantsHtml,
    user: Option<SessionUser>,
) -> WebResult<Response> {
    let ticket_count = state.ledger().count_tickets().await?;

    if !wants_html {
        return Ok(Json(IndexResponse { ticket_count }).into_response());
    }

    let action = match &user {
        Some(SessionUser(session)) => format!(
            "<p>Prijavljeni ste kao {}. <a href=\"/logout\">Odjava</a></p>\n\
             <form method=\"post\" action=\"/generate-ticket\">\n\
             <label>OIB <input name=\"OIB\" required maxlength=\"100\"></label>\n\
             <label>Ime <input name=\"firstName\" required maxlength=\"100\"></label>\n\
             <label>Prezime <input name=\"lastName\" required maxlength=\"100\"></label>\n\
             <button type=\"submit\">Generiraj ulaznicu</button>\n\
             </form>",
            escape(session.display_name())
        ),
        None => format!(
            "<p><a href=\"{SIGN_IN_LINK}\">Prijavite se</a> za generiranje ulaznice.</p>"
        ),
    };

    let body = format!(
        "<h1>QR ulaznice</h1>\n\
         <p>Broj generiranih ulaznica: <strong>{ticket_count}</strong></p>\n\
         {action}"
    );

    Ok(page("QR ulaznice", &body).into_response())
}

/// Page showing a freshly issued ticket's QR code.
#[must_use]
pub fn issued_ticket_page(issued: &IssuedTicket) -> Html<String> {
    let body = format!(
        "<h1>Vaša ulaznica</h1>\n\
         <img alt=\"QR kod ulaznice\" src=\"data:image/png;base64,{qr}\">\n\
         <p><a href=\"{url}\">{url}</a></p>\n\
         <p><a href=\"/\">Natrag</a></p>",
        qr = escape(&issued.qr_png_base64),
        url = escape(&issued.ticket_url),
    );
    page("Vaša ulaznica", &body)
}

/// JSON body of `GET /ticket/:id` for non-browser clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    /// The ticket and its owner.
    #[serde(flatten)]
    pub details: TicketDetails,
    /// Name of the signed-in user viewing it.
    pub user_name: String,
}

/// `GET /ticket/:id`: ticket details for a signed-in user.
///
/// Unauthenticated requests are redirected to sign-in by [`SessionUser`].
///
/// # Errors
///
/// 404 for malformed or unknown ids, 500 on ledger failure.
pub async fn ticket_details<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    SessionUser(session): SessionUser,
    WantsHtml(wants_html): WantsHtml,
    Path(raw_id): Path<String>,
) -> WebResult<Response> {
    let ticket_id: TicketId = raw_id
        .parse()
        .map_err(|_| AppError::not_found("Ticket", &raw_id))?;

    let details = state.ledger().get_ticket(ticket_id).await?;

    tracing::info!(ticket_id = %ticket_id, viewer = %session.subject, "Ticket viewed");

    if wants_html {
        Ok(ticket_details_page(&details, &session).into_response())
    } else {
        Ok(Json(TicketView {
            details,
            user_name: session.display_name().to_string(),
        })
        .into_response())
    }
}

fn ticket_details_page(details: &TicketDetails, session: &UserSession) -> Html<String> {
    let body = format!(
        "<h1>Podaci o ulaznici</h1>\n\
         <p>Prijavljeni korisnik: {user}</p>\n\
         <dl>\n\
         <dt>OIB</dt><dd>{oib}</dd>\n\
         <dt>Ime</dt><dd>{first}</dd>\n\
         <dt>Prezime</dt><dd>{last}</dd>\n\
         <dt>Izdana</dt><dd>{created}</dd>\n\
         </dl>\n\
         <p><a href=\"/logout\">Odjava</a></p>",
        user = escape(session.display_name()),
        oib = escape(details.owner.id.as_str()),
        first = escape(&details.owner.first_name),
        last = escape(&details.owner.last_name),
        created = details.ticket.created_at.format("%d.%m.%Y. %H:%M:%S UTC"),
    );
    page("Podaci o ulaznici", &body)
}
