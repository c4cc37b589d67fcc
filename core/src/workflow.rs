//! The ticket issuance workflow.
//!
//! Each request moves through a fixed sequence of gates:
//!
//! ```text
//! Unauthenticated ─▶ Authenticated ─▶ Validated ─▶ OwnerEnsured ─┬▶ TicketIssued ─▶ Rendered
//!        │                 │               │                     └▶ QuotaExceeded
//!        └──────────── Rejected ◀──────────┘
//! ```
//!
//! The workflow holds no per-request state; every transition is traced with
//! an [`IssuanceStage`] field on the current span.

use crate::error::IssuanceError;
use crate::ledger::TicketLedger;
use crate::links::TicketLinks;
use crate::qr::QrRenderer;
use crate::types::{Caller, Ticket, TicketRequest};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument as _;

/// Stage of a single issuance request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssuanceStage {
    /// Nothing checked yet.
    Unauthenticated,
    /// A caller was presented.
    Authenticated,
    /// Input passed validation.
    Validated,
    /// The owner row exists.
    OwnerEnsured,
    /// A ticket was inserted.
    TicketIssued,
    /// The owner was at the limit; nothing was inserted.
    QuotaExceeded,
    /// The QR image was produced.
    Rendered,
    /// A gate refused the request.
    Rejected,
}

impl IssuanceStage {
    /// Lower-case name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Validated => "validated",
            Self::OwnerEnsured => "owner_ensured",
            Self::TicketIssued => "ticket_issued",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Rendered => "rendered",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for IssuanceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTicket {
    /// The stored ticket.
    pub ticket: Ticket,
    /// Canonical URL of the ticket detail page (the QR payload).
    pub ticket_url: String,
    /// PNG QR code of `ticket_url`, standard base64.
    pub qr_png_base64: String,
}

/// Orchestrates authentication, validation, storage and QR rendering.
#[derive(Clone)]
pub struct IssuanceWorkflow {
    ledger: Arc<dyn TicketLedger>,
    links: TicketLinks,
    renderer: QrRenderer,
}

impl fmt::Debug for IssuanceWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuanceWorkflow")
            .field("links", &self.links)
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl IssuanceWorkflow {
    /// Create a workflow with the default QR renderer.
    #[must_use]
    pub fn new(ledger: Arc<dyn TicketLedger>, links: TicketLinks) -> Self {
        Self {
            ledger,
            links,
            renderer: QrRenderer::default(),
        }
    }

    /// Replace the QR renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: QrRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// The underlying ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn TicketLedger> {
        &self.ledger
    }

    /// URL builder used for QR payloads.
    #[must_use]
    pub const fn links(&self) -> &TicketLinks {
        &self.links
    }

    /// Issue a ticket for the owner described by `request`.
    ///
    /// # Errors
    ///
    /// - [`IssuanceError::Unauthenticated`]: `caller` is `None`
    /// - [`IssuanceError::Validation`]: bad input, storage untouched
    /// - [`IssuanceError::QuotaExceeded`]: owner already at the limit
    /// - [`IssuanceError::Storage`]: ledger failure
    /// - [`IssuanceError::Encoding`]: QR rendering failure (the ticket stays issued)
    pub async fn issue(
        &self,
        caller: Option<&Caller>,
        request: &TicketRequest,
    ) -> Result<IssuedTicket, IssuanceError> {
        let span = tracing::info_span!(
            "issue_ticket",
            caller = tracing::field::Empty,
            caller_kind = tracing::field::Empty,
            owner_id = tracing::field::Empty,
            ticket_id = tracing::field::Empty,
        );

        self.run(caller, request).instrument(span).await
    }

    async fn run(
        &self,
        caller: Option<&Caller>,
        request: &TicketRequest,
    ) -> Result<IssuedTicket, IssuanceError> {
        let span = tracing::Span::current();

        let Some(caller) = caller else {
            reject(IssuanceStage::Unauthenticated, "no authenticated caller");
            return Err(IssuanceError::Unauthenticated);
        };
        span.record("caller", caller.subject());
        span.record("caller_kind", caller.kind());
        advance(IssuanceStage::Authenticated);

        let validated = request.validate().map_err(|err| {
            reject(IssuanceStage::Authenticated, &err.to_string());
            IssuanceError::from(err)
        })?;
        span.record("owner_id", validated.owner_id().as_str());
        advance(IssuanceStage::Validated);

        self.ledger
            .upsert_owner(
                validated.owner_id(),
                validated.first_name(),
                validated.last_name(),
            )
            .await
            .map_err(|err| {
                reject(IssuanceStage::Validated, &err.to_string());
                IssuanceError::from(err)
            })?;
        advance(IssuanceStage::OwnerEnsured);

        let ticket = match self.ledger.issue_ticket(validated.owner_id()).await {
            Ok(ticket) => ticket,
            Err(err) => {
                let err = IssuanceError::from(err);
                if matches!(err, IssuanceError::QuotaExceeded { .. }) {
                    advance(IssuanceStage::QuotaExceeded);
                } else {
                    reject(IssuanceStage::OwnerEnsured, &err.to_string());
                }
                return Err(err);
            }
        };
        span.record("ticket_id", tracing::field::display(ticket.id));
        advance(IssuanceStage::TicketIssued);

        let ticket_url = self.links.ticket_url(ticket.id);
        let qr_png_base64 = self.renderer.render_base64(&ticket_url).map_err(|err| {
            reject(IssuanceStage::TicketIssued, &err.to_string());
            IssuanceError::from(err)
        })?;
        advance(IssuanceStage::Rendered);

        Ok(IssuedTicket {
            ticket,
            ticket_url,
            qr_png_base64,
        })
    }
}

fn advance(stage: IssuanceStage) {
    tracing::debug!(stage = %stage, "Issuance stage reached");
}

fn reject(from: IssuanceStage, reason: &str) {
    tracing::info!(
        from = %from,
        stage = %IssuanceStage::Rejected,
        reason,
        "Issuance rejected"
    );
}

#[cfg(all(test, feature = "test-utils"))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mocks::MockTicketLedger;
    use crate::types::{CitizenId, MAX_TICKETS_PER_OWNER};
    use base64::Engine as _;

    fn workflow(ledger: &Arc<MockTicketLedger>) -> IssuanceWorkflow {
        IssuanceWorkflow::new(
            Arc::clone(ledger) as Arc<dyn TicketLedger>,
            TicketLinks::new("https://tickets.example.com"),
        )
    }

    fn machine() -> Caller {
        Caller::machine("backend@clients")
    }

    #[tokio::test]
    async fn issues_ticket_with_qr_of_canonical_url() {
        let ledger = Arc::new(MockTicketLedger::new());
        let workflow = workflow(&ledger);
        let request = TicketRequest::new("12345678901", "Ana", "Horvat");

        let issued = workflow.issue(Some(&machine()), &request).await.unwrap();

        assert_eq!(
            issued.ticket_url,
            format!("https://tickets.example.com/ticket/{}", issued.ticket.id)
        );
        let png = base64::engine::general_purpose::STANDARD
            .decode(&issued.qr_png_base64)
            .unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(ledger.ticket_count(), 1);
    }

    #[tokio::test]
    async fn missing_caller_is_rejected_before_storage() {
        let ledger = Arc::new(MockTicketLedger::new());
        let request = TicketRequest::new("1", "Ana", "Horvat");

        let err = workflow(&ledger).issue(None, &request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(ledger.owner_count(), 0);
    }

    #[tokio::test]
    async fn empty_first_name_creates_nothing() {
        let ledger = Arc::new(MockTicketLedger::new());
        let request = TicketRequest::new("12345678901", "", "Horvat");

        let err = workflow(&ledger)
            .issue(Some(&machine()), &request)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(ledger.owner_count(), 0);
        assert_eq!(ledger.ticket_count(), 0);
    }

    #[tokio::test]
    async fn fourth_ticket_exceeds_quota() {
        let ledger = Arc::new(MockTicketLedger::new());
        let workflow = workflow(&ledger);
        let request = TicketRequest::new("12345678901", "Ana", "Horvat");

        let mut ids = Vec::new();
        for _ in 0..MAX_TICKETS_PER_OWNER {
            ids.push(workflow.issue(Some(&machine()), &request).await.unwrap().ticket.id);
        }
        ids.sort_by_key(ToString::to_string);
        ids.dedup();
        assert_eq!(ids.len(), 3);

        let err = workflow.issue(Some(&machine()), &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);

        let owner = CitizenId::new("12345678901");
        assert_eq!(ledger.tickets_for_owner(&owner).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn later_requests_keep_first_names() {
        let ledger = Arc::new(MockTicketLedger::new());
        let workflow = workflow(&ledger);

        let first = workflow
            .issue(Some(&machine()), &TicketRequest::new("42", "Ana", "Horvat"))
            .await
            .unwrap();
        workflow
            .issue(Some(&machine()), &TicketRequest::new("42", "Ivo", "Ivić"))
            .await
            .unwrap();

        let details = ledger.get_ticket(first.ticket.id).await.unwrap();
        assert_eq!(details.owner.first_name, "Ana");
        assert_eq!(details.owner.last_name, "Horvat");
    }

    #[tokio::test]
    async fn unavailable_store_is_a_retryable_storage_error() {
        let ledger = Arc::new(MockTicketLedger::new());
        ledger.set_unavailable(true);

        let err = workflow(&ledger)
            .issue(Some(&machine()), &TicketRequest::new("1", "Ana", "Horvat"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn qr_payload_resolves_to_the_owner() {
        let ledger = Arc::new(MockTicketLedger::new());
        let workflow = workflow(&ledger);

        let issued = workflow
            .issue(
                Some(&Caller::user("auth0|1", None)),
                &TicketRequest::new("00099", "Ana", "Horvat"),
            )
            .await
            .unwrap();

        let id = workflow.links().parse_ticket_url(&issued.ticket_url).unwrap();
        let details = ledger.get_ticket(id).await.unwrap();
        assert_eq!(details.owner.id.as_str(), "00099");
        assert_eq!(details.owner.full_name(), "Ana Horvat");
    }
}
