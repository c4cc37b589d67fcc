//! # QR Tickets Core
//!
//! Domain types and the ticket-issuance workflow for QR Tickets.
//!
//! An **owner** (identified by an opaque citizen identifier) may hold at most
//! [`MAX_TICKETS_PER_OWNER`] **tickets**. Each issued ticket is handed back as a
//! QR code that encodes the canonical URL of its detail page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │  IssuanceWorkflow    │────▶│   dyn TicketLedger   │  ← Postgres / in-memory
//! │  auth → validate →   │     │  upsert / issue /    │
//! │  upsert → issue → QR │     │  get / count         │
//! └──────────────────────┘     └──────────────────────┘
//!            │
//!            ▼
//!      QrRenderer (PNG, base64)
//! ```
//!
//! The quota invariant lives in the ledger: `issue_ticket` must count and
//! insert atomically. The workflow only orchestrates.
//!
//! ## Example
//!
//! ```no_run
//! use qr_tickets_core::{Caller, IssuanceWorkflow, TicketLinks, TicketRequest};
//! use qr_tickets_core::mocks::MockTicketLedger;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let workflow = IssuanceWorkflow::new(
//!     Arc::new(MockTicketLedger::new()),
//!     TicketLinks::new("https://tickets.example.com"),
//! );
//!
//! let caller = Caller::machine("backend@clients");
//! let request = TicketRequest::new("12345678901", "Ana", "Horvat");
//! let issued = workflow.issue(Some(&caller), &request).await?;
//! println!("{}", issued.ticket_url);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod ledger;
pub mod links;
pub mod qr;
pub mod retry;
pub mod types;
pub mod workflow;

#[cfg(feature = "test-utils")]
pub mod mocks;

pub use error::{EncodingError, ErrorKind, IssuanceError, LedgerError, ValidationError};
pub use ledger::{LedgerFuture, TicketLedger};
pub use links::TicketLinks;
pub use qr::QrRenderer;
pub use types::{
    Caller, CitizenId, MAX_FIELD_LENGTH, MAX_TICKETS_PER_OWNER, Owner, Ticket, TicketDetails,
    TicketId, TicketRequest, ValidatedTicketRequest,
};
pub use workflow::{IssuanceStage, IssuanceWorkflow, IssuedTicket};
