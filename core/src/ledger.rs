//! The ticket ledger: persistent store of owners and tickets.
//!
//! The ledger is the only place the per-owner quota is enforced. Counting an
//! owner's tickets and inserting a new one must happen atomically, so that
//! concurrent requests for the same owner can never push it past
//! [`MAX_TICKETS_PER_OWNER`](crate::MAX_TICKETS_PER_OWNER).
//!
//! # Implementations
//!
//! - `PostgresTicketLedger` (in `qr-tickets-postgres`): row-locked transactions
//! - [`MockTicketLedger`](crate::mocks::MockTicketLedger) (`test-utils` feature): in-memory
//!
//! # Dyn Compatibility
//!
//! Methods return [`LedgerFuture`] rather than using `async fn`, so the ledger
//! can be shared as `Arc<dyn TicketLedger>` across handlers.

use crate::error::LedgerError;
use crate::types::{CitizenId, Owner, Ticket, TicketDetails, TicketId};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every [`TicketLedger`] method.
pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

/// Persistent store of owners and their tickets.
pub trait TicketLedger: Send + Sync {
    /// Insert the owner if absent, otherwise return the stored owner unchanged.
    ///
    /// Names of an existing owner are never overwritten.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] on connectivity or constraint failures.
    fn upsert_owner<'a>(
        &'a self,
        id: &'a CitizenId,
        first_name: &'a str,
        last_name: &'a str,
    ) -> LedgerFuture<'a, Owner>;

    /// Issue a new ticket for an existing owner.
    ///
    /// Atomically confirms the owner exists, counts its tickets, and inserts a
    /// ticket only if the count is below the quota. No ticket is written on
    /// failure.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::OwnerNotFound`]: unknown owner
    /// - [`LedgerError::QuotaExceeded`]: owner already at the limit
    /// - [`LedgerError::Storage`]: store failure or timeout
    fn issue_ticket<'a>(&'a self, owner_id: &'a CitizenId) -> LedgerFuture<'a, Ticket>;

    /// Look up a ticket joined with its owner.
    ///
    /// # Errors
    ///
    /// [`LedgerError::TicketNotFound`] if no such ticket exists,
    /// [`LedgerError::Storage`] on store failure.
    fn get_ticket(&self, ticket_id: TicketId) -> LedgerFuture<'_, TicketDetails>;

    /// Total number of tickets ever issued.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] on store failure.
    fn count_tickets(&self) -> LedgerFuture<'_, u64>;

    /// The owner's tickets, oldest first.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] on store failure.
    fn tickets_for_owner<'a>(&'a self, owner_id: &'a CitizenId) -> LedgerFuture<'a, Vec<Ticket>>;

    /// Cheap connectivity probe.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] if the store is unreachable.
    fn ping(&self) -> LedgerFuture<'_, ()>;
}
