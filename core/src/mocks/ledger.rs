//! Mock ticket ledger.

use crate::error::LedgerError;
use crate::ledger::{LedgerFuture, TicketLedger};
use crate::types::{CitizenId, MAX_TICKETS_PER_OWNER, Owner, Ticket, TicketDetails, TicketId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    owners: HashMap<CitizenId, Owner>,
    tickets: HashMap<TicketId, Ticket>,
    last_created_at: Option<DateTime<Utc>>,
}

impl State {
    fn owner_ticket_count(&self, owner_id: &CitizenId) -> usize {
        self.tickets
            .values()
            .filter(|ticket| &ticket.owner_id == owner_id)
            .count()
    }

    // Strictly increasing, so ordering by creation time is deterministic.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

/// In-memory [`TicketLedger`].
///
/// The quota check and the insert happen under a single lock, matching the
/// row-lock semantics of the Postgres ledger. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockTicketLedger {
    state: Arc<Mutex<State>>,
    unavailable: Arc<AtomicBool>,
}

impl MockTicketLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`LedgerError::Storage`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored owners.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.state().owners.len()
    }

    /// Number of stored tickets.
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.state().tickets.len()
    }

    /// Stored owner, if any.
    #[must_use]
    pub fn owner(&self, id: &CitizenId) -> Option<Owner> {
        self.state().owners.get(id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::Storage("mock ledger unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl TicketLedger for MockTicketLedger {
    fn upsert_owner<'a>(
        &'a self,
        id: &'a CitizenId,
        first_name: &'a str,
        last_name: &'a str,
    ) -> LedgerFuture<'a, Owner> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state();
            let owner = state.owners.entry(id.clone()).or_insert_with(|| Owner {
                id: id.clone(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
            });
            Ok(owner.clone())
        })
    }

    fn issue_ticket<'a>(&'a self, owner_id: &'a CitizenId) -> LedgerFuture<'a, Ticket> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state();

            if !state.owners.contains_key(owner_id) {
                return Err(LedgerError::OwnerNotFound(owner_id.clone()));
            }

            let held = state.owner_ticket_count(owner_id);
            if held >= MAX_TICKETS_PER_OWNER as usize {
                return Err(LedgerError::QuotaExceeded {
                    owner_id: owner_id.clone(),
                    limit: MAX_TICKETS_PER_OWNER,
                });
            }

            let ticket = Ticket {
                id: TicketId::new(),
                created_at: state.next_timestamp(),
                owner_id: owner_id.clone(),
            };
            state.tickets.insert(ticket.id, ticket.clone());
            Ok(ticket)
        })
    }

    fn get_ticket(&self, ticket_id: TicketId) -> LedgerFuture<'_, TicketDetails> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state();

            let ticket = state
                .tickets
                .get(&ticket_id)
                .cloned()
                .ok_or(LedgerError::TicketNotFound(ticket_id))?;
            let owner = state
                .owners
                .get(&ticket.owner_id)
                .cloned()
                .ok_or_else(|| LedgerError::OwnerNotFound(ticket.owner_id.clone()))?;

            Ok(TicketDetails { ticket, owner })
        })
    }

    fn count_tickets(&self) -> LedgerFuture<'_, u64> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.state().tickets.len() as u64)
        })
    }

    fn tickets_for_owner<'a>(&'a self, owner_id: &'a CitizenId) -> LedgerFuture<'a, Vec<Ticket>> {
        Box::pin(async move {
            self.check_available()?;
            let mut tickets: Vec<Ticket> = self
                .state()
                .tickets
                .values()
                .filter(|ticket| &ticket.owner_id == owner_id)
                .cloned()
                .collect();
            tickets.sort_by_key(|ticket| ticket.created_at);
            Ok(tickets)
        })
    }

    fn ping(&self) -> LedgerFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }
}
