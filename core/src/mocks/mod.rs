//! In-memory implementations for tests and local development.
//!
//! Enabled by the `test-utils` feature (on by default).

mod ledger;

pub use ledger::MockTicketLedger;
