//! Mock provider implementations for testing.
//!
//! In-memory stand-ins for the identity provider, for unit and handler tests.

pub mod provider;

pub use provider::MockIdentityProvider;
