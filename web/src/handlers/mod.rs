//! Shared HTTP handlers.

pub mod data;
pub mod health;

pub use data::{DataPayload, data_handler};
pub use health::{health_check, readiness_check};
