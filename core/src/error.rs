//! Error taxonomy for ticket issuance.
//!
//! Each layer has its own error type:
//!
//! - [`ValidationError`]: a ticket request failed the input gate
//! - [`LedgerError`]: the ticket store refused or failed an operation
//! - [`EncodingError`]: the QR image could not be produced
//! - [`IssuanceError`]: what the workflow reports, classified by [`ErrorKind`]
//!
//! Driver and encoder detail is carried as text for logging only. The public
//! message of an [`IssuanceError`] never includes it.

use crate::types::{CitizenId, TicketId};
use std::fmt;
use thiserror::Error;

/// What was wrong with a single request field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldProblem {
    /// Absent or blank after trimming.
    Missing,
    /// Longer than the allowed number of characters.
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("is required"),
            Self::TooLong { max } => write!(f, "must be at most {max} characters"),
        }
    }
}

/// A ticket request that failed validation.
///
/// Lists every offending field, in request order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Error)]
pub struct ValidationError {
    violations: Vec<(&'static str, FieldProblem)>,
}

impl ValidationError {
    pub(crate) fn push(&mut self, field: &'static str, problem: FieldProblem) {
        self.violations.push((field, problem));
    }

    pub(crate) fn into_result(self) -> Result<(), Self> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Names of the offending fields (wire names, e.g. `firstName`).
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|(field, _)| *field).collect()
    }

    /// Field/problem pairs.
    #[must_use]
    pub fn violations(&self) -> &[(&'static str, FieldProblem)] {
        &self.violations
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid ticket request: ")?;
        for (i, (field, problem)) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field} {problem}")?;
        }
        Ok(())
    }
}

/// Errors returned by a [`TicketLedger`](crate::TicketLedger).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The owner referenced by a ticket does not exist.
    #[error("owner {0} not found")]
    OwnerNotFound(CitizenId),

    /// The owner already holds the maximum number of tickets.
    #[error("owner {owner_id} already holds {limit} tickets")]
    QuotaExceeded {
        /// Owner that hit the limit.
        owner_id: CitizenId,
        /// The limit in force.
        limit: u32,
    },

    /// No ticket with this id exists.
    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),

    /// Connectivity, timeout or constraint failure in the backing store.
    #[error("storage error: {0}")]
    Storage(String),
}

/// QR generation or rasterization failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("QR encoding failed: {0}")]
pub struct EncodingError(pub String);

/// Stable classification of an [`IssuanceError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input; do not retry.
    Validation,
    /// Owner is at the ticket limit; do not retry.
    QuotaExceeded,
    /// Caller must (re-)authenticate.
    Auth,
    /// Store failure; retry with backoff.
    Storage,
    /// QR rendering failure; fatal for the request.
    Encoding,
}

impl ErrorKind {
    /// Machine-readable code exposed in response bodies.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Auth => "AUTH_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Encoding => "ENCODING_ERROR",
        }
    }

    /// Whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Storage)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a ticket could not be issued.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IssuanceError {
    /// No authenticated caller was supplied.
    #[error("authentication required")]
    Unauthenticated,

    /// The request failed validation. Storage was not touched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The owner already holds the maximum number of tickets.
    #[error("owner {owner_id} already holds {limit} tickets")]
    QuotaExceeded {
        /// Owner that hit the limit.
        owner_id: CitizenId,
        /// The limit in force.
        limit: u32,
    },

    /// The ticket store failed.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The QR image could not be rendered.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl IssuanceError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Auth,
            Self::Validation(_) => ErrorKind::Validation,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Encoding(_) => ErrorKind::Encoding,
        }
    }

    /// Whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Message safe to show to clients.
    ///
    /// Validation and quota messages are specific; storage and encoding
    /// failures get a generic message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated => "Authentication required".to_string(),
            Self::Validation(err) => {
                let mut message = String::from("Invalid ticket request: ");
                for (i, (field, problem)) in err.violations().iter().enumerate() {
                    if i > 0 {
                        message.push_str("; ");
                    }
                    message.push_str(&format!("{field} {problem}"));
                }
                message
            }
            Self::QuotaExceeded { limit, .. } => {
                format!("This owner already holds the maximum of {limit} tickets")
            }
            Self::Storage(_) => "Ticket storage is temporarily unavailable".to_string(),
            Self::Encoding(_) => "Could not generate the ticket QR code".to_string(),
        }
    }
}

impl From<LedgerError> for IssuanceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::QuotaExceeded { owner_id, limit } => {
                Self::QuotaExceeded { owner_id, limit }
            }
            // An owner vanishing between upsert and issue, or a ticket lookup
            // miss, is a store inconsistency from the workflow's point of view.
            other @ (LedgerError::OwnerNotFound(_)
            | LedgerError::TicketNotFound(_)
            | LedgerError::Storage(_)) => Self::Storage(other.to_string()),
        }
    }
}
