//! Domain types: owners, tickets, ticket requests and callers.

use crate::error::{FieldProblem, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum number of tickets a single owner may hold.
pub const MAX_TICKETS_PER_OWNER: u32 = 3;

/// Maximum length (in characters) of the identifier and name fields.
///
/// Matches the `VARCHAR(100)` columns of the `owner` table.
pub const MAX_FIELD_LENGTH: usize = 100;

/// Citizen identifier (OIB / VATIN) of a ticket owner.
///
/// Treated as an opaque string: it is never parsed as a number, so leading
/// zeros survive every round trip through the system.
///
/// # Examples
///
/// ```
/// use qr_tickets_core::CitizenId;
///
/// let id: CitizenId = " 00123 ".parse().unwrap();
/// assert_eq!(id.as_str(), "00123");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitizenId(String);

impl CitizenId {
    /// Wrap an identifier without validation (trusted input, e.g. database rows).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CitizenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CitizenId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut error = ValidationError::default();
        let value = check_field(&mut error, "id", Some(s));
        error.into_result().map(|()| Self(value))
    }
}

/// Unique identifier of an issued ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Generate a fresh random ticket id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TicketId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A ticket owner.
///
/// Created on the first ticket request for an unseen identifier. The first
/// writer's names are kept; later requests never overwrite them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// Citizen identifier (primary key).
    pub id: CitizenId,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
}

impl Owner {
    /// "First Last".
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// An issued ticket. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Generated ticket id.
    pub id: TicketId,
    /// Creation timestamp assigned by the store.
    pub created_at: DateTime<Utc>,
    /// Owner this ticket belongs to.
    pub owner_id: CitizenId,
}

/// A ticket joined with its owner, for the detail view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetails {
    /// The ticket.
    pub ticket: Ticket,
    /// The ticket's owner.
    pub owner: Owner,
}

/// Raw ticket request as submitted by a form or API client.
///
/// Every field is optional at the wire level so that a missing field becomes
/// a [`ValidationError`] rather than a deserialization failure. The HTML
/// form field names `OIB` and `vatin` are accepted for the identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    /// Citizen identifier.
    #[serde(default, alias = "OIB", alias = "vatin", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// First name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl TicketRequest {
    /// Build a request with all fields present.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
        }
    }

    /// Check that every field is present, non-blank and within length limits.
    ///
    /// Surrounding whitespace is trimmed; inner content (including leading
    /// zeros of the identifier) is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] listing every offending field.
    pub fn validate(&self) -> Result<ValidatedTicketRequest, ValidationError> {
        let mut error = ValidationError::default();

        let id = check_field(&mut error, "id", self.id.as_deref());
        let first_name = check_field(&mut error, "firstName", self.first_name.as_deref());
        let last_name = check_field(&mut error, "lastName", self.last_name.as_deref());

        error.into_result().map(|()| ValidatedTicketRequest {
            owner_id: CitizenId(id),
            first_name,
            last_name,
        })
    }
}

fn check_field(error: &mut ValidationError, field: &'static str, value: Option<&str>) -> String {
    let value = value.map(str::trim).unwrap_or_default();

    if value.is_empty() {
        error.push(field, FieldProblem::Missing);
    } else if value.chars().count() > MAX_FIELD_LENGTH {
        error.push(field, FieldProblem::TooLong { max: MAX_FIELD_LENGTH });
    }

    value.to_string()
}

/// A ticket request that passed validation.
///
/// Only obtainable through [`TicketRequest::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedTicketRequest {
    owner_id: CitizenId,
    first_name: String,
    last_name: String,
}

impl ValidatedTicketRequest {
    /// Owner's citizen identifier.
    #[must_use]
    pub const fn owner_id(&self) -> &CitizenId {
        &self.owner_id
    }

    /// Owner's first name.
    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    /// Owner's last name.
    #[must_use]
    pub fn last_name(&self) -> &str {
        &self.last_name
    }
}

/// An authenticated principal, produced by the HTTP layer's auth gate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Caller {
    /// Backend client holding a verified client-credentials token.
    Machine {
        /// Token subject (usually `<client_id>@clients`).
        subject: String,
    },
    /// End user with an active session.
    User {
        /// Identity-provider subject.
        subject: String,
        /// Display name, if the provider returned one.
        name: Option<String>,
    },
}

impl Caller {
    /// Machine caller with the given subject.
    #[must_use]
    pub fn machine(subject: impl Into<String>) -> Self {
        Self::Machine {
            subject: subject.into(),
        }
    }

    /// User caller with the given subject and optional display name.
    #[must_use]
    pub fn user(subject: impl Into<String>, name: Option<String>) -> Self {
        Self::User {
            subject: subject.into(),
            name,
        }
    }

    /// Subject of the principal.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Machine { subject } | Self::User { subject, .. } => subject,
        }
    }

    /// `"machine"` or `"user"`, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Machine { .. } => "machine",
            Self::User { .. } => "user",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn validate_accepts_complete_request() {
        let request = TicketRequest::new("12345678901", " Ana ", "Horvat");
        let validated = request.validate().expect("valid request");

        assert_eq!(validated.owner_id().as_str(), "12345678901");
        assert_eq!(validated.first_name(), "Ana");
        assert_eq!(validated.last_name(), "Horvat");
    }

    #[test]
    fn validate_reports_every_missing_field() {
        let request = TicketRequest {
            id: Some("123".to_string()),
            first_name: Some("   ".to_string()),
            last_name: None,
        };

        let error = request.validate().unwrap_err();
        assert_eq!(error.fields(), vec!["firstName", "lastName"]);
    }

    #[test]
    fn validate_rejects_overlong_names() {
        let request = TicketRequest::new("1", "x".repeat(MAX_FIELD_LENGTH + 1), "Horvat");

        let error = request.validate().unwrap_err();
        assert_eq!(error.fields(), vec!["firstName"]);
        assert!(error.to_string().contains("100"));
    }

    #[test]
    fn leading_zeros_are_preserved() {
        let validated = TicketRequest::new("00012345678", "Ana", "Horvat")
            .validate()
            .unwrap();
        assert_eq!(validated.owner_id().as_str(), "00012345678");
    }

    #[test]
    fn request_accepts_original_form_field_names() {
        let request: TicketRequest =
            serde_json::from_str(r#"{"OIB":"0042","firstName":"Ana","lastName":"Horvat"}"#)
                .unwrap();
        assert_eq!(request.id.as_deref(), Some("0042"));
        assert_eq!(request.first_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn missing_json_fields_deserialize_as_none() {
        let request: TicketRequest = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert!(request.first_name.is_none());
        assert!(request.validate().is_err());
    }

    #[test]
    fn ticket_id_parses_its_display_form() {
        let id = TicketId::new();
        let parsed: TicketId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TicketId>().is_err());
    }

    #[test]
    fn caller_exposes_subject_and_kind() {
        let user = Caller::user("auth0|42", Some("Ana".to_string()));
        assert_eq!(user.subject(), "auth0|42");
        assert_eq!(user.kind(), "user");
        assert_eq!(Caller::machine("svc@clients").kind(), "machine");
    }

    proptest! {
        #[test]
        fn digit_identifiers_survive_validation(id in "[0-9]{1,20}") {
            let validated = TicketRequest::new(id.clone(), "Ana", "Horvat").validate().unwrap();
            prop_assert_eq!(validated.owner_id().as_str(), id.as_str());
        }
    }
}
