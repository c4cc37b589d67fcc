//! Canonical ticket URLs.

use crate::types::TicketId;

/// Builds and parses the public URL of a ticket's detail page.
///
/// The base URL comes from configuration, never from request headers, so the
/// URL encoded in a QR code cannot be steered by a client.
///
/// ```
/// use qr_tickets_core::TicketLinks;
///
/// let links = TicketLinks::new("https://tickets.example.com/");
/// assert_eq!(links.base_url(), "https://tickets.example.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketLinks {
    base_url: String,
}

impl TicketLinks {
    /// Path prefix of the ticket detail route.
    pub const TICKET_PATH: &'static str = "/ticket/";

    /// Create from a public base URL. Trailing slashes are dropped.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    /// The normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/ticket/{id}`.
    #[must_use]
    pub fn ticket_url(&self, id: TicketId) -> String {
        format!("{}{}{id}", self.base_url, Self::TICKET_PATH)
    }

    /// Extract the ticket id from a URL produced by [`ticket_url`](Self::ticket_url).
    ///
    /// Returns `None` for URLs on another base or with a malformed id.
    #[must_use]
    pub fn parse_ticket_url(&self, url: &str) -> Option<TicketId> {
        let rest = url.trim().strip_prefix(&self.base_url)?;
        let id = rest.strip_prefix(Self::TICKET_PATH)?;
        let id = id.trim_end_matches('/');
        id.parse().ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builds_url_without_double_slash() {
        let links = TicketLinks::new("http://localhost:3000//");
        let id = TicketId::new();

        assert_eq!(
            links.ticket_url(id),
            format!("http://localhost:3000/ticket/{id}")
        );
    }

    #[test]
    fn parses_its_own_urls() {
        let links = TicketLinks::new("https://tickets.example.com");
        let id = TicketId::new();

        assert_eq!(links.parse_ticket_url(&links.ticket_url(id)), Some(id));
    }

    #[test]
    fn rejects_foreign_and_malformed_urls() {
        let links = TicketLinks::new("https://tickets.example.com");
        let id = TicketId::new();

        assert_eq!(
            links.parse_ticket_url(&format!("https://evil.example.com/ticket/{id}")),
            None
        );
        assert_eq!(
            links.parse_ticket_url("https://tickets.example.com/ticket/42"),
            None
        );
        assert_eq!(
            links.parse_ticket_url(&format!("https://tickets.example.com/other/{id}")),
            None
        );
    }
}
