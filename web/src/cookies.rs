//! `Set-Cookie` builders.

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;

/// Attributes shared by the cookies this service sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOptions {
    /// Add the `Secure` attribute (HTTPS deployments).
    pub secure: bool,
}

impl CookieOptions {
    /// `HttpOnly; SameSite=Lax; Path=/` plus `Secure` when requested.
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// A cookie that expires after `max_age_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` or `value` contain bytes not allowed in a
    /// header value.
    pub fn set(
        &self,
        name: &str,
        value: &str,
        max_age_secs: i64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{name}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax{}",
            self.secure_suffix()
        ))
    }

    /// A cookie that removes `name` from the browser.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` contains bytes not allowed in a header value.
    pub fn clear(&self, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!(
            "{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax{}",
            self.secure_suffix()
        ))
    }

    const fn secure_suffix(&self) -> &'static str {
        if self.secure { "; Secure" } else { "" }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_cookie_attributes() {
        let value = CookieOptions::new(true).set("qrt_session", "abc", 3600).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "qrt_session=abc; Path=/; Max-Age=3600; HttpOnly; SameSite=Lax; Secure"
        );
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let value = CookieOptions::new(false).clear("qrt_login").unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "qrt_login=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
        );
    }
}
