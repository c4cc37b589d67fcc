//! Custom Axum extractors.
//!
//! - `CorrelationId`: the request's correlation id (from the middleware,
//!   the `X-Correlation-ID` header, or freshly generated)
//! - `BearerToken`: the token in an `Authorization: Bearer` header
//! - `Cookies`: request cookies by name
//! - `WantsHtml`: whether the client prefers an HTML response
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     correlation_id: CorrelationId,
//!     bearer: Option<BearerToken>,
//!     cookies: Cookies,
//! ) -> Result<Json<Response>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, "Processing request");
//!     Ok(Json(response))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::{CORRELATION_ID_HEADER, CorrelationIdExt};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use std::collections::HashMap;
use std::convert::Infallible;
use uuid::Uuid;

/// Correlation ID for request tracing.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.correlation_id() {
            return Ok(Self(id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Bearer token from the `Authorization` header.
///
/// Rejects with `401 AUTH_ERROR` when the header is missing or not a bearer
/// credential. Use `Option<BearerToken>` for endpoints that accept other
/// credentials too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    /// Parse the token out of request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();

        if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
            Some(Self(token.to_string()))
        } else {
            None
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// Request cookies by name.
///
/// The first occurrence wins when a name repeats.
#[derive(Debug, Clone, Default)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    /// Parse every `Cookie` header.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();

        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for pair in value.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=') {
                    cookies
                        .entry(name.trim().to_string())
                        .or_insert_with(|| value.trim().to_string());
                }
            }
        }

        Self(cookies)
    }

    /// Value of the named cookie.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Cookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Whether the client asked for HTML.
///
/// True when the `Accept` header mentions `text/html`. API clients sending
/// `application/json` or no `Accept` header get JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WantsHtml(pub bool);

#[async_trait]
impl<S> FromRequestParts<S> for WantsHtml
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let wants_html = parts
            .headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("text/html"));

        Ok(Self(wants_html))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(Request::builder().header(CORRELATION_ID_HEADER, uuid.to_string()));

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_generates_new() {
        let mut parts = parts(Request::builder());

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_ne!(correlation_id.0, Uuid::nil());
    }

    #[tokio::test]
    async fn bearer_token_is_extracted() {
        let mut parts = parts(Request::builder().header("Authorization", "Bearer abc.def"));

        let token = BearerToken::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(token, BearerToken("abc.def".to_string()));
    }

    #[tokio::test]
    async fn non_bearer_credentials_are_rejected() {
        let mut basic = parts(Request::builder().header("Authorization", "Basic dXNlcjpwdw=="));
        let mut missing = parts(Request::builder());
        let mut empty = parts(Request::builder().header("Authorization", "Bearer "));

        for parts in [&mut basic, &mut missing, &mut empty] {
            let err = BearerToken::from_request_parts(parts, &()).await.unwrap_err();
            assert_eq!(err.code(), "AUTH_ERROR");
        }
    }

    #[tokio::test]
    async fn cookies_are_parsed_by_name() {
        let mut parts = parts(
            Request::builder()
                .header("Cookie", "qrt_session=abc; theme=dark")
                .header("Cookie", "qrt_session=later; other=1"),
        );

        let cookies = Cookies::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(cookies.get("qrt_session"), Some("abc"));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.get("other"), Some("1"));
        assert_eq!(cookies.get("missing"), None);
    }

    #[tokio::test]
    async fn html_preference_follows_accept_header() {
        let mut browser = parts(
            Request::builder().header("Accept", "text/html,application/xhtml+xml;q=0.9"),
        );
        let mut api = parts(Request::builder().header("Accept", "application/json"));
        let mut none = parts(Request::builder());

        assert!(WantsHtml::from_request_parts(&mut browser, &()).await.unwrap().0);
        assert!(!WantsHtml::from_request_parts(&mut api, &()).await.unwrap().0);
        assert!(!WantsHtml::from_request_parts(&mut none, &()).await.unwrap().0);
    }
}
