//! Sign-in, sign-out and caller resolution.
//!
//! Users sign in with the authorization-code flow:
//!
//! 1. `GET /login` seals a [`LoginState`] into a short-lived cookie and
//!    redirects to the provider.
//! 2. `GET /callback` checks `state` (and the ID token `nonce`), exchanges the
//!    code, fetches the profile and sets the session cookie.
//! 3. `GET /logout` clears the session and redirects to the provider's logout.
//!
//! Machines send `Authorization: Bearer <token>` and are verified per request.

use crate::state::{AppState, IdentityProvider};
use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{LOCATION, SET_COOKIE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use qr_tickets_auth::providers::decode_id_token_claims;
use qr_tickets_auth::session::{LOGIN_STATE_COOKIE, LOGIN_STATE_TTL_MINUTES, SESSION_COOKIE};
use qr_tickets_auth::{AuthError, LoginState, UserSession};
use qr_tickets_core::Caller;
use qr_tickets_web::{AppError, BearerToken, Cookies, WebResult};
use serde::Deserialize;

/// A signed-in user, read from the session cookie.
///
/// Rejects with a redirect to `/login?returnTo=<current path>`.
#[derive(Debug, Clone)]
pub struct SessionUser(pub UserSession);

#[async_trait]
impl<P: IdentityProvider> FromRequestParts<AppState<P>> for SessionUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<P>,
    ) -> Result<Self, Self::Rejection> {
        match session_from_headers(state, &parts.headers) {
            Ok(session) => Ok(Self(session)),
            Err(err) => {
                tracing::debug!(reason = %err, "No usable session");
                let return_to = parts
                    .uri
                    .path_and_query()
                    .map_or("/", |pq| pq.as_str())
                    .to_string();
                Err(LoginRedirect { return_to })
            }
        }
    }
}

/// Redirect to the sign-in page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    /// Local path to come back to after sign-in.
    pub return_to: String,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        let query = serde_urlencoded::to_string([("returnTo", self.return_to.as_str())])
            .unwrap_or_default();
        redirect(&format!("/login?{query}"), Vec::new()).into_response()
    }
}

fn session_from_headers<P>(
    state: &AppState<P>,
    headers: &HeaderMap,
) -> Result<UserSession, AuthError> {
    let cookies = Cookies::from_headers(headers);
    let value = cookies.get(SESSION_COOKIE).ok_or(AuthError::SessionMissing)?;
    state.sessions.open_session(value)
}

/// Work out who is calling.
///
/// A bearer token takes precedence and must verify; otherwise a valid session
/// cookie identifies a user. `Ok(None)` means anonymous.
///
/// # Errors
///
/// [`AppError`] 401 when a bearer token is present but rejected.
pub async fn resolve_caller<P: IdentityProvider>(
    state: &AppState<P>,
    headers: &HeaderMap,
) -> WebResult<Option<Caller>> {
    if let Some(BearerToken(token)) = BearerToken::from_headers(headers) {
        let claims = state.provider.verify(&token).await.map_err(|err| {
            tracing::info!(error = %err, "Bearer token rejected");
            AppError::from(err)
        })?;
        return Ok(Some(Caller::machine(claims.subject)));
    }

    match session_from_headers(state, headers) {
        Ok(session) => Ok(Some(Caller::user(session.subject, session.name))),
        Err(AuthError::SessionMissing) => Ok(None),
        Err(err) => {
            tracing::debug!(reason = %err, "Ignoring unusable session cookie");
            Ok(None)
        }
    }
}

/// Query string of `GET /login`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams {
    /// Local path to return to after sign-in.
    pub return_to: Option<String>,
}

/// `GET /login`
///
/// # Errors
///
/// 500 if the login state cannot be sealed or the authorize URL built.
pub async fn login<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    Query(params): Query<LoginParams>,
) -> WebResult<Response> {
    let login_state = LoginState::new(params.return_to.as_deref());
    let sealed = state.sessions.seal_login_state(&login_state)?;
    let authorize_url =
        state
            .provider
            .authorization_url(&login_state.state, &login_state.nonce, &state.callback_url)?;

    let cookie = state
        .cookies
        .set(LOGIN_STATE_COOKIE, &sealed, LOGIN_STATE_TTL_MINUTES * 60)
        .map_err(|e| AppError::internal("Could not start sign-in").with_source(e.into()))?;

    tracing::info!(return_to = %login_state.return_to, "Redirecting to identity provider");
    redirect(&authorize_url, vec![cookie])
}

/// Query string of `GET /callback`.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code.
    pub code: Option<String>,
    /// CSRF state echoed by the provider.
    pub state: Option<String>,
    /// Provider error code, when sign-in failed.
    pub error: Option<String>,
    /// Provider error description.
    pub error_description: Option<String>,
}

/// `GET /callback`
///
/// # Errors
///
/// - 400 on a provider error, a missing code, or a state/nonce mismatch
/// - 500 when the code exchange or profile request fails
pub async fn callback<P: IdentityProvider>(
    State(state): State<AppState<P>>,
    Query(params): Query<CallbackParams>,
    cookies: Cookies,
) -> WebResult<Response> {
    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        return Err(AuthError::AuthorizationDenied(format!("{error}: {description}")).into());
    }

    let login_state = cookies
        .get(LOGIN_STATE_COOKIE)
        .ok_or(AuthError::OAuthStateInvalid)
        .and_then(|value| state.sessions.open_login_state(value))?;
    login_state.verify(params.state.as_deref().unwrap_or_default())?;

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("Missing authorization code"))?;

    let tokens = state.provider.exchange_code(&code, &state.callback_url).await?;

    if let Some(id_token) = &tokens.id_token {
        let claims = decode_id_token_claims(id_token)?;
        if claims.nonce.as_deref() != Some(login_state.nonce.as_str()) {
            tracing::warn!(sub = %claims.sub, "ID token nonce mismatch");
            return Err(AuthError::OAuthStateInvalid.into());
        }
    }

    let user = state.provider.fetch_user_info(&tokens.access_token).await?;
    let session = UserSession::new(user.sub, user.name, user.email, state.session_ttl);
    let sealed = state.sessions.seal_session(&session)?;

    let session_cookie = state
        .cookies
        .set(SESSION_COOKIE, &sealed, state.session_ttl.num_seconds())
        .map_err(|e| AppError::internal("Could not complete sign-in").with_source(e.into()))?;
    let clear_login = state
        .cookies
        .clear(LOGIN_STATE_COOKIE)
        .map_err(|e| AppError::internal("Could not complete sign-in").with_source(e.into()))?;

    tracing::info!(subject = %session.subject, "User signed in");
    metrics::counter!("auth.logins").increment(1);

    redirect(&login_state.return_to, vec![session_cookie, clear_login])
}

/// `GET /logout`
///
/// # Errors
///
/// 500 if the clearing cookie cannot be built.
pub async fn logout<P: IdentityProvider>(State(state): State<AppState<P>>) -> WebResult<Response> {
    let return_to = format!("{}/", state.links().base_url());
    let location = state.provider.logout_url(&return_to).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "No provider logout URL, returning home");
        "/".to_string()
    });

    let clear = state
        .cookies
        .clear(SESSION_COOKIE)
        .map_err(|e| AppError::internal("Could not sign out").with_source(e.into()))?;

    redirect(&location, vec![clear])
}

/// 302 to `location`, appending `cookies` as `Set-Cookie` headers.
fn redirect(location: &str, cookies: Vec<HeaderValue>) -> WebResult<Response> {
    let location = HeaderValue::from_str(location)
        .map_err(|e| AppError::internal("Invalid redirect target").with_source(e.into()))?;

    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(LOCATION, location);
    for cookie in cookies {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    Ok(response)
}
