//! Mock identity provider.

use crate::error::{AuthError, Result};
use crate::providers::{
    ClientCredentialsProvider, MachineToken, OAuth2Provider, OAuthTokenResponse, OAuthUserInfo,
    TokenClaims, TokenVerifier,
};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Issuer URL used in URLs produced by the mock.
pub const MOCK_ISSUER: &str = "https://idp.test";

/// Subject of machine tokens handed out by the mock.
pub const MOCK_MACHINE_SUBJECT: &str = "mock-client@clients";

#[derive(Debug)]
struct MockState {
    codes: HashMap<String, OAuthUserInfo>,
    access_tokens: HashMap<String, OAuthUserInfo>,
    bearer_tokens: HashMap<String, TokenClaims>,
    token_requests: usize,
    fail_token_requests: bool,
    token_lifetime: Duration,
}

/// Mock identity provider implementing every provider trait.
///
/// - Authorization codes registered with [`with_user`](Self::with_user)
///   exchange to an access token that resolves to that user.
/// - Bearer tokens registered with [`with_bearer_token`](Self::with_bearer_token),
///   and every machine token it issues, verify successfully.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockIdentityProvider {
    /// Create an empty mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                codes: HashMap::new(),
                access_tokens: HashMap::new(),
                bearer_tokens: HashMap::new(),
                token_requests: 0,
                fail_token_requests: false,
                token_lifetime: Duration::hours(1),
            })),
        }
    }

    /// Accept `code` as an authorization code for `user`.
    #[must_use]
    pub fn with_user(self, code: &str, user: OAuthUserInfo) -> Self {
        self.lock().codes.insert(code.to_string(), user);
        self
    }

    /// Accept `token` as a valid bearer token for `subject`.
    #[must_use]
    pub fn with_bearer_token(self, token: &str, subject: &str) -> Self {
        let claims = TokenClaims {
            subject: subject.to_string(),
            client_id: None,
            scopes: Vec::new(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        self.lock().bearer_tokens.insert(token.to_string(), claims);
        self
    }

    /// Lifetime of issued machine tokens.
    #[must_use]
    pub fn with_token_lifetime(self, lifetime: Duration) -> Self {
        self.lock().token_lifetime = lifetime;
        self
    }

    /// Make machine token requests fail.
    pub fn fail_token_requests(&self, fail: bool) {
        self.lock().fail_token_requests = fail;
    }

    /// Number of machine token requests served.
    #[must_use]
    pub fn token_requests(&self) -> usize {
        self.lock().token_requests
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuth2Provider for MockIdentityProvider {
    fn authorization_url(&self, state: &str, nonce: &str, redirect_uri: &str) -> Result<String> {
        let query = serde_urlencoded::to_string([
            ("redirect_uri", redirect_uri),
            ("state", state),
            ("nonce", nonce),
        ])
        .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(format!("{MOCK_ISSUER}/authorize?{query}"))
    }

    fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> impl Future<Output = Result<OAuthTokenResponse>> + Send {
        let result = {
            let mut state = self.lock();
            match state.codes.get(code).cloned() {
                Some(user) => {
                    let access_token = format!("user-token-{code}");
                    state.access_tokens.insert(access_token.clone(), user);
                    Ok(OAuthTokenResponse {
                        access_token,
                        id_token: None,
                        expires_at: Some(Utc::now() + Duration::hours(1)),
                    })
                }
                None => Err(AuthError::TokenExchangeFailed(
                    "unknown authorization code".to_string(),
                )),
            }
        };

        async move { result }
    }

    fn fetch_user_info(
        &self,
        access_token: &str,
    ) -> impl Future<Output = Result<OAuthUserInfo>> + Send {
        let result = self
            .lock()
            .access_tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| AuthError::UserInfoFailed("unknown access token".to_string()));

        async move { result }
    }

    fn logout_url(&self, return_to: &str) -> Result<String> {
        let query = serde_urlencoded::to_string([("returnTo", return_to)])
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(format!("{MOCK_ISSUER}/v2/logout?{query}"))
    }
}

impl ClientCredentialsProvider for MockIdentityProvider {
    fn request_token(&self) -> impl Future<Output = Result<MachineToken>> + Send {
        let result = {
            let mut state = self.lock();
            if state.fail_token_requests {
                Err(AuthError::TokenRequestFailed("mock refused".to_string()))
            } else {
                state.token_requests += 1;
                let token = MachineToken {
                    access_token: format!("machine-token-{}", state.token_requests),
                    token_type: "Bearer".to_string(),
                    expires_at: Utc::now() + state.token_lifetime,
                };
                state.bearer_tokens.insert(
                    token.access_token.clone(),
                    TokenClaims {
                        subject: MOCK_MACHINE_SUBJECT.to_string(),
                        client_id: Some("mock-client".to_string()),
                        scopes: Vec::new(),
                        expires_at: token.expires_at,
                    },
                );
                Ok(token)
            }
        };

        async move { result }
    }
}

impl TokenVerifier for MockIdentityProvider {
    fn verify(&self, token: &str) -> impl Future<Output = Result<TokenClaims>> + Send {
        let result = match self.lock().bearer_tokens.get(token) {
            Some(claims) if claims.expires_at > Utc::now() => Ok(claims.clone()),
            Some(_) => Err(AuthError::InvalidToken("token has expired".to_string())),
            None => Err(AuthError::InvalidToken("unknown token".to_string())),
        };

        async move { result }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn code_exchange_resolves_to_registered_user() {
        let provider = MockIdentityProvider::new().with_user(
            "code-1",
            OAuthUserInfo {
                sub: "auth0|1".to_string(),
                name: Some("Ana".to_string()),
                email: None,
            },
        );

        let tokens = provider.exchange_code("code-1", "/callback").await.unwrap();
        let user = provider.fetch_user_info(&tokens.access_token).await.unwrap();

        assert_eq!(user.sub, "auth0|1");
        assert!(provider.exchange_code("other", "/callback").await.is_err());
    }

    #[tokio::test]
    async fn issued_machine_tokens_verify() {
        let provider = MockIdentityProvider::new();

        let token = provider.request_token().await.unwrap();
        let claims = provider.verify(&token.access_token).await.unwrap();

        assert_eq!(claims.subject, MOCK_MACHINE_SUBJECT);
        assert!(provider.verify("forged").await.is_err());
    }
}
