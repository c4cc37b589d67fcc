//! Local JWT verification against the identity provider's JSON Web Key Set.
//!
//! Keys are fetched from the JWKS endpoint on first use and kept until a token
//! names a key id the cached set does not contain, at most once per
//! `MIN_REFRESH_INTERVAL`.

use crate::config::IdentityProviderConfig;
use crate::error::{AuthError, Result};
use crate::providers::TokenClaims;
use chrono::DateTime;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Minimum age of the cached key set before an unknown `kid` refetches it.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Signing keys of the identity provider.
#[derive(Debug)]
pub(crate) struct JwksCache {
    endpoint: String,
    cached: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    pub(crate) fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            cached: RwLock::new(None),
        }
    }

    /// Verify `token` with the key named in its header and decode its claims.
    ///
    /// Signature, algorithm and every check configured on `validation` must
    /// pass.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the token is malformed, names an
    /// unknown key, or fails validation, and [`AuthError::InternalError`] if
    /// the key set cannot be fetched.
    pub(crate) async fn verify<T: DeserializeOwned>(
        &self,
        client: &Client,
        token: &str,
        validation: &Validation,
    ) -> Result<T> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token header has no key id".to_string()))?;
        let key = self.decoding_key(client, &kid).await?;

        decode::<T>(token, &key, validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    async fn decoding_key(&self, client: &Client, kid: &str) -> Result<DecodingKey> {
        {
            let cached = self.cached.read().await;
            if let Some(cached) = cached.as_ref() {
                if let Some(key) = key_for(&cached.keys, kid) {
                    return key;
                }
                if cached.fetched_at.elapsed() < MIN_REFRESH_INTERVAL {
                    return Err(unknown_key(kid));
                }
            }
        }

        let keys = fetch(client, &self.endpoint).await?;
        let key = key_for(&keys, kid);
        *self.cached.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key.unwrap_or_else(|| Err(unknown_key(kid)))
    }

    #[cfg(test)]
    fn preloaded(endpoint: &str, keys: JwkSet) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            cached: RwLock::new(Some(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            })),
        }
    }
}

fn unknown_key(kid: &str) -> AuthError {
    AuthError::InvalidToken(format!("unknown signing key {kid}"))
}

fn key_for(keys: &JwkSet, kid: &str) -> Option<Result<DecodingKey>> {
    keys.find(kid).map(|jwk| {
        DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::InternalError(format!("Unusable signing key {kid}: {e}")))
    })
}

async fn fetch(client: &Client, endpoint: &str) -> Result<JwkSet> {
    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|e| AuthError::InternalError(format!("JWKS request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        tracing::error!(%status, endpoint, "JWKS endpoint refused request");
        return Err(AuthError::InternalError(format!(
            "JWKS endpoint returned {status}"
        )));
    }

    let keys: JwkSet = response
        .json()
        .await
        .map_err(|e| AuthError::InternalError(format!("JWKS response: {e}")))?;
    tracing::debug!(keys = keys.keys.len(), "Fetched signing keys");
    Ok(keys)
}

/// Checks for API access tokens: RS256, our issuer, our API audience, expiry.
pub(crate) fn access_token_validation(config: &IdentityProviderConfig) -> Validation {
    validation_for(config, &config.audience)
}

/// Checks for ID tokens: RS256, our issuer, our client id, expiry.
pub(crate) fn id_token_validation(config: &IdentityProviderConfig) -> Validation {
    validation_for(config, &config.client_id)
}

fn validation_for(config: &IdentityProviderConfig, audience: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(&config.issuer_aliases());
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation
}

/// Claims of an access token issued for the API.
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    exp: i64,
}

impl AccessTokenClaims {
    pub(crate) fn into_claims(self) -> Result<TokenClaims> {
        let expires_at = DateTime::from_timestamp(self.exp, 0)
            .ok_or_else(|| AuthError::InvalidToken("invalid expiry".to_string()))?;
        let client_id = self.azp.or(self.client_id);
        let subject = self
            .sub
            .or_else(|| client_id.clone())
            .ok_or_else(|| AuthError::InvalidToken("missing subject".to_string()))?;
        let scopes = match self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => self.permissions,
        };

        Ok(TokenClaims {
            subject,
            client_id,
            scopes,
            expires_at,
        })
    }
}
