//! Encrypted cookie sessions.
//!
//! Session state lives entirely in the cookie: the payload is serialized to
//! JSON, sealed with AES-256-GCM under a key derived from the configured
//! secret, and base64url-encoded. A cookie that was altered, sealed under a
//! different secret, or sealed for a different purpose fails to open.
//!
//! Two payloads are used:
//!
//! - [`UserSession`]: who is signed in, until when
//! - [`LoginState`]: CSRF `state`, `nonce` and return path for an in-flight
//!   sign-in, valid for a few minutes

use crate::error::{AuthError, Result};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Cookie carrying the [`UserSession`].
pub const SESSION_COOKIE: &str = "qrt_session";

/// Cookie carrying the [`LoginState`].
pub const LOGIN_STATE_COOKIE: &str = "qrt_login";

/// Minutes a sign-in may take before its state is rejected.
pub const LOGIN_STATE_TTL_MINUTES: i64 = 10;

const NONCE_LEN: usize = 12;
const SESSION_PURPOSE: &[u8] = b"session";
const LOGIN_PURPOSE: &[u8] = b"login-state";

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Provider subject.
    pub subject: String,
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// When the session started.
    pub issued_at: DateTime<Utc>,
    /// When the session ends.
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    /// Start a session now, lasting `ttl`.
    #[must_use]
    pub fn new(subject: String, name: Option<String>, email: Option<String>, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            subject,
            name,
            email,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// Name to greet the user with: display name, else email, else subject.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.subject)
    }
}

/// State of an in-flight authorization-code sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginState {
    /// CSRF token echoed back by the provider.
    pub state: String,
    /// Replay token bound into the ID token.
    pub nonce: String,
    /// Local path to return to after sign-in.
    pub return_to: String,
    /// When this sign-in attempt stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl LoginState {
    /// Fresh random `state` and `nonce` for a sign-in returning to `return_to`.
    ///
    /// `return_to` is reduced to a local path; anything else becomes `/`.
    #[must_use]
    pub fn new(return_to: Option<&str>) -> Self {
        Self {
            state: random_token(),
            nonce: random_token(),
            return_to: local_path(return_to),
            expires_at: Utc::now() + Duration::minutes(LOGIN_STATE_TTL_MINUTES),
        }
    }

    /// Check the `state` returned by the provider.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::OAuthStateInvalid`] on mismatch or expiry.
    pub fn verify(&self, returned_state: &str) -> Result<()> {
        if self.expires_at <= Utc::now() {
            return Err(AuthError::OAuthStateInvalid);
        }
        if !constant_time_eq::constant_time_eq(self.state.as_bytes(), returned_state.as_bytes()) {
            return Err(AuthError::OAuthStateInvalid);
        }
        Ok(())
    }
}

/// Seals and opens cookie payloads.
#[derive(Clone)]
pub struct SessionCodec {
    cipher: Arc<Aes256Gcm>,
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Derive the cookie key from `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfiguration`] if the secret is shorter
    /// than 16 bytes.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.len() < 16 {
            return Err(AuthError::InvalidConfiguration(
                "session secret must be at least 16 bytes".to_string(),
            ));
        }

        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AuthError::InternalError(format!("Failed to initialize cipher: {e}")))?;

        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Seal a user session into a cookie value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if encryption fails.
    pub fn seal_session(&self, session: &UserSession) -> Result<String> {
        self.seal(SESSION_PURPOSE, session)
    }

    /// Open a session cookie.
    ///
    /// # Errors
    ///
    /// [`AuthError::SessionTampered`] if the value does not open,
    /// [`AuthError::SessionExpired`] if the session is over.
    pub fn open_session(&self, value: &str) -> Result<UserSession> {
        let session: UserSession = self.open(SESSION_PURPOSE, value)?;
        if session.expires_at <= Utc::now() {
            return Err(AuthError::SessionExpired);
        }
        Ok(session)
    }

    /// Seal a login state into a cookie value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InternalError`] if encryption fails.
    pub fn seal_login_state(&self, state: &LoginState) -> Result<String> {
        self.seal(LOGIN_PURPOSE, state)
    }

    /// Open a login-state cookie.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::OAuthStateInvalid`] if the value does not open.
    pub fn open_login_state(&self, value: &str) -> Result<LoginState> {
        self.open(LOGIN_PURPOSE, value)
            .map_err(|_| AuthError::OAuthStateInvalid)
    }

    fn seal<T: Serialize>(&self, purpose: &[u8], value: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|e| AuthError::InternalError(format!("Session serialization failed: {e}")))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: &plaintext,
                    aad: purpose,
                },
            )
            .map_err(|e| AuthError::InternalError(format!("Encryption failed: {e}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn open<T: DeserializeOwned>(&self, purpose: &[u8], value: &str) -> Result<T> {
        let sealed = URL_SAFE_NO_PAD
            .decode(value.trim())
            .map_err(|_| AuthError::SessionTampered)?;

        if sealed.len() <= NONCE_LEN {
            return Err(AuthError::SessionTampered);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: purpose,
                },
            )
            .map_err(|_| AuthError::SessionTampered)?;

        serde_json::from_slice(&plaintext).map_err(|_| AuthError::SessionTampered)
    }
}

/// 256 random bits, base64url.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Keep only same-origin absolute paths (`/x`, not `//host` or `http://`).
fn local_path(return_to: Option<&str>) -> String {
    match return_to.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "a-long-enough-test-secret";

    fn session(ttl: Duration) -> UserSession {
        UserSession::new(
            "auth0|42".to_string(),
            Some("Ana Horvat".to_string()),
            Some("ana@example.com".to_string()),
            ttl,
        )
    }

    #[test]
    fn session_survives_a_round_trip() {
        let codec = SessionCodec::new(SECRET).unwrap();
        let original = session(Duration::hours(1));

        let opened = codec.open_session(&codec.seal_session(&original).unwrap()).unwrap();

        assert_eq!(opened, original);
        assert_eq!(opened.display_name(), "Ana Horvat");
    }

    #[test]
    fn altered_cookie_is_rejected() {
        let codec = SessionCodec::new(SECRET).unwrap();
        let sealed = codec.seal_session(&session(Duration::hours(1))).unwrap();

        let mut bytes = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let altered = URL_SAFE_NO_PAD.encode(bytes);

        assert_eq!(codec.open_session(&altered), Err(AuthError::SessionTampered));
        assert_eq!(codec.open_session("garbage"), Err(AuthError::SessionTampered));
    }

    #[test]
    fn other_secret_cannot_open() {
        let sealed = SessionCodec::new(SECRET)
            .unwrap()
            .seal_session(&session(Duration::hours(1)))
            .unwrap();
        let other = SessionCodec::new("another-long-enough-secret").unwrap();

        assert_eq!(other.open_session(&sealed), Err(AuthError::SessionTampered));
    }

    #[test]
    fn expired_session_is_rejected() {
        let codec = SessionCodec::new(SECRET).unwrap();
        let sealed = codec.seal_session(&session(Duration::seconds(-1))).unwrap();

        assert_eq!(codec.open_session(&sealed), Err(AuthError::SessionExpired));
    }

    #[test]
    fn login_state_cookie_cannot_pass_as_session() {
        let codec = SessionCodec::new(SECRET).unwrap();
        let sealed = codec.seal_login_state(&LoginState::new(Some("/ticket/1"))).unwrap();

        assert_eq!(codec.open_session(&sealed), Err(AuthError::SessionTampered));
    }

    #[test]
    fn login_state_checks_returned_state() {
        let codec = SessionCodec::new(SECRET).unwrap();
        let state = LoginState::new(Some("/ticket/1"));
        let opened = codec
            .open_login_state(&codec.seal_login_state(&state).unwrap())
            .unwrap();

        assert!(opened.verify(&state.state).is_ok());
        assert_eq!(opened.verify("forged"), Err(AuthError::OAuthStateInvalid));
        assert_eq!(opened.return_to, "/ticket/1");
    }

    #[test]
    fn returned_state_must_match_exactly() {
        let state = LoginState::new(None);
        let mut flipped = state.state.clone().into_bytes();
        flipped[0] ^= 1;
        let flipped = String::from_utf8_lossy(&flipped).into_owned();

        assert_eq!(state.verify(""), Err(AuthError::OAuthStateInvalid));
        assert_eq!(
            state.verify(&format!("{}x", state.state)),
            Err(AuthError::OAuthStateInvalid)
        );
        assert_eq!(
            state.verify(&state.state[..state.state.len() - 1]),
            Err(AuthError::OAuthStateInvalid)
        );
        assert_eq!(state.verify(&flipped), Err(AuthError::OAuthStateInvalid));
    }

    #[test]
    fn return_path_must_be_local() {
        assert_eq!(LoginState::new(Some("https://evil.example.com")).return_to, "/");
        assert_eq!(LoginState::new(Some("//evil.example.com")).return_to, "/");
        assert_eq!(LoginState::new(None).return_to, "/");
        assert_eq!(LoginState::new(Some("/ticket/abc")).return_to, "/ticket/abc");
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(matches!(
            SessionCodec::new("short"),
            Err(AuthError::InvalidConfiguration(_))
        ));
    }
}
