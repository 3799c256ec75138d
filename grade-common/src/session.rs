//! Signed session tokens
//!
//! A session travels in a cookie as an HS256 JSON Web Token whose claims are
//! the session fields plus `iat`/`exp`.
//!
//! Pure functions only; cookie plumbing lives in the web crate.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Sessions older than this are rejected (seconds)
pub const SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// Length of generated secrets
const GENERATED_SECRET_LEN: usize = 48;

/// Who is signed in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// Student account row id
    Student { account_id: i64 },
    /// Whitelisted teacher in admin mode
    Admin { email: String },
}

/// Identity returned by the provider, waiting to be bound to a roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub email: String,
    pub name: String,
}

/// Server-side view of the session cookie
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingRegistration>,

    /// OAuth `state` nonce issued by /login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.principal.is_none() && self.pending.is_none() && self.oauth_state.is_none()
    }
}

/// Token claims: the session plus issue and expiry times (Unix seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    #[serde(flatten)]
    session: Session,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,

    #[error("session signature mismatch")]
    InvalidSignature,

    #[error("session expired")]
    Expired,

    #[error("failed to sign session: {0}")]
    Signing(String),
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn sign_claims(claims: &SessionClaims, secret: &str) -> Result<String, SessionError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| SessionError::Signing(e.to_string()))
}

/// Generate a random secret for signing sessions
pub fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Generate a random OAuth state nonce
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

/// Sign a session issued now, valid for [`SESSION_MAX_AGE_SECS`]
pub fn encode_session(session: &Session, secret: &str) -> Result<String, SessionError> {
    let now = now_secs();
    let claims = SessionClaims {
        session: session.clone(),
        iat: now,
        exp: now + SESSION_MAX_AGE_SECS as u64,
    };
    sign_claims(&claims, secret)
}

/// Verify and decode a session token
pub fn decode_session(token: &str, secret: &str) -> Result<Session, SessionError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.session)
    .map_err(|err| match err.kind() {
        ErrorKind::InvalidSignature => SessionError::InvalidSignature,
        ErrorKind::ExpiredSignature => SessionError::Expired,
        _ => SessionError::Malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: i64) -> Session {
        Session {
            principal: Some(Principal::Student { account_id: id }),
            ..Session::default()
        }
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let session = Session {
            principal: Some(Principal::Admin { email: "t@example.edu".into() }),
            pending: Some(PendingRegistration {
                email: "s@example.edu".into(),
                name: "Line\nBreak \"quoted\"".into(),
            }),
            oauth_state: Some("abc".into()),
        };
        let token = encode_session(&session, "secret").unwrap();
        assert_eq!(token.split('.').count(), 3);
        let decoded = decode_session(&token, "secret").unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = encode_session(&student(1), "secret").unwrap();
        assert_eq!(
            decode_session(&token, "other"),
            Err(SessionError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = encode_session(&student(1), "secret").unwrap();
        let other = encode_session(&student(2), "secret").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        // Student 2's claims under student 1's signature
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
        assert_eq!(
            decode_session(&forged, "secret"),
            Err(SessionError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert_eq!(decode_session("nodot", "s"), Err(SessionError::Malformed));
        assert_eq!(decode_session("!!!.abc", "s"), Err(SessionError::Malformed));
    }

    #[test]
    fn test_expired_session_rejected() {
        let issued = now_secs() - SESSION_MAX_AGE_SECS as u64 - 10;
        let claims = SessionClaims {
            session: student(1),
            iat: issued,
            exp: issued + SESSION_MAX_AGE_SECS as u64,
        };
        let token = sign_claims(&claims, "secret").unwrap();
        assert_eq!(decode_session(&token, "secret"), Err(SessionError::Expired));
    }

    #[test]
    fn test_token_without_expiry_rejected() {
        let token = encode(
            &Header::default(),
            &student(1),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(decode_session(&token, "secret"), Err(SessionError::Malformed));
    }

    #[test]
    fn test_generated_values_are_random() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), GENERATED_SECRET_LEN);
        assert_ne!(a, b);
        assert_ne!(generate_nonce(), generate_nonce());
    }
}
