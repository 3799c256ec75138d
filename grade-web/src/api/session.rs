//! Session cookie plumbing
//!
//! The session itself is a signed token from `grade_common::session`; this
//! module only moves it in and out of the `grade_session` cookie.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use grade_common::session::{decode_session, encode_session, Session, SESSION_MAX_AGE_SECS};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const SESSION_COOKIE: &str = "grade_session";

/// Session of the current request; empty when there is no valid cookie
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(read_session(&parts.headers, &state.session_secret)))
    }
}

/// Value of the named cookie, if the request carries it
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Decode the session cookie; a bad or expired token counts as no session
pub fn read_session(headers: &HeaderMap, secret: &str) -> Session {
    let Some(token) = cookie_value(headers, SESSION_COOKIE) else {
        return Session::default();
    };
    match decode_session(token, secret) {
        Ok(session) => session,
        Err(e) => {
            debug!("Ignoring session cookie: {}", e);
            Session::default()
        }
    }
}

/// `Set-Cookie` value storing `session`
pub fn session_cookie(session: &Session, secret: &str) -> ApiResult<String> {
    if session.is_empty() {
        return Ok(clear_session_cookie());
    }
    let token = encode_session(session, secret).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_MAX_AGE_SECS}"
    ))
}

/// `Set-Cookie` value removing the session
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Attach the updated session to a response
pub fn with_session(
    session: &Session,
    secret: &str,
    response: impl IntoResponse,
) -> ApiResult<Response> {
    let cookie = session_cookie(session, secret)?;
    Ok(([(SET_COOKIE, cookie)], response).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use grade_common::session::Principal;

    #[test]
    fn test_cookie_value_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; grade_session=abc.def.ghi; x=1"));
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_session_survives_cookie_round_trip() {
        let session = Session {
            principal: Some(Principal::Student { account_id: 4 }),
            ..Session::default()
        };
        let set_cookie = session_cookie(&session, "secret").unwrap();
        let pair = set_cookie.split(';').next().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        let decoded = read_session(&headers, "secret");
        assert_eq!(decoded.principal, session.principal);

        // A different secret sees no session at all
        assert!(read_session(&headers, "other").is_empty());
    }

    #[test]
    fn test_empty_session_clears_cookie() {
        let cookie = session_cookie(&Session::default(), "secret").unwrap();
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
    }
}
