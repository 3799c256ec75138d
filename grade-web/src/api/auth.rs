//! Sign-in through the identity provider

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Redirect, Response};
use grade_common::db::find_account_by_email;
use grade_common::session::{generate_nonce, PendingRegistration, Principal};
use serde::Deserialize;
use tracing::{info, warn};

use super::session::{clear_session_cookie, with_session, CurrentSession};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /login
///
/// Stores a fresh state nonce in the session and sends the browser to the
/// provider.
pub async fn login(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
) -> ApiResult<Response> {
    let nonce = generate_nonce();
    let url = state.oauth.authorize_url(&nonce)?;
    session.oauth_state = Some(nonce);
    with_session(&session, &state.session_secret, Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// GET /auth/callback
pub async fn auth_callback(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    let secret = &state.session_secret;
    let expected = session.oauth_state.take();

    if expected.is_none() || expected != params.state {
        warn!("Sign-in callback with missing or mismatched state");
        return with_session(&session, secret, Redirect::to("/"));
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        warn!("Sign-in callback without authorization code");
        return with_session(&session, secret, Redirect::to("/"));
    };

    let identity = match state.oauth.identify(&code).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Sign-in failed: {}", e);
            return with_session(&session, secret, Redirect::to("/"));
        }
    };
    let email = identity.email.trim().to_lowercase();
    if email.is_empty() {
        warn!("Identity provider returned no email");
        return with_session(&session, secret, Redirect::to("/"));
    }

    if state.config.is_admin() {
        if !state.config.is_teacher(&email) {
            warn!("Rejected console sign-in for {}", email);
            return Err(ApiError::Forbidden(
                "Only teachers can sign in to this console".to_string(),
            ));
        }
        info!("Teacher {} signed in", email);
        session.pending = None;
        session.principal = Some(Principal::Admin { email });
        return with_session(&session, secret, Redirect::to("/"));
    }

    let subject = state.fixed_subject()?;
    match find_account_by_email(&state.db, &email, subject).await? {
        Some(account) => {
            info!("Student {} signed in ({})", account.student_id, email);
            session.pending = None;
            session.principal = Some(Principal::Student { account_id: account.id });
            with_session(&session, secret, Redirect::to("/"))
        }
        None => {
            info!("New identity {} needs registration", email);
            session.principal = None;
            session.pending = Some(PendingRegistration {
                email,
                name: identity.name.trim().to_string(),
            });
            with_session(&session, secret, Redirect::to("/register"))
        }
    }
}

/// GET /logout
pub async fn logout() -> Response {
    ([(SET_COOKIE, clear_session_cookie())], Redirect::to("/")).into_response()
}
