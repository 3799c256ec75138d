//! grade-web library - grade report web service
//!
//! Students sign in through the identity provider, bind their account to a
//! roster entry and view their scores next to class statistics. Teachers
//! upload grade sheets and rosters and manage records.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use grade_common::config::AppConfig;
use sqlx::SqlitePool;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod oauth;

pub use error::{ApiError, ApiResult};

use oauth::OAuthClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration (immutable after startup)
    pub config: Arc<AppConfig>,
    pub db: SqlitePool,
    /// Session cookie signing secret
    pub session_secret: Arc<str>,
    pub oauth: Arc<OAuthClient>,
}

impl AppState {
    pub fn new(config: AppConfig, db: SqlitePool, session_secret: String) -> anyhow::Result<Self> {
        let oauth = OAuthClient::new(config.oauth.clone())?;
        Ok(Self {
            config: Arc::new(config),
            db,
            session_secret: Arc::from(session_secret),
            oauth: Arc::new(oauth),
        })
    }

    /// Subject served by a student-mode deployment
    pub fn fixed_subject(&self) -> ApiResult<&str> {
        self.config
            .subject
            .as_deref()
            .ok_or_else(|| ApiError::Internal("no subject configured".to_string()))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    let student = Router::new()
        .route("/", get(api::index))
        .route("/login", get(api::login))
        .route("/auth/callback", get(api::auth_callback))
        .route("/logout", get(api::logout))
        .route("/register", get(api::show_register).post(api::register))
        .route("/my-grades", get(api::my_grades))
        .route("/api/my-grades", get(api::my_grades_json));

    let teacher = Router::new()
        .route("/teacher/dashboard", get(api::dashboard))
        .route("/teacher/upload", post(api::upload_grades))
        .route("/teacher/upload-roster", post(api::upload_roster))
        .route("/teacher/delete-roster", post(api::delete_roster))
        .route("/teacher/delete-all", post(api::delete_all_grades))
        .route("/teacher/delete/:id", post(api::delete_grade));

    let public = Router::new()
        .route("/health", get(api::health))
        .route("/api/buildinfo", get(api::build_info));

    Router::new()
        .merge(student)
        .merge(teacher)
        .merge(public)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
