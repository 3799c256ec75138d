//! Service status: `/health` and `/api/buildinfo`
//!
//! Neither route needs a session.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use grade_common::config::AppMode;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the database does not answer
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
    /// Fixed subject in student mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub database: bool,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Health check: database unavailable: {}", e);
            false
        }
    };

    let (code, status) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let response = HealthResponse {
        status,
        module: "grade-web",
        version: env!("CARGO_PKG_VERSION"),
        mode: match state.config.mode {
            AppMode::Student => "student",
            AppMode::Admin => "admin",
        },
        subject: state.config.subject.clone(),
        database,
    };
    (code, Json(response))
}

#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub build_profile: &'static str,
}

/// GET /api/buildinfo
pub async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        build_profile: env!("BUILD_PROFILE"),
    })
}
