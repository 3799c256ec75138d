//! Teacher dashboard, uploads and deletions
//!
//! Every handler runs the same guard: no session redirects home, a student
//! whose email is not whitelisted gets 403, an admin-mode teacher passes.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{HOST, REFERER};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use grade_common::db;
use grade_common::ingest::{parse_grade_sheet, parse_roster};
use grade_common::session::{Principal, Session};
use serde::Deserialize;
use tracing::{info, warn};

use super::session::CurrentSession;
use super::ui;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

enum Access {
    Teacher { email: String },
    SignedOut,
}

async fn teacher_access(state: &AppState, session: &Session) -> ApiResult<Access> {
    match &session.principal {
        None => Ok(Access::SignedOut),
        Some(Principal::Admin { email }) => Ok(Access::Teacher { email: email.clone() }),
        Some(Principal::Student { account_id }) => {
            let account = db::find_account(&state.db, *account_id, state.config.subject.as_deref()).await?;
            match account {
                Some(account) if state.config.is_teacher(&account.email) => {
                    Ok(Access::Teacher { email: account.email })
                }
                _ => {
                    warn!("Account {} denied teacher access", account_id);
                    Err(ApiError::Forbidden("Teachers only".to_string()))
                }
            }
        }
    }
}

/// Subject of a teacher request; admin mode requires it from the client
fn target_subject(state: &AppState, requested: Option<&str>) -> ApiResult<String> {
    state
        .config
        .subject_for(requested)
        .ok_or_else(|| ApiError::BadRequest("A subject is required".to_string()))
}

fn back_to_dashboard(state: &AppState, subject: &str) -> Response {
    Redirect::to(&ui::dashboard_url(subject, state.config.is_admin())).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct SubjectParams {
    pub subject: Option<String>,
}

/// GET /teacher/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Query(params): Query<SubjectParams>,
) -> ApiResult<Response> {
    let Access::Teacher { .. } = teacher_access(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let Some(subject) = state.config.subject_for(params.subject.as_deref()) else {
        return Ok(Redirect::to("/").into_response());
    };

    let records = db::subject_records(&state.db, &subject).await?;
    let roster = db::list_roster_rows(&state.db, &subject).await?;
    Ok(ui::dashboard_page(
        &state.config.app_name,
        &subject,
        state.config.is_admin(),
        &records,
        &roster,
    )
    .into_response())
}

#[derive(Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    subject: Option<String>,
}

async fn read_upload(mut multipart: Multipart, file_field: &str) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?;
            form.file = Some(bytes.to_vec());
        } else if name == "subject" {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?;
            form.subject = Some(text);
        }
    }
    Ok(form)
}

fn uploaded_file(form: &UploadForm) -> ApiResult<&[u8]> {
    match form.file.as_deref() {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(ApiError::BadRequest("Please choose a CSV file".to_string())),
    }
}

/// POST /teacher/upload
pub async fn upload_grades(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    multipart: Multipart,
) -> ApiResult<Response> {
    let Access::Teacher { email } = teacher_access(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let form = read_upload(multipart, "csv_file").await?;
    let subject = target_subject(&state, form.subject.as_deref())?;
    let bytes = uploaded_file(&form)?;

    let roster_ids = db::roster_student_ids(&state.db, &subject).await?;
    let sheet = parse_grade_sheet(bytes, &state.config.columns, &roster_ids)?;
    let imported = db::apply_grade_sheet(&state.db, &subject, &sheet).await?;
    info!(
        "{} uploaded grades for {}: {} imported, {} skipped",
        email, subject, imported, sheet.skipped_rows
    );

    Ok(back_to_dashboard(&state, &subject))
}

/// POST /teacher/upload-roster
pub async fn upload_roster(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    multipart: Multipart,
) -> ApiResult<Response> {
    let Access::Teacher { email } = teacher_access(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let form = read_upload(multipart, "roster_file").await?;
    let subject = target_subject(&state, form.subject.as_deref())?;
    let bytes = uploaded_file(&form)?;

    let sheet = parse_roster(bytes, &state.config.columns)?;
    let imported = db::apply_roster_sheet(&state.db, &subject, &sheet).await?;
    info!("{} uploaded roster for {}: {} entries", email, subject, imported);

    Ok(back_to_dashboard(&state, &subject))
}

/// POST /teacher/delete-roster
pub async fn delete_roster(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Form(params): Form<SubjectParams>,
) -> ApiResult<Response> {
    let Access::Teacher { email } = teacher_access(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let subject = target_subject(&state, params.subject.as_deref())?;
    let removed = db::delete_roster(&state.db, &subject).await?;
    info!("{} deleted the roster of {} ({} entries)", email, subject, removed);

    Ok(back_to_dashboard(&state, &subject))
}

/// POST /teacher/delete-all
pub async fn delete_all_grades(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Form(params): Form<SubjectParams>,
) -> ApiResult<Response> {
    let Access::Teacher { email } = teacher_access(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let subject = target_subject(&state, params.subject.as_deref())?;
    let removed = db::delete_subject_records(&state.db, &subject).await?;
    info!("{} deleted all grades of {} ({} records)", email, subject, removed);

    Ok(back_to_dashboard(&state, &subject))
}

/// POST /teacher/delete/:id
///
/// Student mode only touches records of the deployment's subject.
pub async fn delete_grade(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let Access::Teacher { email } = teacher_access(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let scope = state.config.subject_for(None);
    if db::delete_record(&state.db, id, scope.as_deref()).await? {
        info!("{} deleted grade record {}", email, id);
    }

    let target = local_referer(&headers).unwrap_or_else(|| match &scope {
        Some(subject) => ui::dashboard_url(subject, false),
        None => "/".to_string(),
    });
    Ok(Redirect::to(&target).into_response())
}

/// The `Referer` as a local path, when it points back at this server.
///
/// Path-only values are kept as sent; absolute URLs must carry the request's
/// own `Host` and are reduced to their path and query.
fn local_referer(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(REFERER)?.to_str().ok()?.trim();
    if referer.starts_with('/') {
        // `//host` and `/\host` are treated as other origins by browsers
        return match referer.as_bytes().get(1) {
            Some(b'/') | Some(b'\\') => None,
            _ => Some(referer.to_string()),
        };
    }

    let uri: Uri = referer.parse().ok()?;
    let host = headers.get(HOST)?.to_str().ok()?;
    if uri.authority()?.as_str() != host {
        return None;
    }
    Some(uri.path_and_query().map_or("/", |pq| pq.as_str()).to_string())
}
