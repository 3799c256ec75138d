//! Landing page, registration and the student's grade report

use std::collections::{BTreeSet, HashSet};

use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use grade_common::db::{
    class_records, count_subject_records, create_account, distinct_subjects, find_account,
    find_account_by_student_id, find_roster_entry, roster_for_class, student_records, NewAccount,
};
use grade_common::models::StudentAccount;
use grade_common::session::{Principal, Session};
use grade_common::stats::{build_grade_report, GradeReport, ReportRequest};
use serde::Deserialize;
use tracing::{info, warn};

use super::session::{with_session, CurrentSession};
use super::ui;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Signed-in student account, if the session names one that still exists
async fn signed_in_student(state: &AppState, session: &Session) -> ApiResult<Option<StudentAccount>> {
    let Some(Principal::Student { account_id }) = session.principal else {
        return Ok(None);
    };
    let account = find_account(&state.db, account_id, Some(state.fixed_subject()?)).await?;
    if account.is_none() {
        warn!("Session refers to missing account {}", account_id);
    }
    Ok(account)
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<Response> {
    let config = &state.config;

    if config.is_admin() {
        let Some(Principal::Admin { email }) = &session.principal else {
            return Ok(ui::signed_out_page(&config.app_name, true).into_response());
        };
        let subjects: BTreeSet<String> = distinct_subjects(&state.db)
            .await?
            .into_iter()
            .chain(config.known_subjects.iter().cloned())
            .collect();
        let subjects: Vec<String> = subjects.into_iter().collect();
        return Ok(ui::admin_home_page(&config.app_name, email, &subjects).into_response());
    }

    if !matches!(session.principal, Some(Principal::Student { .. })) {
        return Ok(ui::signed_out_page(&config.app_name, false).into_response());
    }
    match signed_in_student(&state, &session).await? {
        Some(account) => {
            let is_teacher = config.is_teacher(&account.email);
            Ok(ui::student_home_page(&config.app_name, &account, is_teacher).into_response())
        }
        None => Ok(Redirect::to("/logout").into_response()),
    }
}

/// GET /register
pub async fn show_register(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Response {
    if state.config.is_admin() {
        return Redirect::to("/").into_response();
    }
    match &session.pending {
        Some(pending) => ui::register_page(&state.config.app_name, &pending.email).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub student_id: String,
}

/// POST /register
///
/// Binds the pending identity to a roster entry of the deployment's subject.
pub async fn register(
    State(state): State<AppState>,
    CurrentSession(mut session): CurrentSession,
    Form(form): Form<RegisterForm>,
) -> ApiResult<Response> {
    if state.config.is_admin() {
        return Ok(Redirect::to("/").into_response());
    }
    let Some(pending) = session.pending.clone() else {
        return Ok(Redirect::to("/").into_response());
    };

    let subject = state.fixed_subject()?;
    let student_id = form.student_id.trim();
    if student_id.is_empty() {
        return Err(ApiError::BadRequest("Please enter your student ID".to_string()));
    }

    let Some(roster) = find_roster_entry(&state.db, student_id, subject).await? else {
        warn!("Registration for {} with unknown id {}", pending.email, student_id);
        return Err(ApiError::BadRequest(
            "This student ID is not on the class roster".to_string(),
        ));
    };
    if find_account_by_student_id(&state.db, student_id, subject)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest(
            "This student ID is already registered".to_string(),
        ));
    }

    let account = create_account(
        &state.db,
        &NewAccount {
            email: &pending.email,
            name: &pending.name,
            student_id: &roster.student_id,
            class: &roster.class,
            subject,
        },
    )
    .await?;

    session.pending = None;
    session.principal = Some(Principal::Student { account_id: account.id });
    with_session(&session, &state.session_secret, Redirect::to("/"))
}

/// Grade report of a student, `None` when the subject has no grades at all.
///
/// Peers are the students currently rostered in the student's class.
async fn load_report(state: &AppState, account: &StudentAccount) -> ApiResult<Option<GradeReport>> {
    let subject = account.subject.as_str();
    if count_subject_records(&state.db, subject).await? == 0 {
        return Ok(None);
    }

    let entry = find_roster_entry(&state.db, &account.student_id, subject).await?;
    let class = account.current_class(entry.as_ref()).to_string();

    let roster = roster_for_class(&state.db, subject, &class).await?;
    let mut records = class_records(&state.db, subject, &class).await?;
    let known: HashSet<i64> = records.iter().map(|r| r.id).collect();
    records.extend(
        student_records(&state.db, &account.student_id, subject)
            .await?
            .into_iter()
            .filter(|r| !known.contains(&r.id)),
    );

    let request = ReportRequest {
        subject: subject.to_string(),
        student_id: account.student_id.clone(),
        class,
    };
    Ok(Some(build_grade_report(
        &request,
        &records,
        &roster,
        &state.config.columns,
        state.config.stats_settings(),
    )))
}

/// GET /my-grades
pub async fn my_grades(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<Response> {
    if state.config.is_admin() || !matches!(session.principal, Some(Principal::Student { .. })) {
        return Ok(Redirect::to("/").into_response());
    }
    let Some(account) = signed_in_student(&state, &session).await? else {
        return Ok(Redirect::to("/logout").into_response());
    };

    let app_name = &state.config.app_name;
    match load_report(&state, &account).await? {
        Some(report) => {
            info!(
                "Report for {} (class {}, {} peers)",
                account.student_id, report.class, report.statistics.count
            );
            Ok(ui::report_page(app_name, &account, &report).into_response())
        }
        None => Ok(ui::no_grades_page(app_name, &account).into_response()),
    }
}

/// GET /api/my-grades
pub async fn my_grades_json(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<Json<GradeReport>> {
    if state.config.is_admin() {
        return Err(ApiError::Unauthorized);
    }
    let account = signed_in_student(&state, &session)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    load_report(&state, &account)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No grades published for {}", account.subject)))
}
