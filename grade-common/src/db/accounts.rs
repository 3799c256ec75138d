//! Student account queries

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::is_unique_violation;
use crate::models::StudentAccount;
use crate::{Error, Result};

const ACCOUNT_COLUMNS: &str = "id, email, name, student_id, class, subject, created_at";

/// Fields needed to bind an identity to a roster entry
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub student_id: &'a str,
    pub class: &'a str,
    pub subject: &'a str,
}

/// Account by row id, optionally restricted to a subject
pub async fn find_account(
    pool: &SqlitePool,
    id: i64,
    subject: Option<&str>,
) -> Result<Option<StudentAccount>> {
    let account = match subject {
        Some(subject) => {
            let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM students WHERE id = ? AND subject = ?");
            sqlx::query_as::<_, StudentAccount>(&sql)
                .bind(id)
                .bind(subject)
                .fetch_optional(pool)
                .await?
        }
        None => {
            let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM students WHERE id = ?");
            sqlx::query_as::<_, StudentAccount>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await?
        }
    };
    Ok(account)
}

pub async fn find_account_by_email(
    pool: &SqlitePool,
    email: &str,
    subject: &str,
) -> Result<Option<StudentAccount>> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM students WHERE email = ? COLLATE NOCASE AND subject = ?"
    );
    let account = sqlx::query_as::<_, StudentAccount>(&sql)
        .bind(email)
        .bind(subject)
        .fetch_optional(pool)
        .await?;
    Ok(account)
}

pub async fn find_account_by_student_id(
    pool: &SqlitePool,
    student_id: &str,
    subject: &str,
) -> Result<Option<StudentAccount>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM students WHERE student_id = ? AND subject = ?");
    let account = sqlx::query_as::<_, StudentAccount>(&sql)
        .bind(student_id)
        .bind(subject)
        .fetch_optional(pool)
        .await?;
    Ok(account)
}

/// Create an account; a second binding of the same id or email is rejected
pub async fn create_account(pool: &SqlitePool, new: &NewAccount<'_>) -> Result<StudentAccount> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO students (email, name, student_id, class, subject, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.email)
    .bind(new.name)
    .bind(new.student_id)
    .bind(new.class)
    .bind(new.subject)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::InvalidInput(format!(
                "student {} or {} is already registered in {}",
                new.student_id, new.email, new.subject
            ))
        } else {
            Error::Database(e)
        }
    })?;

    let id = result.last_insert_rowid();
    info!(
        "Registered {} as student {} ({}, class {})",
        new.email, new.student_id, new.subject, new.class
    );

    Ok(StudentAccount {
        id,
        email: new.email.to_string(),
        name: new.name.to_string(),
        student_id: new.student_id.to_string(),
        class: new.class.to_string(),
        subject: new.subject.to_string(),
        created_at: now,
    })
}

/// Administrative removal of an account
pub async fn delete_account(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
