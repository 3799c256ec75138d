//! Roster queries

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::info;

use crate::ingest::RosterSheet;
use crate::models::{RosterEntry, RosterRow};
use crate::Result;

/// Roster row of a student in a subject
pub async fn find_roster_entry(
    pool: &SqlitePool,
    student_id: &str,
    subject: &str,
) -> Result<Option<RosterEntry>> {
    let entry = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT id, student_id, name, class, subject, created_at, updated_at
        FROM rosters
        WHERE student_id = ? AND subject = ?
        "#,
    )
    .bind(student_id)
    .bind(subject)
    .fetch_optional(pool)
    .await?;
    Ok(entry)
}

/// Ids of every rostered student of a subject
pub async fn roster_student_ids(pool: &SqlitePool, subject: &str) -> Result<HashSet<String>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT student_id FROM rosters WHERE subject = ?")
        .bind(subject)
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Members of one class of a subject
pub async fn roster_for_class(
    pool: &SqlitePool,
    subject: &str,
    class: &str,
) -> Result<Vec<RosterEntry>> {
    let entries = sqlx::query_as::<_, RosterEntry>(
        r#"
        SELECT id, student_id, name, class, subject, created_at, updated_at
        FROM rosters
        WHERE subject = ? AND class = ?
        ORDER BY student_id ASC
        "#,
    )
    .bind(subject)
    .bind(class)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Roster of a subject with the email bound to each entry, by class then id
pub async fn list_roster_rows(pool: &SqlitePool, subject: &str) -> Result<Vec<RosterRow>> {
    let rows = sqlx::query_as::<_, RosterRow>(
        r#"
        SELECT r.class, r.student_id, r.name, s.email
        FROM rosters r
        LEFT JOIN students s ON s.student_id = r.student_id AND s.subject = r.subject
        WHERE r.subject = ?
        ORDER BY r.class ASC, r.student_id ASC
        "#,
    )
    .bind(subject)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Write a parsed roster in one transaction.
///
/// Existing entries get the new class; the name is replaced only when the
/// upload carries one.
pub async fn apply_roster_sheet(pool: &SqlitePool, subject: &str, sheet: &RosterSheet) -> Result<usize> {
    let mut tx = pool.begin().await?;
    for entry in &sheet.entries {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO rosters (student_id, name, class, subject, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (student_id, subject)
            DO UPDATE SET
                class = excluded.class,
                name = CASE WHEN excluded.name <> '' THEN excluded.name ELSE rosters.name END,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.student_id)
        .bind(entry.name.as_deref().unwrap_or(""))
        .bind(&entry.class)
        .bind(subject)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("Imported {} roster entries for subject '{}'", sheet.entries.len(), subject);
    Ok(sheet.entries.len())
}

/// Delete the whole roster of a subject
pub async fn delete_roster(pool: &SqlitePool, subject: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM rosters WHERE subject = ?")
        .bind(subject)
        .execute(pool)
        .await?;
    info!("Cleared {} roster entries of subject '{}'", result.rows_affected(), subject);
    Ok(result.rows_affected())
}
