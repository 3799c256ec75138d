//! Score record queries

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::ingest::{GradeSheet, ScoreUpsert};
use crate::models::ScoreRecord;
use crate::Result;

const RECORD_COLUMNS: &str =
    "g.id, g.student_id, g.item_name, g.score, g.subject, g.created_at, g.updated_at";

/// Number of score records stored for a subject
pub async fn count_subject_records(pool: &SqlitePool, subject: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grades WHERE subject = ?")
        .bind(subject)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// One student's records in insertion order
pub async fn student_records(
    pool: &SqlitePool,
    student_id: &str,
    subject: &str,
) -> Result<Vec<ScoreRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM grades g WHERE g.student_id = ? AND g.subject = ? ORDER BY g.id ASC"
    );
    let records = sqlx::query_as::<_, ScoreRecord>(&sql)
        .bind(student_id)
        .bind(subject)
        .fetch_all(pool)
        .await?;
    Ok(records)
}

/// Records of every student currently rostered in `class` for `subject`.
///
/// Membership comes from the roster, never from the account's stored class.
pub async fn class_records(
    pool: &SqlitePool,
    subject: &str,
    class: &str,
) -> Result<Vec<ScoreRecord>> {
    let sql = format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM grades g
        JOIN rosters r ON r.student_id = g.student_id AND r.subject = g.subject
        WHERE g.subject = ? AND r.class = ?
        ORDER BY g.id ASC
        "#
    );
    let records = sqlx::query_as::<_, ScoreRecord>(&sql)
        .bind(subject)
        .bind(class)
        .fetch_all(pool)
        .await?;
    Ok(records)
}

/// All records of a subject, newest first
pub async fn subject_records(pool: &SqlitePool, subject: &str) -> Result<Vec<ScoreRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM grades g WHERE g.subject = ? ORDER BY g.created_at DESC, g.id DESC"
    );
    let records = sqlx::query_as::<_, ScoreRecord>(&sql)
        .bind(subject)
        .fetch_all(pool)
        .await?;
    Ok(records)
}

/// Subjects that have at least one score record, sorted
pub async fn distinct_subjects(pool: &SqlitePool) -> Result<Vec<String>> {
    let subjects: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT subject FROM grades ORDER BY subject ASC")
            .fetch_all(pool)
            .await?;
    Ok(subjects)
}

async fn upsert_score<'e, E>(executor: E, subject: &str, upsert: &ScoreUpsert) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO grades (student_id, item_name, score, subject, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (student_id, item_name, subject)
        DO UPDATE SET score = excluded.score, updated_at = excluded.updated_at
        "#,
    )
    .bind(&upsert.student_id)
    .bind(&upsert.item_name)
    .bind(upsert.score)
    .bind(subject)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Write a parsed grade sheet in one transaction (last write wins per key)
pub async fn apply_grade_sheet(pool: &SqlitePool, subject: &str, sheet: &GradeSheet) -> Result<usize> {
    let mut tx = pool.begin().await?;
    for upsert in &sheet.upserts {
        upsert_score(&mut *tx, subject, upsert).await?;
    }
    tx.commit().await?;

    info!(
        "Imported {} scores for subject '{}' ({} rows skipped: not on roster)",
        sheet.imported(),
        subject,
        sheet.skipped_rows
    );
    Ok(sheet.imported())
}

/// Delete one record; restricted to `subject` when given
pub async fn delete_record(pool: &SqlitePool, id: i64, subject: Option<&str>) -> Result<bool> {
    let result = match subject {
        Some(subject) => {
            sqlx::query("DELETE FROM grades WHERE id = ? AND subject = ?")
                .bind(id)
                .bind(subject)
                .execute(pool)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM grades WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?
        }
    };
    debug!("Deleted grade record {} ({} rows)", id, result.rows_affected());
    Ok(result.rows_affected() > 0)
}

/// Delete every score record of a subject
pub async fn delete_subject_records(pool: &SqlitePool, subject: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM grades WHERE subject = ?")
        .bind(subject)
        .execute(pool)
        .await?;
    info!("Cleared {} grade records of subject '{}'", result.rows_affected(), subject);
    Ok(result.rows_affected())
}
