//! Tests for SQLite persistence
//!
//! Tests cover:
//! - Database creation on first run and reopening
//! - Score upserts (last write wins per student, item and subject)
//! - Class records joined through the current roster
//! - Roster upserts, listing with bound accounts and deletion
//! - Account uniqueness per subject
//! - Session secret generation and persistence

use grade_common::db::{self, NewAccount};
use grade_common::ingest::{GradeSheet, RosterSheet, RosterUpsert, ScoreUpsert};
use grade_common::Error;
use sqlx::SqlitePool;

async fn memory_db() -> SqlitePool {
    db::init_memory_database()
        .await
        .expect("Should create in-memory database")
}

fn roster_sheet(rows: &[(&str, &str, Option<&str>)]) -> RosterSheet {
    RosterSheet {
        entries: rows
            .iter()
            .map(|(sid, class, name)| RosterUpsert {
                student_id: sid.to_string(),
                class: class.to_string(),
                name: name.map(str::to_string),
            })
            .collect(),
    }
}

fn grade_sheet(rows: &[(&str, &str, f64)]) -> GradeSheet {
    GradeSheet {
        upserts: rows
            .iter()
            .map(|(sid, item, score)| ScoreUpsert {
                student_id: sid.to_string(),
                item_name: item.to_string(),
                score: *score,
            })
            .collect(),
        skipped_rows: 0,
    }
}

fn new_account<'a>(email: &'a str, student_id: &'a str, subject: &'a str) -> NewAccount<'a> {
    NewAccount {
        email,
        name: "Student",
        student_id,
        class: "A",
        subject,
    }
}

// =============================================================================
// Initialization
// =============================================================================

#[tokio::test]
async fn test_database_created_when_missing() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let db_path = dir.path().join("nested").join("grades.db");

    let pool = db::init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_reopens_with_data() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let db_path = dir.path().join("grades.db");

    let pool = db::init_database(&db_path).await.unwrap();
    db::apply_roster_sheet(&pool, "circuit", &roster_sheet(&[("S1", "A", None)]))
        .await
        .unwrap();
    pool.close().await;

    let pool = db::init_database(&db_path).await.expect("Should reopen database");
    let entry = db::find_roster_entry(&pool, "S1", "circuit").await.unwrap();
    assert!(entry.is_some());
}

#[tokio::test]
async fn test_pragmas_apply_to_every_connection() {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let pool = db::init_database(&dir.path().join("grades.db")).await.unwrap();

    // Hold two connections at once so the second is a fresh one
    let mut first = pool.acquire().await.unwrap();
    let mut second = pool.acquire().await.unwrap();
    for conn in [&mut first, &mut second] {
        let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        let busy_timeout: i64 = sqlx::query_scalar("PRAGMA busy_timeout")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&mut **conn)
            .await
            .unwrap();
        assert_eq!(foreign_keys, 1);
        assert_eq!(busy_timeout, 5000);
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }
}

// =============================================================================
// Score records
// =============================================================================

#[tokio::test]
async fn test_grade_upsert_last_write_wins() {
    let pool = memory_db().await;

    db::apply_grade_sheet(&pool, "circuit", &grade_sheet(&[("S1", "HW1", 10.0)]))
        .await
        .unwrap();
    db::apply_grade_sheet(
        &pool,
        "circuit",
        &grade_sheet(&[("S1", "HW1", 15.0), ("S1", "HW2", 8.0)]),
    )
    .await
    .unwrap();
    // Same student and item in another subject is a separate record
    db::apply_grade_sheet(&pool, "antenna", &grade_sheet(&[("S1", "HW1", 3.0)]))
        .await
        .unwrap();

    let records = db::student_records(&pool, "S1", "circuit").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].item_name, "HW1");
    assert_eq!(records[0].score, 15.0);
    assert!(records[0].updated_at >= records[0].created_at);

    assert_eq!(db::count_subject_records(&pool, "circuit").await.unwrap(), 2);
    assert_eq!(db::count_subject_records(&pool, "antenna").await.unwrap(), 1);
    assert_eq!(
        db::distinct_subjects(&pool).await.unwrap(),
        vec!["antenna".to_string(), "circuit".to_string()]
    );
}

#[tokio::test]
async fn test_class_records_follow_roster() {
    let pool = memory_db().await;
    db::apply_roster_sheet(
        &pool,
        "circuit",
        &roster_sheet(&[("S1", "A", None), ("S2", "A", None), ("S3", "B", None)]),
    )
    .await
    .unwrap();
    // S3 is in class A of another subject only
    db::apply_roster_sheet(&pool, "antenna", &roster_sheet(&[("S3", "A", None)]))
        .await
        .unwrap();
    db::apply_grade_sheet(
        &pool,
        "circuit",
        &grade_sheet(&[("S1", "HW1", 1.0), ("S2", "HW1", 2.0), ("S3", "HW1", 3.0), ("S4", "HW1", 4.0)]),
    )
    .await
    .unwrap();

    let class_a = db::class_records(&pool, "circuit", "A").await.unwrap();
    let ids: Vec<&str> = class_a.iter().map(|r| r.student_id.as_str()).collect();
    assert_eq!(ids, vec!["S1", "S2"]);

    // Moving S2 to B moves its records with it
    db::apply_roster_sheet(&pool, "circuit", &roster_sheet(&[("S2", "B", None)]))
        .await
        .unwrap();
    let class_b = db::class_records(&pool, "circuit", "B").await.unwrap();
    let ids: Vec<&str> = class_b.iter().map(|r| r.student_id.as_str()).collect();
    assert_eq!(ids, vec!["S2", "S3"]);
}

#[tokio::test]
async fn test_subject_records_newest_first() {
    let pool = memory_db().await;
    db::apply_grade_sheet(&pool, "circuit", &grade_sheet(&[("S1", "HW1", 1.0)]))
        .await
        .unwrap();
    db::apply_grade_sheet(&pool, "circuit", &grade_sheet(&[("S1", "HW2", 2.0)]))
        .await
        .unwrap();

    let records = db::subject_records(&pool, "circuit").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].item_name, "HW2");
}

#[tokio::test]
async fn test_delete_record_respects_subject_scope() {
    let pool = memory_db().await;
    db::apply_grade_sheet(&pool, "antenna", &grade_sheet(&[("S1", "HW1", 1.0)]))
        .await
        .unwrap();
    let id = db::student_records(&pool, "S1", "antenna").await.unwrap()[0].id;

    assert!(!db::delete_record(&pool, id, Some("circuit")).await.unwrap());
    assert!(db::delete_record(&pool, id, Some("antenna")).await.unwrap());
    assert!(!db::delete_record(&pool, id, None).await.unwrap());
}

#[tokio::test]
async fn test_delete_subject_records_leaves_other_subjects() {
    let pool = memory_db().await;
    db::apply_grade_sheet(&pool, "circuit", &grade_sheet(&[("S1", "HW1", 1.0), ("S2", "HW1", 1.0)]))
        .await
        .unwrap();
    db::apply_grade_sheet(&pool, "antenna", &grade_sheet(&[("S1", "HW1", 1.0)]))
        .await
        .unwrap();

    assert_eq!(db::delete_subject_records(&pool, "circuit").await.unwrap(), 2);
    assert_eq!(db::count_subject_records(&pool, "circuit").await.unwrap(), 0);
    assert_eq!(db::count_subject_records(&pool, "antenna").await.unwrap(), 1);
}

// =============================================================================
// Rosters
// =============================================================================

#[tokio::test]
async fn test_roster_upsert_keeps_name_when_absent() {
    let pool = memory_db().await;
    db::apply_roster_sheet(&pool, "circuit", &roster_sheet(&[("S1", "A", Some("Amy"))]))
        .await
        .unwrap();
    db::apply_roster_sheet(&pool, "circuit", &roster_sheet(&[("S1", "B", None)]))
        .await
        .unwrap();

    let entry = db::find_roster_entry(&pool, "S1", "circuit").await.unwrap().unwrap();
    assert_eq!(entry.class, "B");
    assert_eq!(entry.name, "Amy");

    let members = db::roster_for_class(&pool, "circuit", "B").await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(db::roster_for_class(&pool, "circuit", "A").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_roster_listing_with_bound_accounts() {
    let pool = memory_db().await;
    db::apply_roster_sheet(
        &pool,
        "circuit",
        &roster_sheet(&[("S2", "B", None), ("S1", "B", None), ("S3", "A", None)]),
    )
    .await
    .unwrap();
    db::create_account(&pool, &new_account("s1@school.edu", "S1", "circuit"))
        .await
        .unwrap();
    // Account in another subject must not show up
    db::create_account(&pool, &new_account("s3@school.edu", "S3", "antenna"))
        .await
        .unwrap();

    let rows = db::list_roster_rows(&pool, "circuit").await.unwrap();
    let order: Vec<(&str, &str)> = rows
        .iter()
        .map(|r| (r.class.as_str(), r.student_id.as_str()))
        .collect();
    assert_eq!(order, vec![("A", "S3"), ("B", "S1"), ("B", "S2")]);
    assert_eq!(rows[0].email, None);
    assert_eq!(rows[1].email.as_deref(), Some("s1@school.edu"));

    let ids = db::roster_student_ids(&pool, "circuit").await.unwrap();
    assert_eq!(ids.len(), 3);

    assert_eq!(db::delete_roster(&pool, "circuit").await.unwrap(), 3);
    assert!(db::list_roster_rows(&pool, "circuit").await.unwrap().is_empty());
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn test_account_lookup_and_uniqueness() {
    let pool = memory_db().await;
    let account = db::create_account(&pool, &new_account("amy@school.edu", "S1", "circuit"))
        .await
        .unwrap();

    let found = db::find_account(&pool, account.id, Some("circuit")).await.unwrap();
    assert_eq!(found.as_ref().map(|a| a.email.as_str()), Some("amy@school.edu"));
    assert!(db::find_account(&pool, account.id, Some("antenna")).await.unwrap().is_none());
    assert!(db::find_account(&pool, account.id, None).await.unwrap().is_some());

    let by_email = db::find_account_by_email(&pool, "AMY@school.edu", "circuit")
        .await
        .unwrap();
    assert_eq!(by_email.map(|a| a.id), Some(account.id));

    // Same student id, same subject
    let err = db::create_account(&pool, &new_account("other@school.edu", "S1", "circuit"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    // Same email, same subject
    let err = db::create_account(&pool, &new_account("amy@school.edu", "S2", "circuit"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    // Another subject is independent
    assert!(db::create_account(&pool, &new_account("amy@school.edu", "S1", "antenna"))
        .await
        .is_ok());

    assert!(db::delete_account(&pool, account.id).await.unwrap());
    assert!(db::find_account_by_student_id(&pool, "S1", "circuit")
        .await
        .unwrap()
        .is_none());
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn test_session_secret_generated_once() {
    let pool = memory_db().await;

    let first = db::load_or_init_session_secret(&pool).await.unwrap();
    let second = db::load_or_init_session_secret(&pool).await.unwrap();
    assert_eq!(first.len(), 48);
    assert_eq!(first, second);
    assert_eq!(
        db::get_setting(&pool, db::SESSION_SECRET_KEY).await.unwrap(),
        Some(first)
    );
}

#[tokio::test]
async fn test_settings_overwrite() {
    let pool = memory_db().await;
    assert_eq!(db::get_setting(&pool, "k").await.unwrap(), None);

    db::set_setting(&pool, "k", "v1").await.unwrap();
    db::set_setting(&pool, "k", "v2").await.unwrap();
    assert_eq!(db::get_setting(&pool, "k").await.unwrap(), Some("v2".to_string()));
}
