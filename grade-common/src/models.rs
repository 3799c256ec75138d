//! Domain models persisted by the grade report service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One score of one item for one student in one subject.
///
/// Unique on (student_id, item_name, subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ScoreRecord {
    pub id: i64,
    pub student_id: String,
    pub item_name: String,
    pub score: f64,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScoreRecord {
    /// Build an in-memory record stamped with the current time
    pub fn new(id: i64, student_id: &str, item_name: &str, score: f64, subject: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            student_id: student_id.to_string(),
            item_name: item_name.to_string(),
            score,
            subject: subject.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Authoritative class membership of a student in a subject.
///
/// Unique on (student_id, subject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RosterEntry {
    pub id: i64,
    pub student_id: String,
    pub name: String,
    pub class: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RosterEntry {
    pub fn new(id: i64, student_id: &str, class: &str, subject: &str) -> Self {
        let now = Utc::now();
        Self {
            id,
            student_id: student_id.to_string(),
            name: String::new(),
            class: class.to_string(),
            subject: subject.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// External identity bound to a roster entry at registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StudentAccount {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub student_id: String,
    /// Class copied from the roster at registration; may be stale
    pub class: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

impl StudentAccount {
    /// Class used for peer statistics.
    ///
    /// The current roster row wins; the registration-time copy is only a
    /// fallback for students who have since been dropped from the roster.
    pub fn current_class<'a>(&'a self, roster: Option<&'a RosterEntry>) -> &'a str {
        match roster {
            Some(entry) if entry.student_id == self.student_id && entry.subject == self.subject => {
                &entry.class
            }
            _ => &self.class,
        }
    }
}

/// Roster row joined with the account bound to it, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct RosterRow {
    pub class: String,
    pub student_id: String,
    pub name: String,
    pub email: Option<String>,
}
