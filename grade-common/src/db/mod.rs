//! SQLite persistence for score records, rosters and accounts

pub mod accounts;
pub mod grades;
pub mod init;
pub mod rosters;
pub mod settings;

pub use accounts::*;
pub use grades::*;
pub use init::*;
pub use rosters::*;
pub use settings::*;

/// True when `err` is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
