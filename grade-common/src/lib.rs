//! # Grade Report Common Library
//!
//! Shared code for the grade report service:
//! - Column rules for uploaded sheets
//! - CSV ingestion of grade sheets and rosters
//! - Class statistics and per-student reports
//! - Signed session tokens
//! - Configuration loading
//! - SQLite persistence (feature `sqlx`)

pub mod columns;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
