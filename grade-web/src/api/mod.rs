//! HTTP handlers for grade-web

pub mod auth;
pub mod session;
pub mod status;
pub mod student;
pub mod teacher;
pub mod ui;

pub use auth::{auth_callback, login, logout};
pub use status::{build_info, health};
pub use student::{index, my_grades, my_grades_json, register, show_register};
pub use teacher::{
    dashboard, delete_all_grades, delete_grade, delete_roster, upload_grades, upload_roster,
};
