//! CSV ingestion for grade sheets and rosters
//!
//! Turns uploaded CSV bytes into normalized upsert rows. Persisting them is
//! the job of [`crate::db`].

use serde::Serialize;
use std::collections::HashSet;

use crate::columns::{clean_header, ColumnAlias, ColumnRules};
use crate::{Error, Result};

/// Roster column positions used when the header names neither column
const DEFAULT_CLASS_INDEX: usize = 1;
const DEFAULT_ID_INDEX: usize = 2;

/// One score to insert or overwrite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreUpsert {
    pub student_id: String,
    pub item_name: String,
    pub score: f64,
}

/// Parsed grade sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradeSheet {
    pub upserts: Vec<ScoreUpsert>,
    /// Data rows whose student is not on the roster
    pub skipped_rows: usize,
}

impl GradeSheet {
    pub fn imported(&self) -> usize {
        self.upserts.len()
    }
}

/// One roster row to insert or overwrite
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterUpsert {
    pub student_id: String,
    pub class: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterSheet {
    pub entries: Vec<RosterUpsert>,
}

fn read_records(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn clean_headers(row: &[String]) -> Vec<String> {
    row.iter().map(|h| clean_header(h)).collect()
}

/// Parse a cell as a score.
///
/// `None` for blank and `NaN` cells; anything else unparsable counts as 0.
fn parse_score(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return None;
    }
    Some(cell.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0))
}

/// Parse an uploaded grade sheet.
///
/// Rows for students missing from `roster_ids` are skipped and counted.
pub fn parse_grade_sheet(
    bytes: &[u8],
    rules: &ColumnRules,
    roster_ids: &HashSet<String>,
) -> Result<GradeSheet> {
    let records = read_records(bytes)?;
    if records.len() < 2 {
        return Err(Error::InvalidInput("grade sheet has no data rows".to_string()));
    }

    let headers = clean_headers(&records[0]);
    let id_index = rules
        .find_column(&headers, ColumnAlias::StudentId)
        .ok_or_else(|| {
            Error::InvalidInput(format!(
                "no student ID column found; detected headers: {:?}",
                headers
            ))
        })?;

    let mut sheet = GradeSheet::default();
    for row in records.iter().skip(1) {
        let Some(student_id) = row.get(id_index).map(|s| s.trim()) else {
            continue;
        };
        if student_id.is_empty() {
            continue;
        }
        if !roster_ids.contains(student_id) {
            sheet.skipped_rows += 1;
            continue;
        }

        for (col, cell) in row.iter().enumerate() {
            let Some(item_name) = headers.get(col) else {
                continue;
            };
            if item_name.is_empty() || !rules.is_importable(item_name) {
                continue;
            }
            if let Some(score) = parse_score(cell) {
                sheet.upserts.push(ScoreUpsert {
                    student_id: student_id.to_string(),
                    item_name: item_name.clone(),
                    score,
                });
            }
        }
    }

    Ok(sheet)
}

/// Parse an uploaded roster.
///
/// Without a recognizable header the class is read from column 1 and the
/// student id from column 2.
pub fn parse_roster(bytes: &[u8], rules: &ColumnRules) -> Result<RosterSheet> {
    let records = read_records(bytes)?;
    let Some(header_row) = records.first() else {
        return Err(Error::InvalidInput("roster is empty".to_string()));
    };

    let headers = clean_headers(header_row);
    let class_index = rules
        .find_column(&headers, ColumnAlias::Class)
        .unwrap_or(DEFAULT_CLASS_INDEX);
    let id_index = rules
        .find_column(&headers, ColumnAlias::StudentId)
        .unwrap_or(DEFAULT_ID_INDEX);
    let name_index = rules.find_column(&headers, ColumnAlias::Name);

    let mut sheet = RosterSheet::default();
    for row in records.iter().skip(1) {
        if row.len() <= id_index || row.len() <= class_index {
            continue;
        }
        let student_id = row[id_index].trim();
        if student_id.is_empty() {
            continue;
        }
        let name = name_index
            .and_then(|i| row.get(i))
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        sheet.entries.push(RosterUpsert {
            student_id: student_id.to_string(),
            class: row[class_index].trim().to_string(),
            name,
        });
    }

    Ok(sheet)
}
