//! Declarative column rules for grade sheets
//!
//! Maps a cleaned, case-insensitive column header to `{ exclude, alias }`.
//! The same table decides which CSV columns are imported as score records,
//! which records are hidden from a student's item list, and which columns
//! carry the student id, class, name or precomputed total.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Byte-order mark left behind by spreadsheet exports
const BOM: char = '\u{feff}';

/// Header used by the grade sheets for the precomputed total
pub const TOTAL_SCORE_COLUMN: &str = "Total learning-progress points";

/// Semantic role of a metadata column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAlias {
    StudentId,
    Class,
    Name,
    /// Precomputed total-score item
    Total,
}

/// One entry of the column table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Header text as it appears in the CSV (matched case-insensitively)
    pub header: String,

    /// Exclude from the displayed item list and from per-item sums
    #[serde(default = "default_exclude")]
    pub exclude: bool,

    #[serde(default)]
    pub alias: Option<ColumnAlias>,
}

fn default_exclude() -> bool {
    true
}

impl ColumnRule {
    pub fn excluded(header: &str) -> Self {
        Self {
            header: header.to_string(),
            exclude: true,
            alias: None,
        }
    }

    pub fn alias(header: &str, alias: ColumnAlias) -> Self {
        Self {
            header: header.to_string(),
            exclude: true,
            alias: Some(alias),
        }
    }
}

/// Strip BOM artifacts and surrounding whitespace from a header
pub fn clean_header(header: &str) -> String {
    header.replace(BOM, "").trim().to_string()
}

fn normalize(header: &str) -> String {
    clean_header(header).to_lowercase()
}

/// Lookup table keyed by normalized header
#[derive(Debug, Clone)]
pub struct ColumnRules {
    rules: HashMap<String, ColumnRule>,
}

impl ColumnRules {
    /// Build a table; later rules replace earlier ones with the same header
    pub fn new(rules: impl IntoIterator<Item = ColumnRule>) -> Self {
        let mut table = Self {
            rules: HashMap::new(),
        };
        table.extend(rules);
        table
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = ColumnRule>) {
        for rule in rules {
            self.rules.insert(normalize(&rule.header), rule);
        }
    }

    /// Default table plus configured overrides
    pub fn with_overrides(overrides: &[ColumnRule]) -> Self {
        let mut table = Self::default();
        table.extend(overrides.iter().cloned());
        table
    }

    pub fn rule(&self, header: &str) -> Option<&ColumnRule> {
        self.rules.get(&normalize(header))
    }

    /// True for metadata columns that are not scorable items
    pub fn is_excluded(&self, header: &str) -> bool {
        self.rule(header).map(|r| r.exclude).unwrap_or(false)
    }

    /// True for columns stored as score records on import.
    ///
    /// The total column is stored even though it is excluded, so the
    /// statistics engine can prefer it over summing items.
    pub fn is_importable(&self, header: &str) -> bool {
        match self.rule(header) {
            None => true,
            Some(rule) => !rule.exclude || rule.alias == Some(ColumnAlias::Total),
        }
    }

    pub fn alias_of(&self, header: &str) -> Option<ColumnAlias> {
        self.rule(header).and_then(|r| r.alias)
    }

    pub fn is_total(&self, header: &str) -> bool {
        self.alias_of(header) == Some(ColumnAlias::Total)
    }

    /// Index of the first header carrying `alias`
    pub fn find_column<S: AsRef<str>>(&self, headers: &[S], alias: ColumnAlias) -> Option<usize> {
        headers
            .iter()
            .position(|h| self.alias_of(h.as_ref()) == Some(alias))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ColumnRules {
    fn default() -> Self {
        use ColumnAlias::*;

        Self::new([
            ColumnRule::alias("ID", StudentId),
            ColumnRule::alias("Student ID", StudentId),
            ColumnRule::alias("student_id", StudentId),
            ColumnRule::alias("學號", StudentId),
            ColumnRule::alias("Class", Class),
            ColumnRule::alias("班級", Class),
            ColumnRule::alias("Name", Name),
            ColumnRule::alias("姓名", Name),
            ColumnRule::excluded("No."),
            ColumnRule::excluded("No"),
            ColumnRule::excluded("Grade"),
            ColumnRule::excluded("Weight of final exam (%)"),
            ColumnRule::alias(TOTAL_SCORE_COLUMN, Total),
        ])
    }
}
