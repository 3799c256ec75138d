//! Per-student grade statistics
//!
//! Pure computation over records that were already fetched: class totals,
//! mean, population standard deviation, rank, percentile, top-3 and the
//! weight still open for the final exam. Nothing here touches the database
//! and nothing here can fail; an empty class degrades to zeros.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::columns::ColumnRules;
use crate::models::{RosterEntry, ScoreRecord};

/// Number of leading totals reported
pub const TOP_N: usize = 3;

/// Percentile cap used by [`PercentilePolicy::Capped`]
pub const PERCENTILE_CAP: u32 = 99;

/// How rank is turned into a percentile.
///
/// Two behaviours were in use over time; both are kept selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentilePolicy {
    /// `floor(rank / count * 100)` capped at 99; a class of one (or none) is 99
    #[default]
    Capped,
    /// `floor(rank / count * 100)` uncapped; a class of one is 100, none is 0
    Uncapped,
}

impl PercentilePolicy {
    pub fn percentile(self, rank: usize, count: usize) -> u32 {
        match self {
            PercentilePolicy::Capped => {
                if count > 1 {
                    floor_percent(rank, count).min(PERCENTILE_CAP)
                } else {
                    PERCENTILE_CAP
                }
            }
            PercentilePolicy::Uncapped => match count {
                0 => 0,
                1 => 100,
                _ => floor_percent(rank, count),
            },
        }
    }
}

impl fmt::Display for PercentilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercentilePolicy::Capped => write!(f, "capped"),
            PercentilePolicy::Uncapped => write!(f, "uncapped"),
        }
    }
}

impl FromStr for PercentilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "capped" => Ok(PercentilePolicy::Capped),
            "uncapped" => Ok(PercentilePolicy::Uncapped),
            other => Err(format!("unknown percentile policy: {other}")),
        }
    }
}

// Integer floor avoids 29/100*100 = 28.999..
fn floor_percent(rank: usize, count: usize) -> u32 {
    ((rank as u64 * 100) / count as u64) as u32
}

/// Knobs of the statistics engine taken from application config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSettings {
    pub percentile_policy: PercentilePolicy,
    /// Score ceiling; the remaining weight is `full_marks - total`
    pub full_marks: f64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            percentile_policy: PercentilePolicy::Capped,
            full_marks: 100.0,
        }
    }
}

/// Aggregated score of one class member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentTotal {
    pub student_id: String,
    pub total: f64,
}

/// Output of the statistics engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStatistics {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub my_total: f64,
    /// Number of peers strictly below the caller
    pub rank: usize,
    pub percentile: u32,
    /// Largest totals, descending
    pub top3: Vec<f64>,
    pub final_weight: f64,
}

/// Compute class statistics for one caller.
///
/// `totals` holds one total per class member (the caller included when the
/// caller has scores).
pub fn compute_class_statistics(
    totals: &[f64],
    caller_total: f64,
    settings: StatsSettings,
) -> ClassStatistics {
    let count = totals.len();

    let mut sorted = totals.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(lo), Some(hi)) => (*lo, *hi),
        _ => (0.0, 0.0),
    };

    // Equal totals are reported exactly; rounding in the sum must not push
    // the mean outside [min, max] or leave a residual deviation.
    let (mean, std_dev) = if count == 0 || min == max {
        (min, 0.0)
    } else {
        let mean = (sorted.iter().sum::<f64>() / count as f64).clamp(min, max);
        let variance = sorted.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / count as f64;
        (mean, variance.sqrt())
    };

    let rank = sorted
        .iter()
        .position(|t| *t >= caller_total)
        .unwrap_or(count);

    let top3 = sorted.iter().rev().take(TOP_N).copied().collect();

    ClassStatistics {
        count,
        mean,
        std_dev,
        min,
        max,
        my_total: caller_total,
        rank,
        percentile: settings.percentile_policy.percentile(rank, count),
        top3,
        final_weight: (settings.full_marks - caller_total).max(0.0),
    }
}

/// Build one total per student present in `records`.
///
/// When every student has a precomputed total item, those are used as-is;
/// otherwise the non-excluded items are summed for everyone. Students are
/// returned ordered by id.
pub fn class_totals<'a, I>(records: I, rules: &ColumnRules) -> Vec<StudentTotal>
where
    I: IntoIterator<Item = &'a ScoreRecord>,
{
    #[derive(Default)]
    struct Acc {
        item_sum: f64,
        precomputed: Option<f64>,
    }

    let mut by_student: BTreeMap<&str, Acc> = BTreeMap::new();
    for record in records {
        let acc = by_student.entry(record.student_id.as_str()).or_default();
        if rules.is_total(&record.item_name) {
            acc.precomputed = Some(record.score);
        } else if !rules.is_excluded(&record.item_name) {
            acc.item_sum += record.score;
        }
    }

    let use_precomputed =
        !by_student.is_empty() && by_student.values().all(|acc| acc.precomputed.is_some());

    by_student
        .into_iter()
        .map(|(student_id, acc)| StudentTotal {
            student_id: student_id.to_string(),
            total: match acc.precomputed {
                Some(total) if use_precomputed => total,
                _ => acc.item_sum,
            },
        })
        .collect()
}

/// Who is asking and which peer group applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    pub subject: String,
    pub student_id: String,
    /// Current roster class of the student
    pub class: String,
}

/// Everything a grade report page shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeReport {
    pub subject: String,
    pub student_id: String,
    pub class: String,
    /// The caller's own displayable items, in record order
    pub items: Vec<ScoreRecord>,
    pub statistics: ClassStatistics,
}

/// Assemble the grade report for one student.
///
/// `records` may be any superset of the class (e.g. the whole subject): only
/// records of `request.subject` whose student is on the roster of
/// `request.class` in that subject take part in the statistics.
pub fn build_grade_report(
    request: &ReportRequest,
    records: &[ScoreRecord],
    roster: &[RosterEntry],
    rules: &ColumnRules,
    settings: StatsSettings,
) -> GradeReport {
    let members: HashSet<&str> = roster
        .iter()
        .filter(|r| r.subject == request.subject && r.class == request.class)
        .map(|r| r.student_id.as_str())
        .collect();

    let class_records = records
        .iter()
        .filter(|r| r.subject == request.subject && members.contains(r.student_id.as_str()));

    let totals = class_totals(class_records, rules);
    let caller_total = totals
        .iter()
        .find(|t| t.student_id == request.student_id)
        .map(|t| t.total)
        .unwrap_or(0.0);
    let values: Vec<f64> = totals.iter().map(|t| t.total).collect();

    let mut items: Vec<ScoreRecord> = records
        .iter()
        .filter(|r| {
            r.subject == request.subject
                && r.student_id == request.student_id
                && !rules.is_excluded(&r.item_name)
        })
        .cloned()
        .collect();
    items.sort_by_key(|r| r.id);

    GradeReport {
        subject: request.subject.clone(),
        student_id: request.student_id.clone(),
        class: request.class.clone(),
        items,
        statistics: compute_class_statistics(&values, caller_total, settings),
    }
}
