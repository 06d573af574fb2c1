use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::models::{AttendanceRecord, ExamResult, Project};
use crate::scoring::normalized;

const ATTENDANCE_STRONG_SLOPE: f64 = 2.0;
const SCORE_STRONG_SLOPE: f64 = 5.0;

pub const INSUFFICIENT_DATA: &str = "Insufficient data";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub trend: f64,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_points: Option<usize>,
}

impl TrendResult {
    pub fn insufficient() -> Self {
        TrendResult {
            trend: 0.0,
            description: INSUFFICIENT_DATA,
            data_points: None,
        }
    }

    // (last - first) / points, not a regression.
    fn from_series(series: &[f64], strong: f64) -> Self {
        match (series.first(), series.last()) {
            (Some(first), Some(last)) if series.len() >= 2 => {
                let trend = (last - first) / series.len() as f64;
                TrendResult {
                    trend,
                    description: describe(trend, strong),
                    data_points: Some(series.len()),
                }
            }
            _ => TrendResult::insufficient(),
        }
    }
}

pub fn describe(trend: f64, strong: f64) -> &'static str {
    if trend > strong {
        "Strongly improving"
    } else if trend > 0.0 {
        "Slightly improving"
    } else if trend == 0.0 {
        "Stable"
    } else if trend > -strong {
        "Slightly declining"
    } else {
        "Strongly declining"
    }
}

pub fn analyze_attendance_trend(records: &[AttendanceRecord]) -> TrendResult {
    if records.len() < 2 {
        return TrendResult::insufficient();
    }

    // (present, total) per (year, month); BTreeMap keeps months chronological.
    let mut months: BTreeMap<(i32, u32), (usize, usize)> = BTreeMap::new();
    for record in records {
        let bucket = months
            .entry((record.date.year(), record.date.month()))
            .or_insert((0, 0));
        if record.is_present() {
            bucket.0 += 1;
        }
        bucket.1 += 1;
    }

    let monthly: Vec<f64> = months
        .values()
        .map(|&(present, total)| present as f64 / total as f64 * 100.0)
        .collect();
    TrendResult::from_series(&monthly, ATTENDANCE_STRONG_SLOPE)
}

pub fn analyze_exam_trend(exams: &[ExamResult]) -> TrendResult {
    if exams.len() < 2 {
        return TrendResult::insufficient();
    }

    let mut sorted: Vec<&ExamResult> = exams.iter().collect();
    sorted.sort_by_key(|e| e.date);
    let scores: Vec<f64> = sorted
        .iter()
        .map(|e| normalized(e.score, e.max_score))
        .collect();
    TrendResult::from_series(&scores, SCORE_STRONG_SLOPE)
}

pub fn analyze_project_trend(projects: &[Project]) -> TrendResult {
    let mut graded: Vec<(chrono::NaiveDate, f64)> = projects
        .iter()
        .filter_map(|p| {
            p.graded()
                .map(|(grade, max_grade)| (p.reference_date(), normalized(grade, max_grade)))
        })
        .collect();
    if graded.len() < 2 {
        return TrendResult::insufficient();
    }

    graded.sort_by_key(|&(date, _)| date);
    let scores: Vec<f64> = graded.into_iter().map(|(_, score)| score).collect();
    TrendResult::from_series(&scores, SCORE_STRONG_SLOPE)
}
