use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{
    AttendanceRecord, Certification, ExamResult, PerformanceMetric, Project, Student,
};
use crate::scoring::{self, round2, ScoreBreakdown, WEIGHTS};
use crate::trends::{self, TrendResult};

pub const ATTENDANCE_WINDOW_DAYS: i64 = 90;
pub const EXAM_WINDOW_DAYS: i64 = 180;
pub const PROJECT_WINDOW_DAYS: i64 = 365;

/// Other activities are not projected from history.
pub const PROJECTED_OTHER_METRICS: f64 = 70.0;

const PROJECTION_STEPS: f64 = 2.0;

const MIN_ATTENDANCE_RECORDS: f64 = 10.0;
const MIN_EXAMS: f64 = 3.0;
const MIN_PROJECTS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outlook {
    Positive,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confidence {
    pub percentage: f64,
    pub level: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedScores {
    pub attendance: f64,
    pub exams: f64,
    pub projects: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyTrends {
    pub attendance: TrendResult,
    pub exams: TrendResult,
    pub projects: TrendResult,
}

impl FamilyTrends {
    fn slopes(&self) -> [f64; 3] {
        [
            self.attendance.trend,
            self.exams.trend,
            self.projects.trend,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted_overall_score: f64,
    pub predicted_metrics: ProjectedScores,
    pub trends: FamilyTrends,
    pub outlook: Outlook,
    pub prediction_confidence: Confidence,
}

fn window_start(as_of: NaiveDate, days: i64) -> NaiveDate {
    as_of - Duration::days(days)
}

/// Records on or after the cutoff, or every record when none are that recent.
fn recent_or_all<'a, T>(
    records: &'a [T],
    cutoff: NaiveDate,
    date_of: impl Fn(&T) -> NaiveDate,
) -> Vec<&'a T> {
    let recent: Vec<&T> = records.iter().filter(|r| date_of(*r) >= cutoff).collect();
    if recent.is_empty() {
        records.iter().collect()
    } else {
        recent
    }
}

fn owned<T: Clone>(records: Vec<&T>) -> Vec<T> {
    records.into_iter().cloned().collect()
}

pub fn current_attendance(records: &[AttendanceRecord], as_of: NaiveDate) -> f64 {
    let cutoff = window_start(as_of, ATTENDANCE_WINDOW_DAYS);
    scoring::attendance_score(&owned(recent_or_all(records, cutoff, |r| r.date)))
}

pub fn current_exam_score(exams: &[ExamResult], as_of: NaiveDate) -> f64 {
    let cutoff = window_start(as_of, EXAM_WINDOW_DAYS);
    scoring::exam_score(&owned(recent_or_all(exams, cutoff, |e| e.date)))
}

pub fn current_project_score(projects: &[Project], as_of: NaiveDate) -> f64 {
    let graded: Vec<Project> = projects
        .iter()
        .filter(|p| p.graded().is_some())
        .cloned()
        .collect();
    let cutoff = window_start(as_of, PROJECT_WINDOW_DAYS);
    scoring::project_score(&owned(recent_or_all(&graded, cutoff, Project::reference_date)))
}

/// Two-step linear extrapolation, clamped to the score range.
pub fn project_metric(current: f64, trend: f64) -> f64 {
    (current + trend * PROJECTION_STEPS).clamp(0.0, 100.0)
}

pub fn outlook(slopes: &[f64]) -> Outlook {
    if slopes.iter().all(|&s| s >= 0.0) {
        Outlook::Positive
    } else if slopes.iter().all(|&s| s <= 0.0) {
        Outlook::Negative
    } else {
        Outlook::Mixed
    }
}

pub fn prediction_confidence(
    attendance_count: usize,
    exam_count: usize,
    project_count: usize,
) -> Confidence {
    let ratio = |count: usize, minimum: f64| (count as f64 / minimum).min(1.0);
    let overall = 0.4 * ratio(attendance_count, MIN_ATTENDANCE_RECORDS)
        + 0.4 * ratio(exam_count, MIN_EXAMS)
        + 0.2 * ratio(project_count, MIN_PROJECTS);
    let percentage = overall * 100.0;

    let level = if percentage >= 80.0 {
        ConfidenceLevel::High
    } else if percentage >= 50.0 {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };

    Confidence {
        percentage: round2(percentage),
        level,
    }
}

pub fn predict_future_performance(
    student: &Student,
    metrics: &[PerformanceMetric],
    attendance: &[AttendanceRecord],
    exams: &[ExamResult],
    certifications: &[Certification],
    projects: &[Project],
) -> Prediction {
    predict_future_performance_on(
        Utc::now().date_naive(),
        student,
        metrics,
        attendance,
        exams,
        certifications,
        projects,
    )
}

pub fn predict_future_performance_on(
    as_of: NaiveDate,
    student: &Student,
    _metrics: &[PerformanceMetric],
    attendance: &[AttendanceRecord],
    exams: &[ExamResult],
    certifications: &[Certification],
    projects: &[Project],
) -> Prediction {
    let trends = FamilyTrends {
        attendance: trends::analyze_attendance_trend(attendance),
        exams: trends::analyze_exam_trend(exams),
        projects: trends::analyze_project_trend(projects),
    };

    let projected = ProjectedScores {
        attendance: project_metric(
            current_attendance(attendance, as_of),
            trends.attendance.trend,
        ),
        exams: project_metric(current_exam_score(exams, as_of), trends.exams.trend),
        projects: project_metric(
            current_project_score(projects, as_of),
            trends.projects.trend,
        ),
    };

    let predicted_overall = WEIGHTS.combine(&ScoreBreakdown {
        attendance: projected.attendance,
        exams: projected.exams,
        projects: projected.projects,
        certifications: scoring::certification_score(certifications.len()),
        other_metrics: PROJECTED_OTHER_METRICS,
    });

    let outlook = outlook(&trends.slopes());
    let confidence = prediction_confidence(attendance.len(), exams.len(), projects.len());
    tracing::debug!(
        student = %student.student_code,
        %as_of,
        predicted_overall,
        ?outlook,
        confidence = confidence.percentage,
        "projected future performance"
    );

    Prediction {
        predicted_overall_score: round2(predicted_overall),
        predicted_metrics: ProjectedScores {
            attendance: round2(projected.attendance),
            exams: round2(projected.exams),
            projects: round2(projected.projects),
        },
        trends,
        outlook,
        prediction_confidence: confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
    }

    fn days_ago(days: i64) -> NaiveDate {
        as_of() - Duration::days(days)
    }

    fn student() -> Student {
        Student {
            id: Uuid::nil(),
            student_code: "S1001".to_string(),
            first_name: "Amara".to_string(),
            last_name: "Okafor".to_string(),
            email: "amara.okafor@example.edu".to_string(),
            department: "Computer Science".to_string(),
            year_of_study: 2,
            semester: 1,
        }
    }

    fn attendance(days: i64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id: Uuid::nil(),
            subject: "Networks".to_string(),
            date: days_ago(days),
            status,
        }
    }

    fn exam(days: i64, score: f64) -> ExamResult {
        ExamResult {
            student_id: Uuid::nil(),
            subject: "Networks".to_string(),
            exam_type: "final".to_string(),
            score,
            max_score: 100.0,
            date: days_ago(days),
        }
    }

    fn project(start_days: i64, end_days: Option<i64>, grade: Option<f64>) -> Project {
        Project {
            student_id: Uuid::nil(),
            title: "Router".to_string(),
            start_date: days_ago(start_days),
            end_date: end_days.map(days_ago),
            grade,
            max_grade: Some(100.0),
            subject: None,
        }
    }

    #[test]
    fn current_scores_use_recency_windows() {
        let records = vec![
            attendance(200, AttendanceStatus::Absent),
            attendance(10, AttendanceStatus::Present),
        ];
        assert_eq!(current_attendance(&records, as_of()), 100.0);

        let exams = vec![exam(400, 20.0), exam(30, 90.0), exam(180, 70.0)];
        assert!((current_exam_score(&exams, as_of()) - 80.0).abs() < 1e-9);
    }

    #[test]
    fn current_scores_fall_back_to_full_history() {
        let records = vec![
            attendance(200, AttendanceStatus::Absent),
            attendance(300, AttendanceStatus::Present),
        ];
        assert_eq!(current_attendance(&records, as_of()), 50.0);
        assert!((current_exam_score(&[exam(500, 40.0)], as_of()) - 40.0).abs() < 1e-9);
        assert_eq!(current_attendance(&[], as_of()), 0.0);
    }

    #[test]
    fn current_project_score_dates_by_end_date() {
        let projects = vec![
            // Started long ago but finished recently: counts as recent.
            project(600, Some(20), Some(90.0)),
            project(500, None, Some(50.0)),
            project(10, None, None),
        ];
        assert!((current_project_score(&projects, as_of()) - 90.0).abs() < 1e-9);

        let old = vec![project(600, None, Some(60.0)), project(700, None, Some(80.0))];
        assert!((current_project_score(&old, as_of()) - 70.0).abs() < 1e-9);
        assert_eq!(current_project_score(&[project(5, None, None)], as_of()), 0.0);
    }

    #[test]
    fn projection_is_clamped() {
        assert_eq!(project_metric(95.0, 10.0), 100.0);
        assert_eq!(project_metric(5.0, -10.0), 0.0);
        assert_eq!(project_metric(60.0, 2.5), 65.0);
    }

    #[test]
    fn outlook_prefers_positive_when_all_flat() {
        assert_eq!(outlook(&[0.0, 0.0, 0.0]), Outlook::Positive);
        assert_eq!(outlook(&[1.0, 0.0, 3.0]), Outlook::Positive);
        assert_eq!(outlook(&[-1.0, 0.0, -3.0]), Outlook::Negative);
        assert_eq!(outlook(&[-1.0, 0.0, 3.0]), Outlook::Mixed);
    }

    #[test]
    fn confidence_scales_with_data_volume() {
        let full = prediction_confidence(10, 3, 2);
        assert_eq!(full.percentage, 100.0);
        assert_eq!(full.level, ConfidenceLevel::High);

        let capped = prediction_confidence(50, 30, 20);
        assert_eq!(capped.percentage, 100.0);

        let medium = prediction_confidence(5, 3, 0);
        assert_eq!(medium.percentage, 60.0);
        assert_eq!(medium.level, ConfidenceLevel::Medium);

        let low = prediction_confidence(0, 1, 0);
        assert!((low.percentage - 13.33).abs() < 1e-9);
        assert_eq!(low.level, ConfidenceLevel::Low);
    }

    #[test]
    fn prediction_without_history_uses_placeholders() {
        let prediction =
            predict_future_performance_on(as_of(), &student(), &[], &[], &[], &[], &[]);
        // Only the constant other-activities placeholder contributes.
        assert_eq!(prediction.predicted_overall_score, 10.5);
        assert_eq!(prediction.outlook, Outlook::Positive);
        assert_eq!(prediction.prediction_confidence.level, ConfidenceLevel::Low);
        assert_eq!(prediction.trends.exams, TrendResult::insufficient());
    }

    #[test]
    fn prediction_recombines_with_shared_weights() {
        let exams = vec![exam(60, 60.0), exam(30, 70.0), exam(5, 90.0)];
        let attendance: Vec<AttendanceRecord> = (0..10)
            .map(|i| attendance(i * 3, AttendanceStatus::Present))
            .collect();
        let prediction =
            predict_future_performance_on(as_of(), &student(), &[], &attendance, &exams, &[], &[]);

        // Exam slope (90 - 60) / 3 = 10, current 73.33, projected 93.33.
        assert!((prediction.predicted_metrics.exams - 93.33).abs() < 1e-9);
        assert_eq!(prediction.predicted_metrics.attendance, 100.0);
        assert_eq!(prediction.trends.exams.description, "Strongly improving");
        assert_eq!(prediction.outlook, Outlook::Positive);

        let expected = 0.15 * 100.0 + 0.40 * (220.0 / 3.0 + 20.0) + 0.15 * 70.0;
        assert!((prediction.predicted_overall_score - round2(expected)).abs() < 1e-9);
        assert_eq!(prediction.prediction_confidence.percentage, 80.0);
        assert_eq!(prediction.prediction_confidence.level, ConfidenceLevel::High);
    }

    #[test]
    fn prediction_serializes_labels_verbatim() {
        let prediction =
            predict_future_performance_on(as_of(), &student(), &[], &[], &[], &[], &[]);
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["outlook"], "Positive");
        assert_eq!(json["prediction_confidence"]["level"], "Low");
    }

    proptest! {
        #[test]
        fn projected_value_stays_in_range(current in 0.0f64..=100.0, trend in -500.0f64..500.0) {
            let projected = project_metric(current, trend);
            prop_assert!((0.0..=100.0).contains(&projected));
        }
    }
}
