use serde::Serialize;

use crate::models::{AttendanceRecord, Certification, ExamResult, PerformanceMetric, Project};

pub const STRENGTH_THRESHOLD: f64 = 85.0;
pub const WEAKNESS_THRESHOLD: f64 = 70.0;
const POINTS_PER_CERTIFICATION: f64 = 20.0;

/// Relative weight of each metric family in a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub attendance: f64,
    pub exams: f64,
    pub projects: f64,
    pub certifications: f64,
    pub other_metrics: f64,
}

/// Shared by the current and the projected overall score. Must sum to 1.0.
pub const WEIGHTS: ScoreWeights = ScoreWeights {
    attendance: 0.15,
    exams: 0.40,
    projects: 0.20,
    certifications: 0.10,
    other_metrics: 0.15,
};

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.attendance + self.exams + self.projects + self.certifications + self.other_metrics
    }

    pub fn combine(&self, scores: &ScoreBreakdown) -> f64 {
        self.attendance * scores.attendance
            + self.exams * scores.exams
            + self.projects * scores.projects
            + self.certifications * scores.certifications
            + self.other_metrics * scores.other_metrics
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub attendance: f64,
    pub exams: f64,
    pub projects: f64,
    pub certifications: f64,
    pub other_metrics: f64,
}

impl ScoreBreakdown {
    /// Display label paired with each score, in reporting order.
    pub fn labeled(&self) -> [(&'static str, f64); 5] {
        [
            ("Attendance", self.attendance),
            ("Exams", self.exams),
            ("Projects", self.projects),
            ("Certifications", self.certifications),
            ("Other Activities", self.other_metrics),
        ]
    }

    fn rounded(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            attendance: round2(self.attendance),
            exams: round2(self.exams),
            projects: round2(self.projects),
            certifications: round2(self.certifications),
            other_metrics: round2(self.other_metrics),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallPerformance {
    pub overall_score: f64,
    pub metrics: ScoreBreakdown,
    pub strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
    pub percentile: &'static str,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// Max scores are validated at ingestion; zero is not re-checked here.
pub fn normalized(score: f64, max_score: f64) -> f64 {
    score / max_score * 100.0
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

pub fn attendance_score(records: &[AttendanceRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let present = records.iter().filter(|r| r.is_present()).count();
    present as f64 / records.len() as f64 * 100.0
}

pub fn exam_score(exams: &[ExamResult]) -> f64 {
    mean(exams.iter().map(|e| normalized(e.score, e.max_score)))
}

/// Ungraded projects are left out of both the sum and the count.
pub fn project_score(projects: &[Project]) -> f64 {
    mean(
        projects
            .iter()
            .filter_map(Project::graded)
            .map(|(grade, max_grade)| normalized(grade, max_grade)),
    )
}

pub fn certification_score(count: usize) -> f64 {
    (count as f64 * POINTS_PER_CERTIFICATION).min(100.0)
}

pub fn other_metrics_score(metrics: &[PerformanceMetric]) -> f64 {
    mean(
        metrics
            .iter()
            .filter(|m| m.is_other_activity())
            .map(|m| normalized(m.score, m.max_score)),
    )
}

pub fn percentile_band(score: f64) -> &'static str {
    if score >= 90.0 {
        "90-100 (Top 10%)"
    } else if score >= 80.0 {
        "80-90 (Top 20%)"
    } else if score >= 70.0 {
        "70-80 (Top 30%)"
    } else if score >= 60.0 {
        "60-70 (Top 40%)"
    } else {
        "Below 60"
    }
}

pub fn score_breakdown(
    metrics: &[PerformanceMetric],
    attendance: &[AttendanceRecord],
    exams: &[ExamResult],
    certifications: &[Certification],
    projects: &[Project],
) -> ScoreBreakdown {
    ScoreBreakdown {
        attendance: attendance_score(attendance),
        exams: exam_score(exams),
        projects: project_score(projects),
        certifications: certification_score(certifications.len()),
        other_metrics: other_metrics_score(metrics),
    }
}

pub fn compute_overall_performance(
    metrics: &[PerformanceMetric],
    attendance: &[AttendanceRecord],
    exams: &[ExamResult],
    certifications: &[Certification],
    projects: &[Project],
) -> OverallPerformance {
    let breakdown = score_breakdown(metrics, attendance, exams, certifications, projects);
    let overall = WEIGHTS.combine(&breakdown);

    let strengths = breakdown
        .labeled()
        .iter()
        .filter(|(_, score)| *score >= STRENGTH_THRESHOLD)
        .map(|(label, _)| label.to_string())
        .collect();
    let improvement_areas = breakdown
        .labeled()
        .iter()
        .filter(|(_, score)| *score < WEAKNESS_THRESHOLD)
        .map(|(label, _)| label.to_string())
        .collect();

    let percentile = percentile_band(overall);
    tracing::debug!(overall, percentile, "computed overall performance");

    OverallPerformance {
        overall_score: round2(overall),
        metrics: breakdown.rounded(),
        strengths,
        improvement_areas,
        percentile,
    }
}
