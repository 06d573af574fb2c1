use indexmap::IndexMap;
use serde::Serialize;

use crate::models::{AttendanceRecord, AttendanceStatus, ExamResult};
use crate::scoring::normalized;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubjectAttendance {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub excused: usize,
    pub attendance_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceAnalysis {
    pub total_classes: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub excused_count: usize,
    pub attendance_percentage: f64,
    pub subjects: IndexMap<String, SubjectAttendance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubjectExamStats {
    pub total_exams: usize,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExamAnalysis {
    pub total_exams: usize,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub subjects: IndexMap<String, SubjectExamStats>,
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn analyze_attendance(records: &[AttendanceRecord]) -> AttendanceAnalysis {
    let mut analysis = AttendanceAnalysis::default();

    for record in records {
        let subject = analysis
            .subjects
            .entry(record.subject.clone())
            .or_default();
        subject.total += 1;
        analysis.total_classes += 1;

        match record.status {
            AttendanceStatus::Present => {
                subject.present += 1;
                analysis.present_count += 1;
            }
            AttendanceStatus::Absent => {
                subject.absent += 1;
                analysis.absent_count += 1;
            }
            AttendanceStatus::Excused => {
                subject.excused += 1;
                analysis.excused_count += 1;
            }
        }
    }

    for subject in analysis.subjects.values_mut() {
        subject.attendance_percentage = percentage(subject.present, subject.total);
    }
    analysis.attendance_percentage = percentage(analysis.present_count, analysis.total_classes);
    analysis
}

fn summarize(scores: &[f64]) -> (f64, f64, f64) {
    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    let highest = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lowest = scores.iter().copied().fold(f64::INFINITY, f64::min);
    (average, highest, lowest)
}

/// Normalized exam scores grouped by subject, in first-seen subject order.
pub fn scores_by_subject(exams: &[ExamResult]) -> IndexMap<String, Vec<f64>> {
    let mut subjects: IndexMap<String, Vec<f64>> = IndexMap::new();
    for exam in exams {
        subjects
            .entry(exam.subject.clone())
            .or_default()
            .push(normalized(exam.score, exam.max_score));
    }
    subjects
}

pub fn analyze_exams(exams: &[ExamResult]) -> ExamAnalysis {
    if exams.is_empty() {
        return ExamAnalysis::default();
    }

    let scores: Vec<f64> = exams
        .iter()
        .map(|e| normalized(e.score, e.max_score))
        .collect();
    let (average_score, highest_score, lowest_score) = summarize(&scores);

    let subjects = scores_by_subject(exams)
        .into_iter()
        .map(|(subject, scores)| {
            let (average_score, highest_score, lowest_score) = summarize(&scores);
            let stats = SubjectExamStats {
                total_exams: scores.len(),
                average_score,
                highest_score,
                lowest_score,
            };
            (subject, stats)
        })
        .collect();

    ExamAnalysis {
        total_exams: exams.len(),
        average_score,
        highest_score,
        lowest_score,
        subjects,
    }
}
