use std::fmt::Write;

use chrono::NaiveDate;

use crate::analysis::{AttendanceAnalysis, ExamAnalysis};
use crate::models::Student;
use crate::prediction::Prediction;
use crate::recommendations::RecommendationList;
use crate::scoring::OverallPerformance;

pub struct ReportInput<'a> {
    pub student: &'a Student,
    pub as_of: NaiveDate,
    pub overall: &'a OverallPerformance,
    pub attendance: &'a AttendanceAnalysis,
    pub exams: &'a ExamAnalysis,
    pub prediction: &'a Prediction,
    pub recommendations: &'a RecommendationList,
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

pub fn build_student_report(input: &ReportInput<'_>) -> String {
    let student = input.student;
    let overall = input.overall;
    let mut output = String::new();

    let _ = writeln!(output, "# Student Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}, {}) as of {}",
        student.full_name(),
        student.student_code,
        student.department,
        input.as_of
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Performance");
    let _ = writeln!(
        output,
        "Score {:.2} ({})",
        overall.overall_score, overall.percentile
    );
    for (label, score) in overall.metrics.labeled() {
        let _ = writeln!(output, "- {}: {:.2}", label, score);
    }
    let _ = writeln!(output, "Strengths: {}", list_or_none(&overall.strengths));
    let _ = writeln!(
        output,
        "Improvement areas: {}",
        list_or_none(&overall.improvement_areas)
    );

    let attendance = input.attendance;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance");
    if attendance.total_classes == 0 {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        let _ = writeln!(
            output,
            "{:.1}% across {} classes ({} present, {} absent, {} excused)",
            attendance.attendance_percentage,
            attendance.total_classes,
            attendance.present_count,
            attendance.absent_count,
            attendance.excused_count
        );
        for (subject, stats) in &attendance.subjects {
            let _ = writeln!(
                output,
                "- {}: {:.1}% of {} classes",
                subject, stats.attendance_percentage, stats.total
            );
        }
    }

    let exams = input.exams;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Exams");
    if exams.total_exams == 0 {
        let _ = writeln!(output, "No exams recorded.");
    } else {
        let _ = writeln!(
            output,
            "Average {:.1}% over {} exams (high {:.1}%, low {:.1}%)",
            exams.average_score, exams.total_exams, exams.highest_score, exams.lowest_score
        );
        for (subject, stats) in &exams.subjects {
            let _ = writeln!(
                output,
                "- {}: average {:.1}% over {} exams",
                subject, stats.average_score, stats.total_exams
            );
        }
    }

    let prediction = input.prediction;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Outlook");
    let _ = writeln!(
        output,
        "Predicted score {:.2}, outlook {:?}, confidence {:.2}% ({:?})",
        prediction.predicted_overall_score,
        prediction.outlook,
        prediction.prediction_confidence.percentage,
        prediction.prediction_confidence.level
    );
    let trends = &prediction.trends;
    for (family, trend) in [
        ("Attendance", &trends.attendance),
        ("Exams", &trends.exams),
        ("Projects", &trends.projects),
    ] {
        let _ = writeln!(output, "- {}: {}", family, trend.description);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    for (index, rec) in input.recommendations.recommendations.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. [{:?}] {}: {}",
            index + 1,
            rec.priority,
            rec.area,
            rec.recommendation
        );
    }

    output
}
