use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const OTHER_METRIC_TYPES: [&str; 3] = ["presentation", "symposium", "internship"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub year_of_study: i32,
    pub semester: i32,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status: {0}")]
pub struct InvalidStatus(pub String);

impl FromStr for AttendanceStatus {
    type Err = InvalidStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "excused" => Ok(AttendanceStatus::Excused),
            _ => Err(InvalidStatus(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub subject: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

/// `score` may exceed `max_score`; nothing here clamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub student_id: Uuid,
    pub subject: String,
    pub exam_type: String,
    pub score: f64,
    pub max_score: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub student_id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub grade: Option<f64>,
    pub max_grade: Option<f64>,
    pub subject: Option<String>,
}

impl Project {
    pub fn graded(&self) -> Option<(f64, f64)> {
        match (self.grade, self.max_grade) {
            (Some(grade), Some(max_grade)) => Some((grade, max_grade)),
            _ => None,
        }
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.end_date.unwrap_or(self.start_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub student_id: Uuid,
    pub name: String,
    pub issuing_organization: String,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub student_id: Uuid,
    pub metric_type: String,
    pub subject: Option<String>,
    pub score: f64,
    pub max_score: f64,
    pub date_recorded: NaiveDate,
}

impl PerformanceMetric {
    pub fn is_other_activity(&self) -> bool {
        OTHER_METRIC_TYPES.contains(&self.metric_type.as_str())
    }
}

/// Every record the store holds for one student. Callers guarantee that all
/// records belong to the same student; nothing downstream re-checks ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentRecords {
    #[serde(rename = "performance_metrics")]
    pub metrics: Vec<PerformanceMetric>,
    pub attendance: Vec<AttendanceRecord>,
    pub exams: Vec<ExamResult>,
    pub certifications: Vec<Certification>,
    pub projects: Vec<Project>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!(
            "Present".parse::<AttendanceStatus>().ok(),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(
            " EXCUSED ".parse::<AttendanceStatus>().ok(),
            Some(AttendanceStatus::Excused)
        );
        assert_eq!(
            "late".parse::<AttendanceStatus>(),
            Err(InvalidStatus("late".to_string()))
        );
        assert_eq!(
            InvalidStatus("late".to_string()).to_string(),
            "Invalid status: late"
        );
    }

    #[test]
    fn project_needs_both_grades_to_count() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let mut project = Project {
            student_id: Uuid::new_v4(),
            title: "Compiler".to_string(),
            start_date: start,
            end_date: None,
            grade: Some(88.0),
            max_grade: None,
            subject: None,
        };
        assert_eq!(project.graded(), None);
        assert_eq!(project.reference_date(), start);

        project.max_grade = Some(100.0);
        let end = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        project.end_date = Some(end);
        assert_eq!(project.graded(), Some((88.0, 100.0)));
        assert_eq!(project.reference_date(), end);
    }

    #[test]
    fn only_listed_metric_types_are_other_activities() {
        let metric = |metric_type: &str| PerformanceMetric {
            student_id: Uuid::new_v4(),
            metric_type: metric_type.to_string(),
            subject: None,
            score: 80.0,
            max_score: 100.0,
            date_recorded: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
        };
        assert!(metric("symposium").is_other_activity());
        assert!(metric("internship").is_other_activity());
        assert!(!metric("quiz").is_other_activity());
        assert!(!metric("Presentation").is_other_activity());
    }
}
