use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::models::{Student, StudentRecords};
use crate::scoring::{self, OverallPerformance};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentComparison {
    pub student: Student,
    pub overall_performance: OverallPerformance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepartmentSummary {
    pub department: String,
    pub total_students: usize,
    pub avg_attendance: f64,
    pub avg_exam_score: f64,
    pub total_certifications: usize,
    pub total_projects: usize,
    pub avg_certifications: f64,
    pub avg_projects: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub department: Option<String>,
    pub year_of_study: Option<i32>,
}

impl StudentFilter {
    pub fn matches(&self, student: &Student) -> bool {
        self.department
            .as_deref()
            .map_or(true, |department| student.department == department)
            && self
                .year_of_study
                .map_or(true, |year| student.year_of_study == year)
    }
}

pub fn overall_for(records: &StudentRecords) -> OverallPerformance {
    scoring::compute_overall_performance(
        &records.metrics,
        &records.attendance,
        &records.exams,
        &records.certifications,
        &records.projects,
    )
}

pub fn compare_students(students: &[(Student, StudentRecords)]) -> Vec<StudentComparison> {
    students
        .par_iter()
        .map(|(student, records)| StudentComparison {
            student: student.clone(),
            overall_performance: overall_for(records),
        })
        .collect()
}

/// Departments in first-seen order. Students without attendance or exam
/// records still count toward the averages' denominators.
pub fn summarize_departments(students: &[(Student, StudentRecords)]) -> Vec<DepartmentSummary> {
    let mut departments: IndexMap<&str, DepartmentSummary> = IndexMap::new();

    for (student, records) in students {
        let summary = departments
            .entry(student.department.as_str())
            .or_insert_with(|| DepartmentSummary {
                department: student.department.clone(),
                ..DepartmentSummary::default()
            });

        summary.total_students += 1;
        summary.avg_attendance += scoring::attendance_score(&records.attendance);
        summary.avg_exam_score += scoring::exam_score(&records.exams);
        summary.total_certifications += records.certifications.len();
        summary.total_projects += records.projects.len();
    }

    departments
        .into_values()
        .map(|mut summary| {
            let students = summary.total_students as f64;
            summary.avg_attendance /= students;
            summary.avg_exam_score /= students;
            summary.avg_certifications = summary.total_certifications as f64 / students;
            summary.avg_projects = summary.total_projects as f64 / students;
            summary
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceRecord, AttendanceStatus, Certification, ExamResult};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn student(code: &str, department: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            student_code: code.to_string(),
            first_name: "Test".to_string(),
            last_name: code.to_string(),
            email: format!("{}@example.edu", code.to_lowercase()),
            department: department.to_string(),
            year_of_study: 1,
            semester: 1,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
    }

    fn records(present: usize, absent: usize, exam_pct: Option<f64>, certs: usize) -> StudentRecords {
        let mut attendance = Vec::new();
        for status in std::iter::repeat(AttendanceStatus::Present)
            .take(present)
            .chain(std::iter::repeat(AttendanceStatus::Absent).take(absent))
        {
            attendance.push(AttendanceRecord {
                student_id: Uuid::nil(),
                subject: "Algebra".to_string(),
                date: date(),
                status,
            });
        }
        let exams = exam_pct
            .map(|score| {
                vec![ExamResult {
                    student_id: Uuid::nil(),
                    subject: "Algebra".to_string(),
                    exam_type: "final".to_string(),
                    score,
                    max_score: 100.0,
                    date: date(),
                }]
            })
            .unwrap_or_default();
        let certifications = (0..certs)
            .map(|i| Certification {
                student_id: Uuid::nil(),
                name: format!("Cert {i}"),
                issuing_organization: "CompTIA".to_string(),
                issue_date: date(),
                expiry_date: None,
                credential_id: None,
            })
            .collect();

        StudentRecords {
            attendance,
            exams,
            certifications,
            ..StudentRecords::default()
        }
    }

    #[test]
    fn comparison_keeps_input_order() {
        let students = vec![
            (student("S1", "Math"), records(1, 0, Some(80.0), 0)),
            (student("S2", "Math"), records(0, 1, None, 5)),
        ];
        let comparison = compare_students(&students);
        assert_eq!(comparison.len(), 2);
        assert_eq!(comparison[0].student.student_code, "S1");
        assert_eq!(comparison[0].overall_performance.overall_score, 47.0);
        assert_eq!(comparison[1].overall_performance.overall_score, 10.0);
    }

    #[test]
    fn departments_average_over_all_students() {
        let students = vec![
            (student("S1", "Physics"), records(3, 1, Some(90.0), 2)),
            (student("S2", "History"), records(1, 1, Some(60.0), 0)),
            (student("S3", "Physics"), records(0, 0, None, 1)),
        ];
        let summaries = summarize_departments(&students);
        assert_eq!(summaries.len(), 2);

        let physics = &summaries[0];
        assert_eq!(physics.department, "Physics");
        assert_eq!(physics.total_students, 2);
        assert!((physics.avg_attendance - 37.5).abs() < 1e-9);
        assert!((physics.avg_exam_score - 45.0).abs() < 1e-9);
        assert_eq!(physics.total_certifications, 3);
        assert!((physics.avg_certifications - 1.5).abs() < 1e-9);
        assert_eq!(physics.avg_projects, 0.0);

        assert_eq!(summaries[1].department, "History");
        assert!((summaries[1].avg_attendance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn no_students_means_no_departments() {
        assert!(summarize_departments(&[]).is_empty());
        assert!(compare_students(&[]).is_empty());
    }

    #[test]
    fn filter_selects_by_department_and_year() {
        let mut third_year = student("S3", "Physics");
        third_year.year_of_study = 3;
        let students = vec![student("S1", "Physics"), student("S2", "History"), third_year];

        let codes = |filter: &StudentFilter| -> Vec<String> {
            students
                .iter()
                .filter(|s| filter.matches(s))
                .map(|s| s.student_code.clone())
                .collect()
        };

        assert_eq!(codes(&StudentFilter::default()), vec!["S1", "S2", "S3"]);
        let physics = StudentFilter {
            department: Some("Physics".to_string()),
            year_of_study: None,
        };
        assert_eq!(codes(&physics), vec!["S1", "S3"]);
        let physics_third_year = StudentFilter {
            year_of_study: Some(3),
            ..physics
        };
        assert_eq!(codes(&physics_third_year), vec!["S3"]);
        let lowercase = StudentFilter {
            department: Some("physics".to_string()),
            year_of_study: None,
        };
        assert!(codes(&lowercase).is_empty());
    }
}
