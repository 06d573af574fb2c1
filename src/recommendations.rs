use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::analysis::scores_by_subject;
use crate::models::{
    AttendanceRecord, Certification, ExamResult, PerformanceMetric, Project, Student,
};
use crate::prediction::{current_attendance, current_exam_score, current_project_score};

const MIN_RECOMMENDATIONS: usize = 3;
const MAX_LISTED_SUBJECTS: usize = 3;
const WEAK_SUBJECT_AVERAGE: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub area: &'static str,
    pub current_score: Option<f64>,
    pub target_score: Option<f64>,
    pub recommendation: String,
    pub details: &'static str,
    pub priority: Priority,
}

impl Recommendation {
    fn general(
        area: &'static str,
        recommendation: &str,
        details: &'static str,
        priority: Priority,
    ) -> Self {
        Recommendation {
            area,
            current_score: None,
            target_score: None,
            recommendation: recommendation.to_string(),
            details,
            priority,
        }
    }

    fn scored(
        area: &'static str,
        current: f64,
        target: f64,
        recommendation: &str,
        details: &'static str,
        priority: Priority,
    ) -> Self {
        Recommendation {
            current_score: Some(current),
            target_score: Some(target),
            ..Recommendation::general(area, recommendation, details, priority)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationList {
    pub recommendations: Vec<Recommendation>,
    pub total_recommendations: usize,
}

impl RecommendationList {
    fn from_unsorted(mut recommendations: Vec<Recommendation>) -> Self {
        // Stable: equal priorities keep insertion order.
        recommendations.sort_by_key(|r| r.priority.rank());
        RecommendationList {
            total_recommendations: recommendations.len(),
            recommendations,
        }
    }
}

fn filler() -> [Recommendation; 3] {
    [
        Recommendation::general(
            "Time Management",
            "Improve time management skills",
            "Effective time management can help balance academic responsibilities and extracurricular activities.",
            Priority::Medium,
        ),
        Recommendation::general(
            "Networking",
            "Build professional network",
            "Connect with industry professionals and join relevant communities.",
            Priority::Low,
        ),
        Recommendation::general(
            "Soft Skills",
            "Develop communication and presentation skills",
            "Soft skills are highly valued by employers alongside technical knowledge.",
            Priority::Medium,
        ),
    ]
}

/// Subjects averaging below 75%, in first-seen order.
fn weak_subjects(exams: &[ExamResult]) -> Vec<String> {
    scores_by_subject(exams)
        .into_iter()
        .filter(|(_, scores)| {
            scores.iter().sum::<f64>() / (scores.len() as f64) < WEAK_SUBJECT_AVERAGE
        })
        .map(|(subject, _)| subject)
        .collect()
}

pub fn recommend_improvements(
    student: &Student,
    metrics: &[PerformanceMetric],
    attendance: &[AttendanceRecord],
    exams: &[ExamResult],
    certifications: &[Certification],
    projects: &[Project],
) -> RecommendationList {
    recommend_improvements_on(
        Utc::now().date_naive(),
        student,
        metrics,
        attendance,
        exams,
        certifications,
        projects,
    )
}

pub fn recommend_improvements_on(
    as_of: NaiveDate,
    student: &Student,
    _metrics: &[PerformanceMetric],
    attendance: &[AttendanceRecord],
    exams: &[ExamResult],
    certifications: &[Certification],
    projects: &[Project],
) -> RecommendationList {
    let mut recommendations = Vec::new();

    let attendance_pct = current_attendance(attendance, as_of);
    if attendance_pct < 85.0 {
        recommendations.push(Recommendation::scored(
            "Attendance",
            attendance_pct,
            90.0,
            "Improve class attendance to at least 90%",
            "Regular attendance is strongly correlated with better academic performance.",
            if attendance_pct < 75.0 {
                Priority::High
            } else {
                Priority::Medium
            },
        ));
    }

    let exam_score = current_exam_score(exams, as_of);
    if exam_score < 80.0 {
        recommendations.push(Recommendation::scored(
            "Exam Performance",
            exam_score,
            80.0,
            "Focus on improving exam scores",
            "Consider forming study groups or seeking additional help from instructors.",
            if exam_score < 70.0 {
                Priority::High
            } else {
                Priority::Medium
            },
        ));
    }

    let weak = weak_subjects(exams);
    if !weak.is_empty() {
        let listed: Vec<&str> = weak
            .iter()
            .take(MAX_LISTED_SUBJECTS)
            .map(String::as_str)
            .collect();
        recommendations.push(Recommendation::general(
            "Subject Focus",
            &format!("Focus on improving performance in: {}", listed.join(", ")),
            "These subjects show the lowest average scores. Consider additional study time or tutoring.",
            Priority::High,
        ));
    }

    if certifications.len() < 2 {
        recommendations.push(Recommendation::general(
            "Professional Development",
            "Pursue additional relevant certifications",
            "Industry certifications can enhance your profile and job prospects.",
            Priority::Medium,
        ));
    }

    if projects.len() < 3 {
        recommendations.push(Recommendation::general(
            "Project Experience",
            "Participate in more projects",
            "Practical project experience is valuable for skill development and resume building.",
            Priority::Medium,
        ));
    }

    let project_score = current_project_score(projects, as_of);
    if project_score < 80.0 {
        recommendations.push(Recommendation::scored(
            "Project Quality",
            project_score,
            85.0,
            "Focus on improving project quality",
            "High-quality projects demonstrate your skills and technical abilities.",
            Priority::Medium,
        ));
    }

    if recommendations.len() < MIN_RECOMMENDATIONS {
        let missing = MIN_RECOMMENDATIONS - recommendations.len();
        recommendations.extend(filler().into_iter().take(missing));
    }

    tracing::debug!(
        student = %student.student_code,
        count = recommendations.len(),
        "generated recommendations"
    );
    RecommendationList::from_unsorted(recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use chrono::Duration;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn student() -> Student {
        Student {
            id: Uuid::nil(),
            student_code: "S2040".to_string(),
            first_name: "Lena".to_string(),
            last_name: "Fischer".to_string(),
            email: "lena.fischer@example.edu".to_string(),
            department: "Mechanical Engineering".to_string(),
            year_of_study: 3,
            semester: 2,
        }
    }

    fn present(n: usize) -> Vec<AttendanceRecord> {
        (0..n)
            .map(|i| AttendanceRecord {
                student_id: Uuid::nil(),
                subject: "Statics".to_string(),
                date: as_of() - Duration::days(i as i64),
                status: AttendanceStatus::Present,
            })
            .collect()
    }

    fn exam(subject: &str, score: f64) -> ExamResult {
        ExamResult {
            student_id: Uuid::nil(),
            subject: subject.to_string(),
            exam_type: "midterm".to_string(),
            score,
            max_score: 100.0,
            date: as_of() - Duration::days(7),
        }
    }

    fn certifications(n: usize) -> Vec<Certification> {
        (0..n)
            .map(|i| Certification {
                student_id: Uuid::nil(),
                name: format!("Cert {i}"),
                issuing_organization: "ASME".to_string(),
                issue_date: as_of(),
                expiry_date: None,
                credential_id: None,
            })
            .collect()
    }

    fn graded_projects(n: usize, grade: f64) -> Vec<Project> {
        (0..n)
            .map(|i| Project {
                student_id: Uuid::nil(),
                title: format!("Project {i}"),
                start_date: as_of() - Duration::days(30),
                end_date: None,
                grade: Some(grade),
                max_grade: Some(100.0),
                subject: None,
            })
            .collect()
    }

    fn areas(list: &RecommendationList) -> Vec<&'static str> {
        list.recommendations.iter().map(|r| r.area).collect()
    }

    #[test]
    fn strong_student_gets_filler_in_fixed_order() {
        let list = recommend_improvements_on(
            as_of(),
            &student(),
            &[],
            &present(10),
            &[exam("Dynamics", 95.0)],
            &certifications(2),
            &graded_projects(3, 90.0),
        );
        // Time Management and Soft Skills are Medium, Networking is Low.
        assert_eq!(
            areas(&list),
            vec!["Time Management", "Soft Skills", "Networking"]
        );
        assert_eq!(list.total_recommendations, 3);
    }

    #[test]
    fn filler_only_tops_up_to_three() {
        let list = recommend_improvements_on(
            as_of(),
            &student(),
            &[],
            &present(10),
            &[exam("Dynamics", 95.0)],
            &certifications(1),
            &graded_projects(3, 90.0),
        );
        assert_eq!(
            areas(&list),
            vec!["Professional Development", "Time Management", "Networking"]
        );
    }

    #[test]
    fn empty_history_triggers_every_rule_in_priority_order() {
        let list = recommend_improvements_on(as_of(), &student(), &[], &[], &[], &[], &[]);
        assert_eq!(
            areas(&list),
            vec![
                "Attendance",
                "Exam Performance",
                "Professional Development",
                "Project Experience",
                "Project Quality"
            ]
        );
        assert_eq!(list.recommendations[0].priority, Priority::High);
        assert_eq!(list.recommendations[0].current_score, Some(0.0));
        assert_eq!(list.recommendations[0].target_score, Some(90.0));
        assert_eq!(list.recommendations[4].target_score, Some(85.0));
    }

    #[test]
    fn weak_subjects_listed_in_first_seen_order() {
        let exams = vec![
            exam("Thermo", 60.0),
            exam("Fluids", 70.0),
            exam("Dynamics", 95.0),
            exam("Materials", 50.0),
            exam("Controls", 40.0),
        ];
        let list = recommend_improvements_on(
            as_of(),
            &student(),
            &[],
            &present(10),
            &exams,
            &certifications(2),
            &graded_projects(3, 90.0),
        );
        let subject = list
            .recommendations
            .iter()
            .find(|r| r.area == "Subject Focus")
            .unwrap();
        assert_eq!(
            subject.recommendation,
            "Focus on improving performance in: Thermo, Fluids, Materials"
        );
        assert_eq!(subject.priority, Priority::High);
        assert_eq!(subject.current_score, None);
    }

    #[test]
    fn priority_depends_on_how_far_below_threshold() {
        let mut attendance = present(4);
        attendance[0].status = AttendanceStatus::Absent;
        let list = recommend_improvements_on(
            as_of(),
            &student(),
            &[],
            &attendance,
            &[exam("Dynamics", 75.0)],
            &certifications(2),
            &graded_projects(3, 90.0),
        );
        let attendance_rec = &list.recommendations[0];
        assert_eq!(attendance_rec.area, "Attendance");
        assert_eq!(attendance_rec.priority, Priority::Medium);

        let exam_rec = list
            .recommendations
            .iter()
            .find(|r| r.area == "Exam Performance")
            .unwrap();
        assert_eq!(exam_rec.priority, Priority::Medium);
    }

    fn arbitrary_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::High),
            Just(Priority::Medium),
            Just(Priority::Low)
        ]
    }

    proptest! {
        #[test]
        fn sort_is_stable_by_priority(priorities in proptest::collection::vec(arbitrary_priority(), 0..12)) {
            let unsorted: Vec<Recommendation> = priorities
                .iter()
                .enumerate()
                .map(|(i, &p)| Recommendation::general("Area", &i.to_string(), "", p))
                .collect();
            let sorted = RecommendationList::from_unsorted(unsorted).recommendations;

            for pair in sorted.windows(2) {
                prop_assert!(pair[0].priority.rank() <= pair[1].priority.rank());
                if pair[0].priority == pair[1].priority {
                    let a: usize = pair[0].recommendation.parse().unwrap();
                    let b: usize = pair[1].recommendation.parse().unwrap();
                    prop_assert!(a < b);
                }
            }
        }
    }
}
