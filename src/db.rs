use std::collections::HashMap;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::import::{
    AttendanceRow, CertificationRow, ExamRow, ImportSummary, MetricRow, ProjectRow, StudentRow,
};
use crate::models::{
    AttendanceRecord, AttendanceStatus, Certification, ExamResult, PerformanceMetric, Project,
    Student, StudentRecords,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: row.get("id"),
        student_code: row.get("student_code"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        department: row.get("department"),
        year_of_study: row.get("year_of_study"),
        semester: row.get("semester"),
    }
}

const STUDENT_COLUMNS: &str =
    "id, student_code, first_name, last_name, email, department, year_of_study, semester";

pub async fn find_student(pool: &PgPool, student_code: &str) -> anyhow::Result<Option<Student>> {
    let row = sqlx::query(&format!(
        "SELECT {STUDENT_COLUMNS} FROM student_analytics.students WHERE student_code = $1"
    ))
    .bind(student_code)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(student_from_row))
}

pub async fn list_students(pool: &PgPool) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(&format!(
        "SELECT {STUDENT_COLUMNS} FROM student_analytics.students ORDER BY student_code"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

pub async fn fetch_records(pool: &PgPool, student_id: Uuid) -> anyhow::Result<StudentRecords> {
    let mut attendance = Vec::new();
    for row in sqlx::query(
        "SELECT subject, date, status FROM student_analytics.attendance_records \
         WHERE student_id = $1 ORDER BY date",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?
    {
        let status: String = row.get("status");
        attendance.push(AttendanceRecord {
            student_id,
            subject: row.get("subject"),
            date: row.get("date"),
            status: status
                .parse::<AttendanceStatus>()
                .with_context(|| format!("stored attendance for student {student_id}"))?,
        });
    }

    let exams = sqlx::query(
        "SELECT subject, exam_type, score, max_score, date FROM student_analytics.exam_results \
         WHERE student_id = $1 ORDER BY date",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| ExamResult {
        student_id,
        subject: row.get("subject"),
        exam_type: row.get("exam_type"),
        score: row.get("score"),
        max_score: row.get("max_score"),
        date: row.get("date"),
    })
    .collect();

    let projects = sqlx::query(
        "SELECT title, start_date, end_date, grade, max_grade, subject \
         FROM student_analytics.projects WHERE student_id = $1 ORDER BY start_date",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| Project {
        student_id,
        title: row.get("title"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        grade: row.get("grade"),
        max_grade: row.get("max_grade"),
        subject: row.get("subject"),
    })
    .collect();

    let certifications = sqlx::query(
        "SELECT name, issuing_organization, issue_date, expiry_date, credential_id \
         FROM student_analytics.certifications WHERE student_id = $1 ORDER BY issue_date",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| Certification {
        student_id,
        name: row.get("name"),
        issuing_organization: row.get("issuing_organization"),
        issue_date: row.get("issue_date"),
        expiry_date: row.get("expiry_date"),
        credential_id: row.get("credential_id"),
    })
    .collect();

    let metrics = sqlx::query(
        "SELECT metric_type, subject, score, max_score, date_recorded \
         FROM student_analytics.performance_metrics WHERE student_id = $1 ORDER BY date_recorded",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| PerformanceMetric {
        student_id,
        metric_type: row.get("metric_type"),
        subject: row.get("subject"),
        score: row.get("score"),
        max_score: row.get("max_score"),
        date_recorded: row.get("date_recorded"),
    })
    .collect();

    Ok(StudentRecords {
        metrics,
        attendance,
        exams,
        certifications,
        projects,
    })
}

async fn student_ids_by_code(pool: &PgPool) -> anyhow::Result<HashMap<String, Uuid>> {
    let rows = sqlx::query("SELECT id, student_code FROM student_analytics.students")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get("student_code"), row.get("id")))
        .collect())
}

/// Students whose code or email already exists are skipped.
pub async fn import_students(pool: &PgPool, rows: &[StudentRow]) -> anyhow::Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO student_analytics.students
            (id, student_code, first_name, last_name, email, department, year_of_study, semester)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.student_id)
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.email)
        .bind(&row.department)
        .bind(row.year_of_study)
        .bind(row.semester)
        .execute(pool)
        .await;

        summary.record(result.map(|done| done.rows_affected()), |err| {
            format!("Error processing row for student {}: {err}", row.student_id)
        });
    }

    tracing::info!(added = summary.added, skipped = summary.skipped, "imported students");
    Ok(summary)
}

pub async fn import_attendance(
    pool: &PgPool,
    rows: &[AttendanceRow],
) -> anyhow::Result<ImportSummary> {
    let ids = student_ids_by_code(pool).await?;
    let mut summary = ImportSummary::default();

    for row in rows {
        let Some(student_id) = ids.get(&row.student_id) else {
            summary
                .errors
                .push(format!("Student not found: {}", row.student_id));
            continue;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO student_analytics.attendance_records
            (id, student_id, subject, date, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (student_id, subject, date) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(&row.subject)
        .bind(row.date)
        .bind(row.status.as_str())
        .execute(pool)
        .await;

        summary.record(result.map(|done| done.rows_affected()), |err| {
            format!(
                "Error processing attendance for student {}: {err}",
                row.student_id
            )
        });
    }

    tracing::info!(added = summary.added, skipped = summary.skipped, "imported attendance");
    Ok(summary)
}

pub async fn import_exams(pool: &PgPool, rows: &[ExamRow]) -> anyhow::Result<ImportSummary> {
    let ids = student_ids_by_code(pool).await?;
    let mut summary = ImportSummary::default();

    for row in rows {
        let Some(student_id) = ids.get(&row.student_id) else {
            summary
                .errors
                .push(format!("Student not found: {}", row.student_id));
            continue;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO student_analytics.exam_results
            (id, student_id, subject, exam_type, score, max_score, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id, subject, exam_type, date) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(&row.subject)
        .bind(&row.exam_type)
        .bind(row.score)
        .bind(row.max_score)
        .bind(row.date)
        .execute(pool)
        .await;

        summary.record(result.map(|done| done.rows_affected()), |err| {
            format!(
                "Error processing exam result for student {}: {err}",
                row.student_id
            )
        });
    }

    tracing::info!(added = summary.added, skipped = summary.skipped, "imported exams");
    Ok(summary)
}

async fn require_student_id(pool: &PgPool, student_code: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM student_analytics.students WHERE student_code = $1")
        .bind(student_code)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(row.get("id")),
        None => anyhow::bail!("Student not found: {student_code}"),
    }
}

pub async fn insert_metric(pool: &PgPool, row: &MetricRow) -> anyhow::Result<Uuid> {
    row.validate()?;
    let student_id = require_student_id(pool, &row.student_id).await?;
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO student_analytics.performance_metrics
        (id, student_id, metric_type, subject, score, max_score, date_recorded)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(student_id)
    .bind(&row.metric_type)
    .bind(&row.subject)
    .bind(row.score)
    .bind(row.max_score)
    .bind(row.date_recorded)
    .execute(pool)
    .await
    .context("failed to insert performance metric")?;

    tracing::info!(student = %row.student_id, metric_type = %row.metric_type, "added metric");
    Ok(id)
}

pub async fn insert_project(pool: &PgPool, row: &ProjectRow) -> anyhow::Result<Uuid> {
    row.validate()?;
    let student_id = require_student_id(pool, &row.student_id).await?;
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO student_analytics.projects
        (id, student_id, title, start_date, end_date, grade, max_grade, subject)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(id)
    .bind(student_id)
    .bind(&row.title)
    .bind(row.start_date)
    .bind(row.end_date)
    .bind(row.grade)
    .bind(row.max_grade)
    .bind(&row.subject)
    .execute(pool)
    .await
    .context("failed to insert project")?;

    tracing::info!(student = %row.student_id, title = %row.title, "added project");
    Ok(id)
}

pub async fn insert_certification(
    pool: &PgPool,
    row: &CertificationRow,
) -> anyhow::Result<Uuid> {
    row.validate()?;
    let student_id = require_student_id(pool, &row.student_id).await?;
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO student_analytics.certifications
        (id, student_id, name, issuing_organization, issue_date, expiry_date, credential_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(student_id)
    .bind(&row.name)
    .bind(&row.issuing_organization)
    .bind(row.issue_date)
    .bind(row.expiry_date)
    .bind(&row.credential_id)
    .execute(pool)
    .await
    .context("failed to insert certification")?;

    tracing::info!(student = %row.student_id, name = %row.name, "added certification");
    Ok(id)
}

fn seed_date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid date")
}

/// Demo cohort. Record ids are fixed so re-seeding is a no-op.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("5b1f8a0e-6c1d-4f0a-9a57-2f3c8d1e4b10")?,
            "S1001",
            "Amara",
            "Okafor",
            "amara.okafor@example.edu",
            "Computer Science",
            2,
            1,
        ),
        (
            Uuid::parse_str("a4e2c9d3-1b7f-4e8a-b6c5-7d9e0f1a2b34")?,
            "S1002",
            "Lena",
            "Fischer",
            "lena.fischer@example.edu",
            "Mechanical Engineering",
            3,
            2,
        ),
    ];

    for (id, code, first, last, email, department, year, semester) in &students {
        sqlx::query(
            r#"
            INSERT INTO student_analytics.students
            (id, student_code, first_name, last_name, email, department, year_of_study, semester)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_code) DO UPDATE
            SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
                department = EXCLUDED.department
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(first)
        .bind(last)
        .bind(email)
        .bind(department)
        .bind(year)
        .bind(semester)
        .execute(pool)
        .await?;
    }

    let amara = students[0].0;
    let lena = students[1].0;

    // Twice-weekly classes from January through April; Lena misses more as the term goes on.
    let term_start = seed_date(2026, 1, 5)?;
    for week in 0..16i64 {
        for (offset, subject) in [(0i64, "Algorithms"), (2, "Databases")] {
            let date = term_start + Duration::days(week * 7 + offset);
            let lena_status = if week > 8 && offset == 2 {
                AttendanceStatus::Absent
            } else if week == 4 {
                AttendanceStatus::Excused
            } else {
                AttendanceStatus::Present
            };
            let amara_status = if week == 6 && offset == 0 {
                AttendanceStatus::Absent
            } else {
                AttendanceStatus::Present
            };
            for (student_id, status) in [(amara, amara_status), (lena, lena_status)] {
                sqlx::query(
                    r#"
                    INSERT INTO student_analytics.attendance_records
                    (id, student_id, subject, date, status)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (student_id, subject, date) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(student_id)
                .bind(subject)
                .bind(date)
                .bind(status.as_str())
                .execute(pool)
                .await?;
            }
        }
    }

    let exams = vec![
        (amara, "Algorithms", "quiz", 34.0, 40.0, seed_date(2026, 1, 30)?),
        (amara, "Algorithms", "midterm", 81.0, 100.0, seed_date(2026, 3, 2)?),
        (amara, "Databases", "midterm", 88.0, 100.0, seed_date(2026, 3, 4)?),
        (lena, "Algorithms", "quiz", 30.0, 40.0, seed_date(2026, 1, 30)?),
        (lena, "Algorithms", "midterm", 64.0, 100.0, seed_date(2026, 3, 2)?),
        (lena, "Databases", "midterm", 58.0, 100.0, seed_date(2026, 3, 4)?),
    ];
    for (student_id, subject, exam_type, score, max_score, date) in exams {
        sqlx::query(
            r#"
            INSERT INTO student_analytics.exam_results
            (id, student_id, subject, exam_type, score, max_score, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id, subject, exam_type, date) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(subject)
        .bind(exam_type)
        .bind(score)
        .bind(max_score)
        .bind(date)
        .execute(pool)
        .await?;
    }

    let projects = vec![
        (
            1u128,
            amara,
            "Query Planner",
            seed_date(2025, 9, 1)?,
            Some(seed_date(2025, 12, 12)?),
            Some(91.0),
        ),
        (2, amara, "Graph Toolkit", seed_date(2026, 2, 2)?, None, None),
        (
            3,
            lena,
            "Gearbox Model",
            seed_date(2025, 10, 6)?,
            Some(seed_date(2026, 1, 20)?),
            Some(72.0),
        ),
    ];
    for (key, student_id, title, start_date, end_date, grade) in projects {
        sqlx::query(
            r#"
            INSERT INTO student_analytics.projects
            (id, student_id, title, start_date, end_date, grade, max_grade)
            VALUES ($1, $2, $3, $4, $5, $6, 100)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::from_u128(0x5eed_0001_0000 + key))
        .bind(student_id)
        .bind(title)
        .bind(start_date)
        .bind(end_date)
        .bind(grade)
        .execute(pool)
        .await?;
    }

    let certifications = vec![
        (1u128, amara, "Cloud Practitioner", "AWS", seed_date(2025, 11, 3)?),
        (2, amara, "Associate Data Engineer", "Databricks", seed_date(2026, 2, 14)?),
        (3, lena, "CSWA", "Dassault Systemes", seed_date(2025, 8, 21)?),
    ];
    for (key, student_id, name, organization, issue_date) in certifications {
        sqlx::query(
            r#"
            INSERT INTO student_analytics.certifications
            (id, student_id, name, issuing_organization, issue_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::from_u128(0x5eed_0002_0000 + key))
        .bind(student_id)
        .bind(name)
        .bind(organization)
        .bind(issue_date)
        .execute(pool)
        .await?;
    }

    let metrics = vec![
        (1u128, amara, "presentation", 86.0, seed_date(2026, 2, 20)?),
        (2, amara, "symposium", 92.0, seed_date(2026, 3, 12)?),
        (3, lena, "internship", 78.0, seed_date(2025, 12, 15)?),
        (4, lena, "homework", 65.0, seed_date(2026, 2, 9)?),
    ];
    for (key, student_id, metric_type, score, date_recorded) in metrics {
        sqlx::query(
            r#"
            INSERT INTO student_analytics.performance_metrics
            (id, student_id, metric_type, score, max_score, date_recorded)
            VALUES ($1, $2, $3, $4, 100, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::from_u128(0x5eed_0003_0000 + key))
        .bind(student_id)
        .bind(metric_type)
        .bind(score)
        .bind(date_recorded)
        .execute(pool)
        .await?;
    }

    tracing::info!(students = students.len(), "seeded demo cohort");
    Ok(())
}
