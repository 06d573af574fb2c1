use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::cohort::overall_for;
use crate::models::{Student, StudentRecords};
use crate::scoring::OverallPerformance;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentExport {
    pub student: Student,
    #[serde(flatten)]
    pub records: StudentRecords,
    pub overall_performance: OverallPerformance,
}

impl StudentExport {
    pub fn new(student: Student, records: StudentRecords) -> Self {
        let overall_performance = overall_for(&records);
        StudentExport {
            student,
            records,
            overall_performance,
        }
    }
}

pub fn write_json<W: Write>(writer: W, exports: &[StudentExport]) -> anyhow::Result<()> {
    match exports {
        [single] => serde_json::to_writer_pretty(writer, single)?,
        many => serde_json::to_writer_pretty(writer, many)?,
    }
    Ok(())
}

/// One flattened record. Columns that do not apply to `record_type` stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
struct ExportRow<'a> {
    student_id: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    department: &'a str,
    year_of_study: i32,
    semester: i32,
    record_type: &'static str,
    subject: Option<&'a str>,
    date: Option<NaiveDate>,
    status: Option<&'static str>,
    exam_type: Option<&'a str>,
    score: Option<f64>,
    max_score: Option<f64>,
    name: Option<&'a str>,
    issuing_organization: Option<&'a str>,
    issue_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    credential_id: Option<&'a str>,
    title: Option<&'a str>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    grade: Option<f64>,
    max_grade: Option<f64>,
}

fn rows_for(export: &StudentExport) -> Vec<ExportRow<'_>> {
    let student = &export.student;
    let records = &export.records;
    let base = ExportRow {
        student_id: &student.student_code,
        first_name: &student.first_name,
        last_name: &student.last_name,
        email: &student.email,
        department: &student.department,
        year_of_study: student.year_of_study,
        semester: student.semester,
        ..ExportRow::default()
    };

    let mut rows = Vec::new();
    for record in &records.attendance {
        rows.push(ExportRow {
            record_type: "attendance",
            subject: Some(record.subject.as_str()),
            date: Some(record.date),
            status: Some(record.status.as_str()),
            ..base.clone()
        });
    }
    for exam in &records.exams {
        rows.push(ExportRow {
            record_type: "exam",
            subject: Some(exam.subject.as_str()),
            exam_type: Some(exam.exam_type.as_str()),
            score: Some(exam.score),
            max_score: Some(exam.max_score),
            date: Some(exam.date),
            ..base.clone()
        });
    }
    for cert in &records.certifications {
        rows.push(ExportRow {
            record_type: "certification",
            name: Some(cert.name.as_str()),
            issuing_organization: Some(cert.issuing_organization.as_str()),
            issue_date: Some(cert.issue_date),
            expiry_date: cert.expiry_date,
            credential_id: cert.credential_id.as_deref(),
            ..base.clone()
        });
    }
    for project in &records.projects {
        rows.push(ExportRow {
            record_type: "project",
            title: Some(project.title.as_str()),
            subject: project.subject.as_deref(),
            start_date: Some(project.start_date),
            end_date: project.end_date,
            grade: project.grade,
            max_grade: project.max_grade,
            ..base.clone()
        });
    }
    rows
}

pub fn write_csv<W: Write>(writer: W, exports: &[StudentExport]) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut written = 0usize;
    for export in exports {
        for row in rows_for(export) {
            csv_writer.serialize(row)?;
            written += 1;
        }
    }
    csv_writer.flush()?;
    Ok(written)
}
