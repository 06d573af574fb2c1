use std::fmt;
use std::io::Read;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AttendanceStatus, InvalidStatus};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    #[error("Invalid date format: {0}. Use YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid score: {score}/{max_score}")]
    InvalidScore { score: f64, max_score: f64 },

    #[error("{field} {end} is before {start}")]
    DateOrder {
        field: &'static str,
        start: NaiveDate,
        end: NaiveDate,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StudentRow {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub year_of_study: i32,
    pub semester: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RawAttendanceRow {
    student_id: String,
    subject: String,
    date: String,
    status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRow {
    pub student_id: String,
    pub subject: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RawExamRow {
    student_id: String,
    subject: String,
    exam_type: String,
    score: f64,
    max_score: f64,
    date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamRow {
    pub student_id: String,
    pub subject: String,
    pub exam_type: String,
    pub score: f64,
    pub max_score: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    /// Counts one insert. Zero affected rows means the row already existed;
    /// a failed insert is kept as a message and the import carries on.
    pub fn record<E: fmt::Display>(
        &mut self,
        outcome: Result<u64, E>,
        describe: impl FnOnce(E) -> String,
    ) {
        match outcome {
            Ok(affected) if affected > 0 => self.added += 1,
            Ok(_) => self.skipped += 1,
            Err(err) => self.errors.push(describe(err)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub student_id: String,
    pub metric_type: String,
    pub subject: Option<String>,
    pub score: f64,
    pub max_score: f64,
    pub date_recorded: NaiveDate,
}

impl MetricRow {
    pub fn validate(&self) -> Result<(), ImportError> {
        validate_score(self.score, self.max_score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRow {
    pub student_id: String,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub grade: Option<f64>,
    pub max_grade: f64,
    pub subject: Option<String>,
}

impl ProjectRow {
    /// Ungraded projects only need a positive max grade.
    pub fn validate(&self) -> Result<(), ImportError> {
        validate_score(self.grade.unwrap_or(0.0), self.max_grade)?;
        check_order("end_date", self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CertificationRow {
    pub student_id: String,
    pub name: String,
    pub issuing_organization: String,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub credential_id: Option<String>,
}

impl CertificationRow {
    pub fn validate(&self) -> Result<(), ImportError> {
        check_order("expiry_date", self.issue_date, self.expiry_date)
    }
}

const STUDENT_COLUMNS: [&str; 7] = [
    "student_id",
    "first_name",
    "last_name",
    "email",
    "department",
    "year_of_study",
    "semester",
];
const ATTENDANCE_COLUMNS: [&str; 4] = ["student_id", "subject", "date", "status"];
const EXAM_COLUMNS: [&str; 6] = [
    "student_id",
    "subject",
    "exam_type",
    "score",
    "max_score",
    "date",
];

pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ImportError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ImportError::InvalidDate(value.to_string()))
}

pub fn validate_score(score: f64, max_score: f64) -> Result<(), ImportError> {
    if max_score > 0.0 && score >= 0.0 {
        Ok(())
    } else {
        Err(ImportError::InvalidScore { score, max_score })
    }
}

fn check_order(
    field: &'static str,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<(), ImportError> {
    match end {
        Some(end) if end < start => Err(ImportError::DateOrder { field, start, end }),
        _ => Ok(()),
    }
}

fn read_rows<T: DeserializeOwned, R: Read>(
    reader: R,
    required: &[&str],
) -> Result<Parsed<T>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers: csv::StringRecord = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }
    csv_reader.set_headers(headers);

    let mut parsed = Parsed {
        rows: Vec::new(),
        errors: Vec::new(),
    };
    for (index, result) in csv_reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => parsed.rows.push(row),
            Err(err) => parsed.errors.push(format!("Row {}: {}", index + 2, err)),
        }
    }
    Ok(parsed)
}

pub fn parse_students<R: Read>(reader: R) -> Result<Parsed<StudentRow>, ImportError> {
    read_rows(reader, &STUDENT_COLUMNS)
}

pub fn parse_attendance<R: Read>(reader: R) -> Result<Parsed<AttendanceRow>, ImportError> {
    let raw: Parsed<RawAttendanceRow> = read_rows(reader, &ATTENDANCE_COLUMNS)?;
    let mut parsed = Parsed {
        rows: Vec::with_capacity(raw.rows.len()),
        errors: raw.errors,
    };

    for row in raw.rows {
        let Ok(date) = parse_date(&row.date) else {
            parsed.errors.push(format!(
                "Invalid date format for student {}: {}",
                row.student_id, row.date
            ));
            continue;
        };
        let Ok(status) = row.status.parse::<AttendanceStatus>() else {
            parsed.errors.push(format!(
                "Invalid status for student {}: {}",
                row.student_id,
                row.status.to_lowercase()
            ));
            continue;
        };
        parsed.rows.push(AttendanceRow {
            student_id: row.student_id,
            subject: row.subject,
            date,
            status,
        });
    }
    Ok(parsed)
}

pub fn parse_exams<R: Read>(reader: R) -> Result<Parsed<ExamRow>, ImportError> {
    let raw: Parsed<RawExamRow> = read_rows(reader, &EXAM_COLUMNS)?;
    let mut parsed = Parsed {
        rows: Vec::with_capacity(raw.rows.len()),
        errors: raw.errors,
    };

    for row in raw.rows {
        let Ok(date) = parse_date(&row.date) else {
            parsed.errors.push(format!(
                "Invalid date format for student {}: {}",
                row.student_id, row.date
            ));
            continue;
        };
        if validate_score(row.score, row.max_score).is_err() {
            parsed.errors.push(format!(
                "Invalid score for student {}: {}/{}",
                row.student_id, row.score, row.max_score
            ));
            continue;
        }
        parsed.rows.push(ExamRow {
            student_id: row.student_id,
            subject: row.subject,
            exam_type: row.exam_type,
            score: row.score,
            max_score: row.max_score,
            date,
        });
    }
    Ok(parsed)
}
