use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use student_performance_analytics::cohort::StudentFilter;
use student_performance_analytics::import::{parse_date, CertificationRow, MetricRow, ProjectRow};
use student_performance_analytics::models::{Student, StudentRecords};
use student_performance_analytics::report::ReportInput;
use student_performance_analytics::{
    analysis, cohort, db, export, import, prediction, recommendations, report, scoring,
};

#[derive(Parser)]
#[command(name = "student-analytics")]
#[command(about = "Student performance analytics over attendance, exams, projects and certifications", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, env = "ANALYTICS_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ImportKind {
    Students,
    Attendance,
    Exams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small demo cohort
    Seed,
    /// Import students, attendance or exams from a CSV file
    Import {
        #[arg(long, value_enum)]
        kind: ImportKind,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record a performance metric (presentation, symposium, internship, ...)
    AddMetric {
        #[arg(long)]
        student: String,
        #[arg(long)]
        metric_type: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        score: f64,
        #[arg(long, default_value_t = 100.0)]
        max_score: f64,
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
    },
    /// Record a project, graded or in progress
    AddProject {
        #[arg(long)]
        student: String,
        #[arg(long)]
        title: String,
        #[arg(long, value_parser = parse_date)]
        start_date: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        grade: Option<f64>,
        #[arg(long, default_value_t = 100.0)]
        max_grade: f64,
        #[arg(long)]
        subject: Option<String>,
    },
    /// Record an earned certification
    AddCertification {
        #[arg(long)]
        student: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        organization: String,
        #[arg(long, value_parser = parse_date)]
        issue_date: NaiveDate,
        #[arg(long, value_parser = parse_date)]
        expiry_date: Option<NaiveDate>,
        #[arg(long)]
        credential_id: Option<String>,
    },
    /// Weighted overall score with strengths and weaknesses
    Overall {
        #[arg(long)]
        student: String,
    },
    /// Attendance breakdown by subject
    Attendance {
        #[arg(long)]
        student: String,
    },
    /// Exam statistics by subject
    Exams {
        #[arg(long)]
        student: String,
    },
    /// Project scores forward from recent trends
    Predict {
        #[arg(long)]
        student: String,
        /// Date the recency windows are measured from (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Prioritized improvement suggestions
    Recommend {
        #[arg(long)]
        student: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Overall performance side by side
    Compare {
        #[arg(long, value_delimiter = ',', required = true)]
        students: Vec<String>,
    },
    /// Averages per department
    Departments,
    /// Generate a markdown report for one student
    Report {
        #[arg(long)]
        student: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export student records and scores; all students unless codes are given
    Export {
        #[arg(long, value_delimiter = ',')]
        students: Vec<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        #[arg(long)]
        out: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_student(pool: &PgPool, code: &str) -> anyhow::Result<(Student, StudentRecords)> {
    let Some(student) = db::find_student(pool, code).await? else {
        bail!("Student not found: {code}");
    };
    let records = db::fetch_records(pool, student.id).await?;
    tracing::info!(
        student = %code,
        attendance = records.attendance.len(),
        exams = records.exams.len(),
        projects = records.projects.len(),
        "loaded student records"
    );
    Ok((student, records))
}

/// Loads every listed student, failing with all unknown codes at once.
async fn load_students(
    pool: &PgPool,
    codes: &[String],
) -> anyhow::Result<Vec<(Student, StudentRecords)>> {
    let mut missing = Vec::new();
    let mut students = Vec::new();
    for code in codes {
        match db::find_student(pool, code).await? {
            Some(student) => students.push(student),
            None => missing.push(code.as_str()),
        }
    }
    if !missing.is_empty() {
        bail!("Student not found: {}", missing.join(", "));
    }

    let mut loaded = Vec::with_capacity(students.len());
    for student in students {
        let records = db::fetch_records(pool, student.id).await?;
        loaded.push((student, records));
    }
    Ok(loaded)
}

fn print_summary(label: &str, summary: &import::ImportSummary, csv: &std::path::Path) {
    println!(
        "Imported {} {label} from {} ({} skipped).",
        summary.added,
        csv.display(),
        summary.skipped
    );
    for error in &summary.errors {
        tracing::warn!("{error}");
    }
}

async fn run_import(pool: &PgPool, kind: ImportKind, csv: PathBuf) -> anyhow::Result<()> {
    let file = File::open(&csv).with_context(|| format!("failed to open {}", csv.display()))?;

    match kind {
        ImportKind::Students => {
            let parsed = import::parse_students(file)?;
            let mut summary = db::import_students(pool, &parsed.rows).await?;
            summary.errors.splice(0..0, parsed.errors);
            print_summary("students", &summary, &csv);
        }
        ImportKind::Attendance => {
            let parsed = import::parse_attendance(file)?;
            let mut summary = db::import_attendance(pool, &parsed.rows).await?;
            summary.errors.splice(0..0, parsed.errors);
            print_summary("attendance records", &summary, &csv);
        }
        ImportKind::Exams => {
            let parsed = import::parse_exams(file)?;
            let mut summary = db::import_exams(pool, &parsed.rows).await?;
            summary.errors.splice(0..0, parsed.errors);
            print_summary("exam results", &summary, &csv);
        }
    }
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,student_performance_analytics=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { kind, csv } => run_import(&pool, kind, csv).await?,
        Commands::AddMetric {
            student,
            metric_type,
            subject,
            score,
            max_score,
            date,
        } => {
            let id = db::insert_metric(
                &pool,
                &MetricRow {
                    student_id: student,
                    metric_type,
                    subject,
                    score,
                    max_score,
                    date_recorded: date,
                },
            )
            .await?;
            println!("Metric {id} recorded.");
        }
        Commands::AddProject {
            student,
            title,
            start_date,
            end_date,
            grade,
            max_grade,
            subject,
        } => {
            let id = db::insert_project(
                &pool,
                &ProjectRow {
                    student_id: student,
                    title,
                    start_date,
                    end_date,
                    grade,
                    max_grade,
                    subject,
                },
            )
            .await?;
            println!("Project {id} recorded.");
        }
        Commands::AddCertification {
            student,
            name,
            organization,
            issue_date,
            expiry_date,
            credential_id,
        } => {
            let id = db::insert_certification(
                &pool,
                &CertificationRow {
                    student_id: student,
                    name,
                    issuing_organization: organization,
                    issue_date,
                    expiry_date,
                    credential_id,
                },
            )
            .await?;
            println!("Certification {id} recorded.");
        }
        Commands::Overall { student } => {
            let (_, records) = load_student(&pool, &student).await?;
            print_json(&cohort::overall_for(&records))?;
        }
        Commands::Attendance { student } => {
            let (_, records) = load_student(&pool, &student).await?;
            print_json(&analysis::analyze_attendance(&records.attendance))?;
        }
        Commands::Exams { student } => {
            let (_, records) = load_student(&pool, &student).await?;
            print_json(&analysis::analyze_exams(&records.exams))?;
        }
        Commands::Predict { student, as_of } => {
            let (student, records) = load_student(&pool, &student).await?;
            let prediction = prediction::predict_future_performance_on(
                as_of.unwrap_or_else(today),
                &student,
                &records.metrics,
                &records.attendance,
                &records.exams,
                &records.certifications,
                &records.projects,
            );
            print_json(&prediction)?;
        }
        Commands::Recommend { student, as_of } => {
            let (student, records) = load_student(&pool, &student).await?;
            let list = recommendations::recommend_improvements_on(
                as_of.unwrap_or_else(today),
                &student,
                &records.metrics,
                &records.attendance,
                &records.exams,
                &records.certifications,
                &records.projects,
            );
            print_json(&list)?;
        }
        Commands::Compare { students } => {
            let loaded = load_students(&pool, &students).await?;
            print_json(&cohort::compare_students(&loaded))?;
        }
        Commands::Departments => {
            let mut loaded = Vec::new();
            for student in db::list_students(&pool).await? {
                let records = db::fetch_records(&pool, student.id).await?;
                loaded.push((student, records));
            }
            print_json(&cohort::summarize_departments(&loaded))?;
        }
        Commands::Report {
            student,
            as_of,
            out,
        } => {
            let as_of = as_of.unwrap_or_else(today);
            let (student, records) = load_student(&pool, &student).await?;
            let overall = scoring::compute_overall_performance(
                &records.metrics,
                &records.attendance,
                &records.exams,
                &records.certifications,
                &records.projects,
            );
            let prediction = prediction::predict_future_performance_on(
                as_of,
                &student,
                &records.metrics,
                &records.attendance,
                &records.exams,
                &records.certifications,
                &records.projects,
            );
            let recommendations = recommendations::recommend_improvements_on(
                as_of,
                &student,
                &records.metrics,
                &records.attendance,
                &records.exams,
                &records.certifications,
                &records.projects,
            );
            let report = report::build_student_report(&ReportInput {
                student: &student,
                as_of,
                overall: &overall,
                attendance: &analysis::analyze_attendance(&records.attendance),
                exams: &analysis::analyze_exams(&records.exams),
                prediction: &prediction,
                recommendations: &recommendations,
            });
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            students,
            department,
            year,
            format,
            out,
        } => {
            let filter = StudentFilter {
                department,
                year_of_study: year,
            };
            let mut selected = if students.is_empty() {
                let mut loaded = Vec::new();
                for student in db::list_students(&pool).await? {
                    if filter.matches(&student) {
                        let records = db::fetch_records(&pool, student.id).await?;
                        loaded.push((student, records));
                    }
                }
                loaded
            } else {
                load_students(&pool, &students).await?
            };
            selected.retain(|(student, _)| filter.matches(student));
            if selected.is_empty() {
                tracing::warn!(?filter, "no students matched the export selection");
            }

            let exports: Vec<export::StudentExport> = selected
                .into_iter()
                .map(|(student, records)| export::StudentExport::new(student, records))
                .collect();
            let file = File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let writer = BufWriter::new(file);
            match format {
                ExportFormat::Json => export::write_json(writer, &exports)?,
                ExportFormat::Csv => {
                    let rows = export::write_csv(writer, &exports)?;
                    tracing::info!(rows, "wrote flattened export");
                }
            }
            println!(
                "Exported {} students to {}.",
                exports.len(),
                out.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let base = ["student-analytics", "--database-url", "postgres://localhost/analytics"];
        Cli::try_parse_from(base.iter().chain(args.iter()).copied())
    }

    #[test]
    fn add_metric_defaults_max_score_and_checks_the_date() {
        let cli = parse(&[
            "add-metric",
            "--student",
            "S1001",
            "--metric-type",
            "symposium",
            "--score",
            "88",
            "--date",
            "2026-03-12",
        ])
        .unwrap();
        match cli.command {
            Commands::AddMetric {
                max_score, date, ..
            } => {
                assert_eq!(max_score, 100.0);
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 12).unwrap());
            }
            _ => panic!("expected add-metric"),
        }

        let bad_date = parse(&[
            "add-metric",
            "--student",
            "S1001",
            "--metric-type",
            "symposium",
            "--score",
            "88",
            "--date",
            "12/03/2026",
        ]);
        assert!(bad_date.is_err());
    }

    #[test]
    fn add_project_and_certification_take_optional_fields() {
        let cli = parse(&[
            "add-project",
            "--student",
            "S1002",
            "--title",
            "Gearbox Model",
            "--start-date",
            "2025-10-06",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::AddProject {
                end_date: None,
                grade: None,
                ..
            }
        ));

        let cli = parse(&[
            "add-certification",
            "--student",
            "S1002",
            "--name",
            "CSWA",
            "--organization",
            "Dassault Systemes",
            "--issue-date",
            "2025-08-21",
            "--expiry-date",
            "2028-08-21",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::AddCertification {
                expiry_date: Some(_),
                credential_id: None,
                ..
            }
        ));
    }

    #[test]
    fn export_selects_by_filters_without_codes() {
        let cli = parse(&[
            "export",
            "--department",
            "Computer Science",
            "--year",
            "2",
            "--out",
            "cs.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Export {
                students,
                department,
                year,
                format,
                ..
            } => {
                assert!(students.is_empty());
                assert_eq!(department.as_deref(), Some("Computer Science"));
                assert_eq!(year, Some(2));
                assert_eq!(format, ExportFormat::Json);
            }
            _ => panic!("expected export"),
        }

        let cli = parse(&["export", "--students", "S1001,S1002", "--out", "pair.csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Export { ref students, .. } if students == &["S1001", "S1002"]
        ));
    }
}
