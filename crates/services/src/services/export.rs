//! CSV exports of the caller's classes and students.

use chrono::{DateTime, Utc};
use csv::{QuoteStyle, WriterBuilder};
use db::models::{
    class::{Class, ClassWithCounts},
    student::{Student, StudentFilter},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const CLASS_HEADER: [&str; 6] = [
    "Name",
    "Subject",
    "Academic Year",
    "Total Students",
    "Total Criteria",
    "Created At",
];
const STUDENT_HEADER: [&str; 5] = ["Name", "Registration Number", "Email", "Status", "Created At"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    Buffer(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),
    #[error("csv output is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%d/%m/%Y").to_string()
}

fn filename(kind: &str, at: DateTime<Utc>) -> String {
    format!("{kind}-{}.csv", at.timestamp_millis())
}

fn write_csv<const N: usize>(
    header: [&str; N],
    rows: impl IntoIterator<Item = [String; N]>,
) -> Result<String, ExportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    Ok(String::from_utf8(writer.into_inner()?)?)
}

pub fn classes_csv(classes: &[ClassWithCounts]) -> Result<String, ExportError> {
    write_csv(
        CLASS_HEADER,
        classes.iter().map(|c| {
            [
                c.name.clone(),
                c.subject.clone(),
                c.academic_year.clone(),
                c.student_count.to_string(),
                c.criteria_count.to_string(),
                format_date(&c.created_at),
            ]
        }),
    )
}

pub fn students_csv(students: &[Student]) -> Result<String, ExportError> {
    write_csv(
        STUDENT_HEADER,
        students.iter().map(|s| {
            [
                s.name.clone(),
                s.registration_number.clone(),
                s.email.clone().unwrap_or_else(|| "-".to_string()),
                s.status.to_string(),
                format_date(&s.created_at),
            ]
        }),
    )
}

pub struct ExportService;

impl ExportService {
    pub async fn classes(pool: &SqlitePool, teacher_id: Uuid) -> Result<CsvExport, ExportError> {
        let classes = Class::find_for_export(pool, teacher_id).await?;
        let body = classes_csv(&classes)?;
        info!(teacher_id = %teacher_id, rows = classes.len(), "Exported classes");
        Ok(CsvExport {
            filename: filename("classes", Utc::now()),
            body,
        })
    }

    /// Students the teacher can see; only `class_id` and `status` of the
    /// filter apply.
    pub async fn students(
        pool: &SqlitePool,
        teacher_id: Uuid,
        filter: &StudentFilter,
    ) -> Result<CsvExport, ExportError> {
        let filter = StudentFilter {
            search: None,
            ..filter.clone()
        };
        let students = Student::find_accessible_rows(pool, teacher_id, &filter).await?;
        let body = students_csv(&students)?;
        info!(teacher_id = %teacher_id, rows = students.len(), "Exported students");
        Ok(CsvExport {
            filename: filename("students", Utc::now()),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use db::models::student::StudentStatus;

    use super::*;

    fn student(email: Option<&str>) -> Student {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        Student {
            id: Uuid::new_v4(),
            name: "Ana, \"Aninha\"".to_string(),
            registration_number: "2024001".to_string(),
            email: email.map(str::to_string),
            photo_url: None,
            status: StudentStatus::Inactive,
            created_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn student_rows_quote_everything_and_dash_missing_email() {
        let csv = students_csv(&[student(None), student(Some("ana@escola.com"))]).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines[0],
            r#""Name","Registration Number","Email","Status","Created At""#
        );
        assert_eq!(
            lines[1],
            r#""Ana, ""Aninha""","2024001","-","inactive","05/03/2024""#
        );
        assert!(lines[2].contains(r#""ana@escola.com""#));
    }

    #[test]
    fn class_header_and_counts() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        let row = ClassWithCounts {
            class: Class {
                id: Uuid::new_v4(),
                name: "Turma A".to_string(),
                subject: "Matemática".to_string(),
                academic_year: "2024".to_string(),
                created_at: at,
                updated_at: at,
            },
            student_count: 3,
            criteria_count: 2,
        };
        let csv = classes_csv(&[row]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some(r#""Name","Subject","Academic Year","Total Students","Total Criteria","Created At""#)
        );
        assert_eq!(
            lines.next(),
            Some(r#""Turma A","Matemática","2024","3","2","31/12/2024""#)
        );
    }

    #[test]
    fn filename_uses_unix_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(filename("students", at), "students-1700000000123.csv");
    }
}
