use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::text::contains_ignore_case;
use uuid::Uuid;

use super::class::Class;

/// Free-form enrollment status; any value may be set at any time.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "student_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Active,
    Inactive,
    Locked,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub registration_number: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub status: StudentStatus,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short reference to a class a student is enrolled in.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct StudentClassRef {
    pub class_id: Uuid,
    pub class_name: String,
    pub class_subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StudentWithClasses {
    #[serde(flatten)]
    #[ts(flatten)]
    pub student: Student,
    pub classes: Vec<StudentClassRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateStudent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub registration_number: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub status: Option<StudentStatus>,
    pub class_ids: Option<Vec<Uuid>>,
}

pub type UpdateStudent = CreateStudent;

/// Validated values ready to be written.
#[derive(Debug, Clone)]
pub struct StudentValues {
    pub name: String,
    pub registration_number: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub status: StudentStatus,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct StudentFilter {
    pub search: Option<String>,
    pub class_id: Option<Uuid>,
    pub status: Option<StudentStatus>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct StatusCount {
    pub status: StudentStatus,
    pub total: i64,
}

#[derive(Debug, Clone, FromRow)]
struct StudentClassRow {
    student_id: Uuid,
    #[sqlx(flatten)]
    class: StudentClassRef,
}

const STUDENT_COLUMNS: &str = "s.id, s.name, s.registration_number, s.email, s.photo_url, s.status, \
                               s.created_by, s.created_at, s.updated_at";

/// Narrows `query` to students visible to `teacher_id`: created by them or
/// enrolled in one of their classes.
fn push_accessible_to(query: &mut QueryBuilder<'_, Sqlite>, teacher_id: Uuid) {
    query
        .push("(s.created_by = ")
        .push_bind(teacher_id)
        .push(
            " OR EXISTS (SELECT 1 FROM class_students cs
                 JOIN teacher_classes tc ON tc.class_id = cs.class_id
                 WHERE cs.student_id = s.id AND tc.teacher_id = ",
        )
        .push_bind(teacher_id)
        .push("))");
}

impl Student {
    /// Students accessible to `teacher_id`, ordered by name, each with the
    /// teacher's classes it belongs to.
    pub async fn find_accessible(
        pool: &SqlitePool,
        teacher_id: Uuid,
        filter: &StudentFilter,
    ) -> Result<Vec<StudentWithClasses>, sqlx::Error> {
        let students = Self::find_accessible_rows(pool, teacher_id, filter).await?;
        let links = sqlx::query_as::<_, StudentClassRow>(
            r#"SELECT cs.student_id, c.id AS class_id, c.name AS class_name,
                      c.subject AS class_subject
               FROM class_students cs
               JOIN classes c ON c.id = cs.class_id
               JOIN teacher_classes tc ON tc.class_id = c.id
               WHERE tc.teacher_id = ?
               ORDER BY c.name ASC"#,
        )
        .bind(teacher_id)
        .fetch_all(pool)
        .await?;

        let mut by_student: HashMap<Uuid, Vec<StudentClassRef>> = HashMap::new();
        for row in links {
            by_student.entry(row.student_id).or_default().push(row.class);
        }

        Ok(students
            .into_iter()
            .map(|student| {
                let classes = by_student.remove(&student.id).unwrap_or_default();
                StudentWithClasses { student, classes }
            })
            .collect())
    }

    /// Same scope and filters as [`Student::find_accessible`], without classes.
    pub async fn find_accessible_rows(
        pool: &SqlitePool,
        teacher_id: Uuid,
        filter: &StudentFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {STUDENT_COLUMNS} FROM students s WHERE "));
        push_accessible_to(&mut query, teacher_id);

        if let Some(class_id) = filter.class_id {
            query
                .push(
                    " AND EXISTS (SELECT 1 FROM class_students f
                       WHERE f.student_id = s.id AND f.class_id = ",
                )
                .push_bind(class_id)
                .push(")");
        }
        if let Some(status) = filter.status {
            query.push(" AND s.status = ").push_bind(status);
        }
        query.push(" ORDER BY s.name ASC");

        let mut students = query.build_query_as::<Student>().fetch_all(pool).await?;

        // SQLite LIKE only folds ASCII; accented names are matched here.
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            students.retain(|s| {
                contains_ignore_case(&s.name, search)
                    || contains_ignore_case(&s.registration_number, search)
            });
        }
        Ok(students)
    }

    pub async fn find_accessible_by_id(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {STUDENT_COLUMNS} FROM students s WHERE "));
        push_accessible_to(&mut query, teacher_id);
        query.push(" AND s.id = ").push_bind(id);
        query.build_query_as::<Student>().fetch_optional(pool).await
    }

    pub async fn find_by_registration_number(
        pool: &SqlitePool,
        registration_number: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students s WHERE s.registration_number = ?"
        ))
        .bind(registration_number)
        .fetch_optional(pool)
        .await
    }

    /// Classes of the student that `teacher_id` owns, ordered by name.
    pub async fn classes_owned_by(
        pool: &SqlitePool,
        student_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Vec<Class>, sqlx::Error> {
        sqlx::query_as::<_, Class>(
            r#"SELECT c.id, c.name, c.subject, c.academic_year, c.created_at, c.updated_at
               FROM classes c
               JOIN class_students cs ON cs.class_id = c.id
               JOIN teacher_classes tc ON tc.class_id = c.id
               WHERE cs.student_id = ? AND tc.teacher_id = ?
               ORDER BY c.name ASC"#,
        )
        .bind(student_id)
        .bind(teacher_id)
        .fetch_all(pool)
        .await
    }

    /// Students enrolled in a class, ordered by name.
    pub async fn find_by_class_id(
        pool: &SqlitePool,
        class_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS}
             FROM students s
             JOIN class_students cs ON cs.student_id = s.id
             WHERE cs.class_id = ?
             ORDER BY s.name ASC"
        ))
        .bind(class_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        values: &StudentValues,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"INSERT INTO students (id, name, registration_number, email, photo_url, status, created_by)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               RETURNING id, name, registration_number, email, photo_url, status,
                         created_by, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&values.name)
        .bind(&values.registration_number)
        .bind(&values.email)
        .bind(&values.photo_url)
        .bind(values.status)
        .bind(created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        values: &StudentValues,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"UPDATE students
               SET name = ?, registration_number = ?, email = ?, photo_url = ?, status = ?,
                   updated_at = datetime('now', 'subsec')
               WHERE id = ?
               RETURNING id, name, registration_number, email, photo_url, status,
                         created_by, created_at, updated_at"#,
        )
        .bind(&values.name)
        .bind(&values.registration_number)
        .bind(&values.email)
        .bind(&values.photo_url)
        .bind(values.status)
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn update_photo_url(
        pool: &SqlitePool,
        id: Uuid,
        photo_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE students SET photo_url = ?, updated_at = datetime('now', 'subsec') WHERE id = ?",
        )
        .bind(photo_url)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Deletes the student; class links go with it (ON DELETE CASCADE).
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn link_to_class(
        pool: &SqlitePool,
        student_id: Uuid,
        class_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO class_students (class_id, student_id) VALUES (?, ?)")
            .bind(class_id)
            .bind(student_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Removes the student's links to classes owned by `teacher_id`; links to
    /// other teachers' classes are kept.
    pub async fn unlink_from_teacher_classes(
        pool: &SqlitePool,
        student_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"DELETE FROM class_students
               WHERE student_id = ?
                 AND class_id IN (SELECT class_id FROM teacher_classes WHERE teacher_id = ?)"#,
        )
        .bind(student_id)
        .bind(teacher_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Distinct students enrolled in the teacher's classes.
    pub async fn count_enrolled_for_teacher(
        pool: &SqlitePool,
        teacher_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(DISTINCT cs.student_id)
               FROM class_students cs
               JOIN teacher_classes tc ON tc.class_id = cs.class_id
               WHERE tc.teacher_id = ?"#,
        )
        .bind(teacher_id)
        .fetch_one(pool)
        .await
    }

    pub async fn count_by_status_for_teacher(
        pool: &SqlitePool,
        teacher_id: Uuid,
    ) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            r#"SELECT s.status AS status, COUNT(*) AS total
               FROM students s
               WHERE EXISTS (
                   SELECT 1 FROM class_students cs
                   JOIN teacher_classes tc ON tc.class_id = cs.class_id
                   WHERE cs.student_id = s.id AND tc.teacher_id = ?)
               GROUP BY s.status
               ORDER BY s.status ASC"#,
        )
        .bind(teacher_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::{
            class::{Class, CreateClass},
            user::{User, UserRole},
        },
    };

    async fn teacher(db: &DBService, email: &str) -> Uuid {
        User::create(&db.pool, "Teacher", email, "hash", UserRole::Teacher)
            .await
            .unwrap()
            .id
    }

    async fn class(db: &DBService, teacher_id: Uuid, name: &str) -> Uuid {
        Class::create(
            &db.pool,
            teacher_id,
            &CreateClass {
                name: name.to_string(),
                subject: "Matemática".to_string(),
                academic_year: "2024".to_string(),
            },
        )
        .await
        .unwrap()
        .id
    }

    fn values(name: &str, registration_number: &str, status: StudentStatus) -> StudentValues {
        StudentValues {
            name: name.to_string(),
            registration_number: registration_number.to_string(),
            email: None,
            photo_url: None,
            status,
        }
    }

    #[tokio::test]
    async fn accessible_through_creation_or_owned_class() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        let joao = teacher(&db, "joao@edumanage.com").await;
        let turma_c = class(&db, joao, "Turma C").await;

        let ana = Student::create(&db.pool, &values("Ana", "2024001", StudentStatus::Active), maria)
            .await
            .unwrap();
        assert!(Student::find_accessible_by_id(&db.pool, ana.id, maria).await.unwrap().is_some());
        assert!(Student::find_accessible_by_id(&db.pool, ana.id, joao).await.unwrap().is_none());

        Student::link_to_class(&db.pool, ana.id, turma_c).await.unwrap();
        assert!(Student::find_accessible_by_id(&db.pool, ana.id, joao).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn filters_combine_with_scope() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        let turma_a = class(&db, maria, "Turma A").await;
        let turma_b = class(&db, maria, "Turma B").await;

        let ana = Student::create(&db.pool, &values("Ana", "2024001", StudentStatus::Active), maria)
            .await
            .unwrap();
        let carlos = Student::create(&db.pool, &values("Carlos", "2024004", StudentStatus::Inactive), maria)
            .await
            .unwrap();
        Student::link_to_class(&db.pool, ana.id, turma_a).await.unwrap();
        Student::link_to_class(&db.pool, carlos.id, turma_b).await.unwrap();

        let by_class = Student::find_accessible(
            &db.pool,
            maria,
            &StudentFilter {
                class_id: Some(turma_a),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_class.len(), 1);
        assert_eq!(by_class[0].student.name, "Ana");
        assert_eq!(by_class[0].classes[0].class_name, "Turma A");

        let by_status = Student::find_accessible_rows(
            &db.pool,
            maria,
            &StudentFilter {
                status: Some(StudentStatus::Inactive),
                search: Some("2024".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_status.len(), 1);
        assert_eq!(by_status[0].name, "Carlos");

        Student::create(&db.pool, &values("ÍRIS CONCEIÇÃO", "2024009", StudentStatus::Active), maria)
            .await
            .unwrap();
        let accented = Student::find_accessible_rows(
            &db.pool,
            maria,
            &StudentFilter {
                search: Some("íris conceição".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(accented.len(), 1);
        assert_eq!(accented[0].registration_number, "2024009");

        let counts = Student::count_by_status_for_teacher(&db.pool, maria).await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(Student::count_enrolled_for_teacher(&db.pool, maria).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unlink_keeps_other_teachers_links() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        let joao = teacher(&db, "joao@edumanage.com").await;
        let turma_a = class(&db, maria, "Turma A").await;
        let turma_c = class(&db, joao, "Turma C").await;

        let ana = Student::create(&db.pool, &values("Ana", "2024001", StudentStatus::Active), maria)
            .await
            .unwrap();
        Student::link_to_class(&db.pool, ana.id, turma_a).await.unwrap();
        Student::link_to_class(&db.pool, ana.id, turma_c).await.unwrap();

        assert_eq!(Student::unlink_from_teacher_classes(&db.pool, ana.id, maria).await.unwrap(), 1);
        assert!(Student::classes_owned_by(&db.pool, ana.id, maria).await.unwrap().is_empty());
        assert_eq!(Student::classes_owned_by(&db.pool, ana.id, joao).await.unwrap().len(), 1);
    }
}
