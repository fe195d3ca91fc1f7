use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;
use utils::text::contains_ignore_case;
use uuid::Uuid;

/// A class ("turma"), owned by the teachers linked through `teacher_classes`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub academic_year: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ClassWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub class: Class,
    pub student_count: i64,
    pub criteria_count: i64,
}

impl std::ops::Deref for ClassWithCounts {
    type Target = Class;
    fn deref(&self) -> &Self::Target {
        &self.class
    }
}

/// Request body for creating or updating a class. Fields default to empty so
/// that missing values surface as validation errors rather than parse errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateClass {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub academic_year: String,
}

pub type UpdateClass = CreateClass;

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ClassFilter {
    pub search: Option<String>,
    pub subject: Option<String>,
    pub academic_year: Option<String>,
}

const CLASS_COLUMNS: &str = "c.id, c.name, c.subject, c.academic_year, c.created_at, c.updated_at";

const COUNT_COLUMNS: &str = r#"(SELECT COUNT(*) FROM class_students cs WHERE cs.class_id = c.id) AS student_count,
       (SELECT COUNT(*) FROM criteria cr WHERE cr.class_id = c.id) AS criteria_count"#;

impl Class {
    /// Classes owned by `teacher_id`, newest first, narrowed by `filter`.
    pub async fn find_owned_by_teacher(
        pool: &SqlitePool,
        teacher_id: Uuid,
        filter: &ClassFilter,
    ) -> Result<Vec<ClassWithCounts>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {CLASS_COLUMNS}, {COUNT_COLUMNS}
             FROM classes c
             JOIN teacher_classes tc ON tc.class_id = c.id
             WHERE tc.teacher_id = "
        ));
        query.push_bind(teacher_id);

        if let Some(subject) = filter.subject.as_deref().filter(|s| !s.is_empty()) {
            query.push(" AND c.subject = ").push_bind(subject.to_string());
        }
        if let Some(year) = filter.academic_year.as_deref().filter(|s| !s.is_empty()) {
            query.push(" AND c.academic_year = ").push_bind(year.to_string());
        }
        query.push(" ORDER BY c.created_at DESC, c.rowid DESC");

        let mut classes = query
            .build_query_as::<ClassWithCounts>()
            .fetch_all(pool)
            .await?;

        // SQLite LIKE only folds ASCII; accented names are matched here.
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            classes.retain(|c| {
                contains_ignore_case(&c.name, search) || contains_ignore_case(&c.subject, search)
            });
        }
        Ok(classes)
    }

    /// Caller's classes ordered by name, for CSV export.
    pub async fn find_for_export(
        pool: &SqlitePool,
        teacher_id: Uuid,
    ) -> Result<Vec<ClassWithCounts>, sqlx::Error> {
        sqlx::query_as::<_, ClassWithCounts>(&format!(
            "SELECT {CLASS_COLUMNS}, {COUNT_COLUMNS}
             FROM classes c
             JOIN teacher_classes tc ON tc.class_id = c.id
             WHERE tc.teacher_id = ?
             ORDER BY c.name ASC"
        ))
        .bind(teacher_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_recent_for_teacher(
        pool: &SqlitePool,
        teacher_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ClassWithCounts>, sqlx::Error> {
        sqlx::query_as::<_, ClassWithCounts>(&format!(
            "SELECT {CLASS_COLUMNS}, {COUNT_COLUMNS}
             FROM classes c
             JOIN teacher_classes tc ON tc.class_id = c.id
             WHERE tc.teacher_id = ?
             ORDER BY c.created_at DESC, c.rowid DESC
             LIMIT ?"
        ))
        .bind(teacher_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Returns the class only when `teacher_id` is linked to it.
    pub async fn find_owned(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Class>(&format!(
            "SELECT {CLASS_COLUMNS}
             FROM classes c
             JOIN teacher_classes tc ON tc.class_id = c.id
             WHERE c.id = ? AND tc.teacher_id = ?"
        ))
        .bind(id)
        .bind(teacher_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_owned_with_counts(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Option<ClassWithCounts>, sqlx::Error> {
        sqlx::query_as::<_, ClassWithCounts>(&format!(
            "SELECT {CLASS_COLUMNS}, {COUNT_COLUMNS}
             FROM classes c
             JOIN teacher_classes tc ON tc.class_id = c.id
             WHERE c.id = ? AND tc.teacher_id = ?"
        ))
        .bind(id)
        .bind(teacher_id)
        .fetch_optional(pool)
        .await
    }

    /// Inserts the class and links `teacher_id` as its owner in one transaction.
    pub async fn create(
        pool: &SqlitePool,
        teacher_id: Uuid,
        data: &CreateClass,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let class = sqlx::query_as::<_, Class>(
            r#"INSERT INTO classes (id, name, subject, academic_year)
               VALUES (?, ?, ?, ?)
               RETURNING id, name, subject, academic_year, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(&data.subject)
        .bind(&data.academic_year)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO teacher_classes (teacher_id, class_id) VALUES (?, ?)")
            .bind(teacher_id)
            .bind(class.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(class)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateClass,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Class>(
            r#"UPDATE classes
               SET name = ?, subject = ?, academic_year = ?,
                   updated_at = datetime('now', 'subsec')
               WHERE id = ?
               RETURNING id, name, subject, academic_year, created_at, updated_at"#,
        )
        .bind(&data.name)
        .bind(&data.subject)
        .bind(&data.academic_year)
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// Deletes the class; join rows and criteria go with it (ON DELETE CASCADE).
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM classes WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_teacher(pool: &SqlitePool, teacher_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM teacher_classes WHERE teacher_id = ?")
            .bind(teacher_id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::user::{User, UserRole},
    };

    async fn teacher(db: &DBService, email: &str) -> Uuid {
        User::create(&db.pool, "Teacher", email, "hash", UserRole::Teacher)
            .await
            .unwrap()
            .id
    }

    fn class(name: &str, subject: &str) -> CreateClass {
        CreateClass {
            name: name.to_string(),
            subject: subject.to_string(),
            academic_year: "2024".to_string(),
        }
    }

    #[tokio::test]
    async fn listing_is_scoped_to_owner() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        let joao = teacher(&db, "joao@edumanage.com").await;

        Class::create(&db.pool, maria, &class("Turma A", "Matemática")).await.unwrap();
        let other = Class::create(&db.pool, joao, &class("Turma C", "Ciências")).await.unwrap();

        let listed = Class::find_owned_by_teacher(&db.pool, maria, &ClassFilter::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Turma A");
        assert!(Class::find_owned(&db.pool, other.id, maria).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_matches_name_or_subject_case_insensitively() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        Class::create(&db.pool, maria, &class("Turma A", "Matematica")).await.unwrap();
        Class::create(&db.pool, maria, &class("Turma B", "Portugues")).await.unwrap();

        let filter = ClassFilter {
            search: Some("MATEM".to_string()),
            ..Default::default()
        };
        let listed = Class::find_owned_by_teacher(&db.pool, maria, &filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].subject, "Matematica");

        Class::create(&db.pool, maria, &class("Turma Ç", "MATEMÁTICA")).await.unwrap();
        let filter = ClassFilter {
            search: Some("matemática".to_string()),
            ..Default::default()
        };
        let listed = Class::find_owned_by_teacher(&db.pool, maria, &filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].subject, "MATEMÁTICA");
        let filter = ClassFilter {
            search: Some("turma ç".to_string()),
            ..Default::default()
        };
        let listed = Class::find_owned_by_teacher(&db.pool, maria, &filter).await.unwrap();
        assert_eq!(listed.len(), 1);

        let filter = ClassFilter {
            subject: Some("Portugues".to_string()),
            ..Default::default()
        };
        let listed = Class::find_owned_by_teacher(&db.pool, maria, &filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Turma B");
    }

    #[tokio::test]
    async fn delete_cascades_to_owner_links() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        let created = Class::create(&db.pool, maria, &class("Turma A", "Matemática")).await.unwrap();
        assert_eq!(Class::count_for_teacher(&db.pool, maria).await.unwrap(), 1);

        assert_eq!(Class::delete(&db.pool, created.id).await.unwrap(), 1);
        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teacher_classes WHERE class_id = ?")
            .bind(created.id)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(links, 0);
        assert_eq!(Class::count_for_teacher(&db.pool, maria).await.unwrap(), 0);
    }
}
