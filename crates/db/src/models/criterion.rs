use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// A weighted evaluation criterion belonging to one class.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, TS)]
pub struct Criterion {
    pub id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub weight: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateCriterion {
    #[serde(default)]
    pub name: String,
    pub weight: Option<f64>,
    pub description: Option<String>,
}

pub type UpdateCriterion = CreateCriterion;

/// Validated values ready to be written.
#[derive(Debug, Clone)]
pub struct CriterionValues {
    pub name: String,
    pub weight: f64,
    pub description: Option<String>,
}

const CRITERION_COLUMNS: &str = "id, class_id, name, weight, description, created_at, updated_at";

impl Criterion {
    /// All criteria of a class, oldest first.
    pub async fn find_by_class_id(
        pool: &SqlitePool,
        class_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Criterion>(&format!(
            "SELECT {CRITERION_COLUMNS}
             FROM criteria
             WHERE class_id = ?
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(class_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Criterion>(&format!(
            "SELECT {CRITERION_COLUMNS} FROM criteria WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Returns the criterion only when its class is owned by `teacher_id`.
    pub async fn find_owned(
        pool: &SqlitePool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Criterion>(
            r#"SELECT cr.id, cr.class_id, cr.name, cr.weight, cr.description,
                      cr.created_at, cr.updated_at
               FROM criteria cr
               JOIN teacher_classes tc ON tc.class_id = cr.class_id
               WHERE cr.id = ? AND tc.teacher_id = ?"#,
        )
        .bind(id)
        .bind(teacher_id)
        .fetch_optional(pool)
        .await
    }

    /// Inserts the criterion only if the class total stays within `limit`.
    /// The sum and the insert run as one statement, so two concurrent writers
    /// cannot both slip under the bound. `None` means the guard rejected it.
    pub async fn create_within_limit(
        pool: &SqlitePool,
        class_id: Uuid,
        values: &CriterionValues,
        limit: f64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Criterion>(&format!(
            "INSERT INTO criteria (id, class_id, name, weight, description)
             SELECT ?1, ?2, ?3, ?4, ?5
             WHERE (SELECT COALESCE(SUM(weight), 0) FROM criteria WHERE class_id = ?2) + ?4 <= ?6
             RETURNING {CRITERION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(class_id)
        .bind(&values.name)
        .bind(values.weight)
        .bind(&values.description)
        .bind(limit)
        .fetch_optional(pool)
        .await
    }

    /// Updates the criterion only if the other criteria of its class plus the
    /// new weight stay within `limit`. `None` means the guard rejected it.
    pub async fn update_within_limit(
        pool: &SqlitePool,
        id: Uuid,
        class_id: Uuid,
        values: &CriterionValues,
        limit: f64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Criterion>(&format!(
            "UPDATE criteria
             SET name = ?2, weight = ?3, description = ?4,
                 updated_at = datetime('now', 'subsec')
             WHERE id = ?1
               AND (SELECT COALESCE(SUM(weight), 0) FROM criteria
                    WHERE class_id = ?5 AND id <> ?1) + ?3 <= ?6
             RETURNING {CRITERION_COLUMNS}"
        ))
        .bind(id)
        .bind(&values.name)
        .bind(values.weight)
        .bind(&values.description)
        .bind(class_id)
        .bind(limit)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM criteria WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_teacher(pool: &SqlitePool, teacher_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*)
               FROM criteria cr
               JOIN teacher_classes tc ON tc.class_id = cr.class_id
               WHERE tc.teacher_id = ?"#,
        )
        .bind(teacher_id)
        .fetch_one(pool)
        .await
    }
}
