use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// Audit-trail entry addressed to one user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateNotification {
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, message, is_read, created_at";

impl Notification {
    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        kind: NotificationKind,
        message: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (id, user_id, kind, message)
             VALUES (?, ?, ?, ?)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(message)
        .fetch_one(pool)
        .await
    }

    /// Newest first.
    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS}
             FROM notifications
             WHERE user_id = ? AND (? = 0 OR is_read = 0)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_user(
        pool: &SqlitePool,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND (? = 0 OR is_read = 0)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(pool)
        .await
    }

    pub async fn find_for_recipient(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// `None` when the notification does not exist or belongs to someone else.
    pub async fn mark_read(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET is_read = 1
             WHERE id = ? AND user_id = ?
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_for_recipient(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
