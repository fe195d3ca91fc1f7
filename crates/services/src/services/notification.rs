//! Service for the per-user notification feed.

use std::str::FromStr;

use db::models::notification::{CreateNotification, Notification, NotificationKind};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::warn;
use ts_rs::TS;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("Notification not found")]
    NotFound,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Clone, Default)]
pub struct NotificationService;

impl NotificationService {
    /// Records a notification for `user_id`. Failures are logged and dropped;
    /// the action that triggered the notification has already succeeded.
    pub async fn notify(pool: &SqlitePool, user_id: Uuid, kind: NotificationKind, message: &str) {
        if let Err(e) = Notification::create(pool, user_id, kind, message).await {
            warn!(user_id = %user_id, error = %e, "Failed to create notification");
        }
    }

    pub async fn list(
        pool: &SqlitePool,
        user_id: Uuid,
        query: &NotificationQuery,
    ) -> Result<NotificationPage, NotificationError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);

        let notifications =
            Notification::find_for_user(pool, user_id, query.unread_only, limit, offset).await?;
        let total = Notification::count_for_user(pool, user_id, query.unread_only).await?;

        Ok(NotificationPage {
            notifications,
            total,
            limit,
            offset,
        })
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        input: &CreateNotification,
    ) -> Result<Notification, NotificationError> {
        let message = input.message.trim();
        let kind = input.kind.as_deref().map(str::trim).unwrap_or_default();
        if message.is_empty() || kind.is_empty() {
            return Err(NotificationError::Validation(
                "Kind and message are required".to_string(),
            ));
        }
        let kind = NotificationKind::from_str(kind).map_err(|_| {
            NotificationError::Validation(
                "Kind must be one of info, success, warning, error".to_string(),
            )
        })?;

        Ok(Notification::create(pool, user_id, kind, message).await?)
    }

    pub async fn get(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Notification, NotificationError> {
        Notification::find_for_recipient(pool, id, user_id)
            .await?
            .ok_or(NotificationError::NotFound)
    }

    pub async fn mark_read(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Notification, NotificationError> {
        Notification::mark_read(pool, id, user_id)
            .await?
            .ok_or(NotificationError::NotFound)
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<(), NotificationError> {
        match Notification::delete_for_recipient(pool, id, user_id).await? {
            0 => Err(NotificationError::NotFound),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::user::{User, UserRole},
    };

    use super::*;

    async fn teacher(db: &DBService, email: &str) -> Uuid {
        User::create(&db.pool, "Teacher", email, "hash", UserRole::Teacher)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn list_clamps_limit_and_counts_total() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        for i in 0..3 {
            NotificationService::notify(&db.pool, maria, NotificationKind::Info, &format!("n{i}")).await;
        }

        let page = NotificationService::list(
            &db.pool,
            maria,
            &NotificationQuery {
                limit: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.limit, 1);
        assert_eq!(page.total, 3);
        assert_eq!(page.notifications.len(), 1);
        assert_eq!(page.notifications[0].message, "n2");

        let page = NotificationService::list(
            &db.pool,
            maria,
            &NotificationQuery {
                limit: Some(500),
                offset: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(page.notifications.len(), 2);
    }

    #[tokio::test]
    async fn create_requires_a_known_kind_and_message() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;

        let missing = CreateNotification {
            kind: None,
            message: "hello".to_string(),
        };
        assert!(matches!(
            NotificationService::create(&db.pool, maria, &missing).await,
            Err(NotificationError::Validation(_))
        ));

        let unknown = CreateNotification {
            kind: Some("sucesso".to_string()),
            message: "hello".to_string(),
        };
        assert!(matches!(
            NotificationService::create(&db.pool, maria, &unknown).await,
            Err(NotificationError::Validation(_))
        ));

        let ok = CreateNotification {
            kind: Some("warning".to_string()),
            message: "  hello  ".to_string(),
        };
        let created = NotificationService::create(&db.pool, maria, &ok).await.unwrap();
        assert_eq!(created.kind, NotificationKind::Warning);
        assert_eq!(created.message, "hello");
        assert!(!created.is_read);
    }

    #[tokio::test]
    async fn notify_swallows_failures() {
        let db = DBService::new_in_memory().await.unwrap();
        // Unknown recipient violates the foreign key; nothing is raised.
        NotificationService::notify(&db.pool, Uuid::new_v4(), NotificationKind::Error, "lost").await;
    }

    #[tokio::test]
    async fn other_users_cannot_touch_a_notification() {
        let db = DBService::new_in_memory().await.unwrap();
        let maria = teacher(&db, "maria@edumanage.com").await;
        let joao = teacher(&db, "joao@edumanage.com").await;
        let created = Notification::create(&db.pool, maria, NotificationKind::Info, "mine")
            .await
            .unwrap();

        assert!(matches!(
            NotificationService::get(&db.pool, created.id, joao).await,
            Err(NotificationError::NotFound)
        ));
        assert!(matches!(
            NotificationService::delete(&db.pool, created.id, joao).await,
            Err(NotificationError::NotFound)
        ));
        NotificationService::delete(&db.pool, created.id, maria).await.unwrap();
    }
}
