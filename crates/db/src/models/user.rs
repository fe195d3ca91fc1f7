use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Teacher,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<String>,
}

impl User {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password_hash, role, created_at, updated_at
               FROM users
               WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password_hash, role, created_at, updated_at
               FROM users
               WHERE email = ?"#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// `email` is stored as given; callers normalize it first.
    pub async fn create(
        pool: &SqlitePool,
        name: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, name, email, password_hash, role)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id, name, email, password_hash, role, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn create_and_find_by_email() {
        let db = DBService::new_in_memory().await.unwrap();
        let created = User::create(&db.pool, "Maria Silva", "maria@edumanage.com", "hash", UserRole::Teacher)
            .await
            .unwrap();

        let found = User::find_by_email(&db.pool, "maria@edumanage.com")
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(found.id, created.id);
        assert_eq!(found.role, UserRole::Teacher);
        assert!(User::find_by_email(&db.pool, "nobody@edumanage.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let db = DBService::new_in_memory().await.unwrap();
        User::create(&db.pool, "Ana", "ana@edumanage.com", "hash", UserRole::Admin)
            .await
            .unwrap();
        let err = User::create(&db.pool, "Ana 2", "ana@edumanage.com", "hash", UserRole::Teacher)
            .await
            .unwrap_err();
        assert!(crate::is_unique_violation(&err));
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "João".to_string(),
            email: "joao@edumanage.com".to_string(),
            password_hash: "secret".to_string(),
            role: UserRole::Teacher,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "teacher");
    }
}
