//! Credential service: password hashing, session tokens, login and registration.

use std::str::FromStr;

use chrono::{Duration, Utc};
use db::models::{
    notification::NotificationKind,
    user::{CreateUser, User, UserRole},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use super::{config::AdminBootstrap, notification::NotificationService};

pub const SESSION_COOKIE: &str = "auth-token";
pub const SESSION_TTL_HOURS: i64 = 24;
const BCRYPT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("token encoding failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("{0}")]
    Validation(String),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    user_id: Uuid,
    email: String,
    name: String,
    role: UserRole,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST)).await??;
    Ok(hash)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(valid)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issues and checks HS256 session tokens and owns the login/registration flow.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_token(&self, user: &SessionUser) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// `None` for any token that is malformed, expired or signed with another key.
    pub fn verify_token(&self, token: &str) -> Option<SessionUser> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(SessionUser {
                id: data.claims.user_id,
                name: data.claims.name,
                email: data.claims.email,
                role: data.claims.role,
            }),
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                None
            }
        }
    }

    /// Checks the credentials and returns the user with a fresh token.
    pub async fn login(
        &self,
        pool: &SqlitePool,
        request: &LoginRequest,
    ) -> Result<(SessionUser, String), AuthError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = User::find_by_email(pool, &email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&request.password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let session = SessionUser::from(user);
        let token = self.issue_token(&session)?;
        info!(user_id = %session.id, "User logged in");
        Ok((session, token))
    }

    /// Creates a user account. Callers are responsible for the admin check.
    pub async fn register(
        &self,
        pool: &SqlitePool,
        input: &CreateUser,
    ) -> Result<SessionUser, AuthError> {
        let name = input.name.trim();
        let email = normalize_email(&input.email);
        let role = input.role.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() || email.is_empty() || input.password.is_empty() || role.is_empty() {
            return Err(AuthError::Validation(
                "Name, email, password and role are required".to_string(),
            ));
        }
        if name.chars().count() < 3 {
            return Err(AuthError::Validation(
                "Name must be at least 3 characters".to_string(),
            ));
        }
        if input.password.chars().count() < 6 {
            return Err(AuthError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        let role = UserRole::from_str(role)
            .map_err(|_| AuthError::Validation("Role must be admin or teacher".to_string()))?;

        if User::find_by_email(pool, &email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&input.password).await?;
        let user = User::create(pool, name, &email, &password_hash, role)
            .await
            .map_err(|e| {
                if db::is_unique_violation(&e) {
                    AuthError::EmailTaken
                } else {
                    AuthError::Database(e)
                }
            })?;

        NotificationService::notify(
            pool,
            user.id,
            NotificationKind::Success,
            "Welcome to EduManage! Your account was created successfully.",
        )
        .await;
        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user.into())
    }

    /// Creates the configured administrator unless the email is already taken.
    pub async fn ensure_default_admin(
        &self,
        pool: &SqlitePool,
        admin: &AdminBootstrap,
    ) -> Result<Option<SessionUser>, AuthError> {
        let email = normalize_email(&admin.email);
        if User::find_by_email(pool, &email).await?.is_some() {
            debug!(email = %email, "Administrator already present");
            return Ok(None);
        }

        let password_hash = hash_password(&admin.password).await?;
        let user = User::create(pool, admin.name.trim(), &email, &password_hash, UserRole::Admin).await?;
        info!(user_id = %user.id, email = %email, "Created default administrator");
        Ok(Some(user.into()))
    }
}
