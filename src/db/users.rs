// src/db/users.rs

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::models::User;

pub struct UserCredentials {
    pub id: Uuid,
    pub name: Option<String>,
    pub password_hash: String,
    pub email_verified: bool,
}

/// Purpose column of `auth_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
}

impl TokenPurpose {
    fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::EmailVerification => "email_verification",
        }
    }
}

pub async fn create_user(
    pool: &PgPool,
    email: &str,
    name: Option<&str>,
    password_hash: &str,
) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO users (id, email, name, password_hash)
           VALUES ($1, $2, $3, $4)
           RETURNING id"#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, email, name, email_verified, created_at
           FROM users
           WHERE id = $1 AND is_active = true"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| User {
        id: r.get("id"),
        email: r.get("email"),
        name: r.get("name"),
        email_verified: r.get("email_verified"),
        created_at: r.get("created_at"),
    }))
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserCredentials>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, name, password_hash, email_verified
           FROM users
           WHERE lower(email) = lower($1) AND is_active = true"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| UserCredentials {
        id: r.get("id"),
        name: r.get("name"),
        password_hash: r.get("password_hash"),
        email_verified: r.get("email_verified"),
    }))
}

pub async fn touch_login(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_password(pool: &PgPool, user_id: Uuid, password_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_email_verified(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET email_verified = true, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Serializes per-user writes that check a count first (project creation).
pub async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM users WHERE id = $1 FOR NO KEY UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn create_auth_token(
    pool: &PgPool,
    user_id: Uuid,
    purpose: TokenPurpose,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO auth_tokens (id, user_id, purpose, token_hash, expires_at)
           VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks a token used and returns its owner. Expired, used and unknown tokens
/// all yield `None`.
pub async fn consume_auth_token(
    pool: &PgPool,
    purpose: TokenPurpose,
    token_hash: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE auth_tokens
           SET used_at = NOW()
           WHERE purpose = $1 AND token_hash = $2
             AND used_at IS NULL AND expires_at > NOW()
           RETURNING user_id"#,
    )
    .bind(purpose.as_str())
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("user_id")))
}
