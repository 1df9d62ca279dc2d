// src/db/api_keys.rs

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::PluginApiKey;

const KEY_COLUMNS: &str = "id, user_id, name, key_prefix, scopes, expires_at, last_used_at, is_active, created_at";

fn key_from_row(r: &PgRow) -> PluginApiKey {
    PluginApiKey {
        id: r.get("id"),
        user_id: r.get("user_id"),
        name: r.get("name"),
        key_prefix: r.get("key_prefix"),
        scopes: r.get("scopes"),
        expires_at: r.get("expires_at"),
        last_used_at: r.get("last_used_at"),
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
    }
}

pub async fn create_key(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    key_hash: &str,
    key_prefix: &str,
    scopes: &[String],
    expires_at: Option<DateTime<Utc>>,
) -> Result<PluginApiKey, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO plugin_api_keys (id, user_id, name, key_hash, key_prefix, scopes, expires_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING {KEY_COLUMNS}"#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(key_hash)
    .bind(key_prefix)
    .bind(scopes)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(key_from_row(&row))
}

/// Looks up an active, unexpired key by its hash.
pub async fn find_active_by_hash(pool: &PgPool, key_hash: &str) -> Result<Option<PluginApiKey>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"SELECT {KEY_COLUMNS} FROM plugin_api_keys
           WHERE key_hash = $1
             AND is_active = true
             AND (expires_at IS NULL OR expires_at > NOW())"#
    ))
    .bind(key_hash)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(key_from_row))
}

pub async fn touch_last_used(pool: &PgPool, key_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE plugin_api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(key_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_keys(pool: &PgPool, user_id: Uuid) -> Result<Vec<PluginApiKey>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {KEY_COLUMNS} FROM plugin_api_keys WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(key_from_row).collect())
}

pub async fn revoke_key(pool: &PgPool, key_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE plugin_api_keys SET is_active = false, updated_at = NOW()
           WHERE id = $1 AND user_id = $2 AND is_active = true"#,
    )
    .bind(key_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
