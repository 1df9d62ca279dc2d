// src/db/webhooks.rs

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::PluginWebhook;

const WEBHOOK_COLUMNS: &str =
    "id, user_id, url, secret, events, is_active, success_count, failure_count, last_triggered_at, created_at";

fn webhook_from_row(r: &PgRow) -> PluginWebhook {
    PluginWebhook {
        id: r.get("id"),
        user_id: r.get("user_id"),
        url: r.get("url"),
        secret: r.get("secret"),
        events: r.get("events"),
        is_active: r.get("is_active"),
        success_count: r.get("success_count"),
        failure_count: r.get("failure_count"),
        last_triggered_at: r.get("last_triggered_at"),
        created_at: r.get("created_at"),
    }
}

pub async fn create_webhook(
    pool: &PgPool,
    user_id: Uuid,
    url: &str,
    secret: &str,
    events: &[String],
) -> Result<PluginWebhook, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO plugin_webhooks (id, user_id, url, secret, events)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING {WEBHOOK_COLUMNS}"#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(url)
    .bind(secret)
    .bind(events)
    .fetch_one(pool)
    .await?;

    Ok(webhook_from_row(&row))
}

pub async fn list_webhooks(pool: &PgPool, user_id: Uuid) -> Result<Vec<PluginWebhook>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {WEBHOOK_COLUMNS} FROM plugin_webhooks WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(webhook_from_row).collect())
}

/// Deletes only the caller's own webhook.
pub async fn delete_webhook(pool: &PgPool, webhook_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM plugin_webhooks WHERE id = $1 AND user_id = $2")
        .bind(webhook_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn active_for_event(pool: &PgPool, user_id: Uuid, event: &str) -> Result<Vec<PluginWebhook>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {WEBHOOK_COLUMNS} FROM plugin_webhooks
           WHERE user_id = $1 AND is_active = true AND $2 = ANY(events)"#
    ))
    .bind(user_id)
    .bind(event)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(webhook_from_row).collect())
}

pub async fn record_delivery(pool: &PgPool, webhook_id: Uuid, success: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE plugin_webhooks
           SET success_count = success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
               failure_count = failure_count + CASE WHEN $2 THEN 0 ELSE 1 END,
               last_triggered_at = NOW()
           WHERE id = $1"#,
    )
    .bind(webhook_id)
    .bind(success)
    .execute(pool)
    .await?;
    Ok(())
}
