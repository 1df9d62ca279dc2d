// src/db/uploads.rs

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::decode;
use crate::models::{ResumableUpload, UploadStatus, UploadedPart};

const SESSION_COLUMNS: &str = "id, user_id, bucket, file_path, content_type, provider_upload_id, total_size, \
     uploaded_bytes, parts, status, expires_at, created_at";

fn session_from_row(r: &PgRow) -> Result<ResumableUpload, sqlx::Error> {
    let parts: Json<Vec<UploadedPart>> = r.get("parts");
    Ok(ResumableUpload {
        id: r.get("id"),
        user_id: r.get("user_id"),
        bucket: r.get("bucket"),
        file_path: r.get("file_path"),
        content_type: r.get("content_type"),
        provider_upload_id: r.get("provider_upload_id"),
        total_size: r.get("total_size"),
        uploaded_bytes: r.get("uploaded_bytes"),
        parts: parts.0,
        status: decode::<UploadStatus>(r.get("status"))?,
        expires_at: r.get("expires_at"),
        created_at: r.get("created_at"),
    })
}

pub struct NewUploadSession<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bucket: &'a str,
    pub file_path: &'a str,
    pub content_type: &'a str,
    pub provider_upload_id: &'a str,
    pub total_size: i64,
    pub expires_at: DateTime<Utc>,
}

pub async fn insert_session(pool: &PgPool, session: NewUploadSession<'_>) -> Result<ResumableUpload, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO resumable_uploads
                (id, user_id, bucket, file_path, content_type, provider_upload_id, total_size, expires_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
           RETURNING {SESSION_COLUMNS}"#
    ))
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.bucket)
    .bind(session.file_path)
    .bind(session.content_type)
    .bind(session.provider_upload_id)
    .bind(session.total_size)
    .bind(session.expires_at)
    .fetch_one(pool)
    .await?;

    session_from_row(&row)
}

pub async fn get_session(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> Result<Option<ResumableUpload>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SESSION_COLUMNS} FROM resumable_uploads WHERE id = $1 AND user_id = $2"
    ))
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Appends a part and bumps `uploaded_bytes`, guarded so the total never
/// exceeds `total_size` and terminal sessions are never touched.
pub async fn append_part(
    pool: &PgPool,
    session_id: Uuid,
    part: &UploadedPart,
) -> Result<Option<ResumableUpload>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"UPDATE resumable_uploads
           SET parts = parts || $2::jsonb,
               uploaded_bytes = uploaded_bytes + $3,
               status = 'uploading',
               updated_at = NOW()
           WHERE id = $1
             AND status IN ('initialized', 'uploading')
             AND uploaded_bytes + $3 <= total_size
           RETURNING {SESSION_COLUMNS}"#
    ))
    .bind(session_id)
    .bind(Json(vec![part]))
    .bind(part.size)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(session_from_row).transpose()
}

pub async fn set_status(pool: &PgPool, session_id: Uuid, status: UploadStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE resumable_uploads SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status.as_str())
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub struct NewStoredFile<'a> {
    pub user_id: Uuid,
    pub file_name: &'a str,
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
    pub url: &'a str,
    pub key: &'a str,
    pub bucket: &'a str,
}

pub async fn record_file(pool: &PgPool, file: NewStoredFile<'_>) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO file_storage (id, user_id, file_name, original_name, mime_type, size, url, key, bucket)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
           RETURNING id"#,
    )
    .bind(Uuid::new_v4())
    .bind(file.user_id)
    .bind(file.file_name)
    .bind(file.original_name)
    .bind(file.mime_type)
    .bind(file.size)
    .bind(file.url)
    .bind(file.key)
    .bind(file.bucket)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}
