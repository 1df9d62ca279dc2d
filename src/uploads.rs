// src/uploads.rs
//
// Resumable uploads on top of S3 multipart uploads. A session row tracks the
// provider upload id, the parts sent so far and the 24 h expiry.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db;
use crate::db::uploads::NewUploadSession;
use crate::error::{ApiError, ApiResult};
use crate::models::{ResumableUpload, UploadStatus, UploadedPart};
use crate::s3_utils::{build_public_url, file_extension, UploadTarget};
use crate::AppState;

pub const SESSION_TTL_HOURS: i64 = 24;

/// `round(uploaded / total * 100)`, clamped to 0..=100.
pub fn progress_percent(uploaded_bytes: i64, total_size: i64) -> u32 {
    if total_size <= 0 {
        return 0;
    }
    let pct = (uploaded_bytes as f64 / total_size as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u32
}

pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub session_id: Uuid,
    pub status: UploadStatus,
    pub uploaded_bytes: i64,
    pub total_size: i64,
    pub progress: u32,
    pub parts: usize,
    pub expires_at: DateTime<Utc>,
}

impl UploadProgress {
    pub fn of(session: &ResumableUpload) -> Self {
        UploadProgress {
            session_id: session.id,
            status: session.status,
            uploaded_bytes: session.uploaded_bytes,
            total_size: session.total_size,
            progress: progress_percent(session.uploaded_bytes, session.total_size),
            parts: session.parts.len(),
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinalizedUpload {
    pub url: String,
    pub key: String,
    pub size: i64,
}

pub struct InitUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub total_size: i64,
    pub target: UploadTarget,
}

pub async fn init(state: &AppState, user_id: Uuid, req: InitUpload) -> ApiResult<ResumableUpload> {
    if req.total_size <= 0 {
        return Err(ApiError::Validation("File size must be greater than 0".into()));
    }

    let session_id = Uuid::new_v4();
    let ext = file_extension(req.file_name.as_deref(), &req.content_type);
    let key = req.target.object_key(user_id, session_id, &ext);
    let bucket = state.config.s3_bucket.as_str();

    let created = state
        .s3_client
        .create_multipart_upload()
        .bucket(bucket)
        .key(&key)
        .content_type(&req.content_type)
        .send()
        .await
        .map_err(|e| ApiError::Storage(format!("create multipart upload: {e}")))?;
    let provider_upload_id = created
        .upload_id()
        .ok_or_else(|| ApiError::Storage("multipart upload id missing".into()))?;

    let session = db::uploads::insert_session(
        &state.pool,
        NewUploadSession {
            id: session_id,
            user_id,
            bucket,
            file_path: &key,
            content_type: &req.content_type,
            provider_upload_id,
            total_size: req.total_size,
            expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
        },
    )
    .await?;

    log::info!("upload session {session_id} started for {key} ({} bytes)", req.total_size);
    Ok(session)
}

async fn load_open_session(state: &AppState, session_id: Uuid, user_id: Uuid) -> ApiResult<ResumableUpload> {
    let session = db::uploads::get_session(&state.pool, session_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Upload session".into()))?;

    if session.status == UploadStatus::Expired
        || (!session.status.is_terminal() && is_expired(session.expires_at, Utc::now()))
    {
        db::uploads::set_status(&state.pool, session.id, UploadStatus::Expired).await?;
        return Err(ApiError::BadRequest("Upload session has expired".into()));
    }
    Ok(session)
}

pub async fn upload_chunk(state: &AppState, session_id: Uuid, user_id: Uuid, chunk: &[u8]) -> ApiResult<ResumableUpload> {
    let session = load_open_session(state, session_id, user_id).await?;
    if session.status.is_terminal() {
        return Err(ApiError::BadRequest(format!("Upload session is {}", session.status)));
    }
    if chunk.is_empty() {
        return Err(ApiError::Validation("Chunk is empty".into()));
    }
    let size = chunk.len() as i64;
    if session.uploaded_bytes + size > session.total_size {
        return Err(ApiError::BadRequest("Chunk exceeds declared file size".into()));
    }

    let part_number = session.parts.len() as i32 + 1;
    let uploaded = state
        .s3_client
        .upload_part()
        .bucket(&session.bucket)
        .key(&session.file_path)
        .upload_id(&session.provider_upload_id)
        .part_number(part_number)
        .body(ByteStream::from(chunk.to_vec()))
        .send()
        .await
        .map_err(|e| ApiError::Storage(format!("upload part: {e}")))?;
    let etag = uploaded.e_tag().unwrap_or_default().to_string();

    let part = UploadedPart {
        part_number,
        etag,
        size,
    };
    db::uploads::append_part(&state.pool, session.id, &part)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Upload session no longer accepts chunks".into()))
}

pub async fn status(state: &AppState, session_id: Uuid, user_id: Uuid) -> ApiResult<UploadProgress> {
    let session = load_open_session(state, session_id, user_id).await?;
    // Finalized and failed sessions stop reporting at expiry too.
    if is_expired(session.expires_at, Utc::now()) {
        return Err(ApiError::BadRequest("Upload session has expired".into()));
    }
    Ok(UploadProgress::of(&session))
}

/// Completes the multipart upload. Finalizing twice returns the same result.
pub async fn finalize(state: &AppState, session_id: Uuid, user_id: Uuid) -> ApiResult<FinalizedUpload> {
    let session = load_open_session(state, session_id, user_id).await?;
    let public_base = state.config.s3_public_base_url.as_str();
    let finalized = |s: &ResumableUpload| FinalizedUpload {
        url: build_public_url(public_base, &s.bucket, &s.file_path),
        key: s.file_path.clone(),
        size: s.total_size,
    };

    match session.status {
        UploadStatus::Finalized => return Ok(finalized(&session)),
        UploadStatus::Failed | UploadStatus::Expired => {
            return Err(ApiError::BadRequest(format!("Upload session is {}", session.status)))
        }
        UploadStatus::Initialized | UploadStatus::Uploading => {}
    }
    if session.uploaded_bytes != session.total_size {
        return Err(ApiError::BadRequest(format!(
            "Upload incomplete: {} of {} bytes received",
            session.uploaded_bytes, session.total_size
        )));
    }

    let parts = session
        .parts
        .iter()
        .map(|p| CompletedPart::builder().part_number(p.part_number).e_tag(&p.etag).build())
        .collect::<Vec<_>>();

    if let Err(e) = state
        .s3_client
        .complete_multipart_upload()
        .bucket(&session.bucket)
        .key(&session.file_path)
        .upload_id(&session.provider_upload_id)
        .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(parts)).build())
        .send()
        .await
    {
        db::uploads::set_status(&state.pool, session.id, UploadStatus::Failed).await?;
        return Err(ApiError::Storage(format!("complete multipart upload: {e}")));
    }

    db::uploads::set_status(&state.pool, session.id, UploadStatus::Finalized).await?;
    log::info!("upload session {} finalized as {}", session.id, session.file_path);
    Ok(finalized(&session))
}
