// src/api/uploads.rs

use actix_multipart::Multipart;
use actix_web::{get, post, put, web, HttpResponse};
use aws_sdk_s3::primitives::ByteStream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::uploads::NewStoredFile;
use crate::error::{ApiError, ApiResult};
use crate::s3_utils::{build_public_url, file_extension, sanitize_filename, UploadTarget};
use crate::security::{is_valid_file_size, is_valid_image_type, MAX_IMAGE_BYTES};
use crate::uploads::{self, InitUpload, UploadProgress};
use crate::{db, AppState};

/// Largest body accepted for one resumable chunk.
pub const MAX_CHUNK_BYTES: usize = 16 * 1024 * 1024;

struct FormFile {
    bytes: Vec<u8>,
    file_name: String,
    content_type: String,
}

/// Collects the `file` field and the optional `type` / `projectSlug` fields.
/// Stops reading as soon as the file grows past `MAX_IMAGE_BYTES`.
async fn read_form(mut payload: Multipart) -> ApiResult<(Option<FormFile>, Option<String>, Option<String>)> {
    let mut file = None;
    let mut kind = None;
    let mut project_slug = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?;
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let file_name = field.content_disposition().get_filename().map(sanitize_filename);
        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?;
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(ApiError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => {
                file = Some(FormFile {
                    bytes,
                    file_name: file_name.filter(|n| !n.is_empty()).unwrap_or_else(|| "upload".to_string()),
                    content_type,
                })
            }
            "type" => kind = Some(String::from_utf8_lossy(&bytes).trim().to_string()),
            "projectSlug" | "project_slug" => project_slug = Some(String::from_utf8_lossy(&bytes).trim().to_string()),
            _ => {}
        }
    }

    Ok((file, kind, project_slug))
}

#[utoipa::path(
    post,
    path = "/api/uploads",
    tag = "uploads",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "`file` (image, at most 10 MB), optional `type` and `projectSlug`"),
    responses(
        (status = 201, description = "Stored; returns id, url and key"),
        (status = 400, description = "Missing file or unsupported type"),
        (status = 413, description = "File larger than 10 MB")
    ),
    security(("bearer_auth" = []))
)]
#[post("/uploads")]
pub async fn upload_file(
    payload: Multipart,
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
) -> ApiResult<HttpResponse> {
    let user_id = *user_id;
    let (file, kind, project_slug) = read_form(payload).await?;
    let file = file.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;

    if !is_valid_image_type(&file.content_type) {
        return Err(ApiError::Validation("Invalid file type. Only images are allowed.".into()));
    }
    if !is_valid_file_size(file.bytes.len(), MAX_IMAGE_BYTES) {
        return Err(ApiError::Validation("File is empty or exceeds 10 MB".into()));
    }

    let target = UploadTarget::parse(kind.as_deref(), project_slug.as_deref());
    let object_id = Uuid::new_v4();
    let ext = file_extension(Some(&file.file_name), &file.content_type);
    let key = target.object_key(user_id, object_id, &ext);
    let bucket = state.config.s3_bucket.as_str();
    let size = file.bytes.len() as i64;

    state
        .s3_client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .content_type(&file.content_type)
        .body(ByteStream::from(file.bytes))
        .send()
        .await
        .map_err(|e| ApiError::Storage(format!("put object {key}: {e}")))?;

    let url = build_public_url(&state.config.s3_public_base_url, bucket, &key);
    let stored_name = format!("{object_id}.{ext}");
    let id = db::uploads::record_file(
        &state.pool,
        NewStoredFile {
            user_id,
            file_name: &stored_name,
            original_name: &file.file_name,
            mime_type: &file.content_type,
            size,
            url: &url,
            key: &key,
            bucket,
        },
    )
    .await?;

    log::info!("stored {key} ({size} bytes) for user {user_id}");
    Ok(super::created(json!({ "id": id, "url": url, "key": key, "size": size })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    #[serde(default, alias = "file_name")]
    pub file_name: Option<String>,
    #[serde(alias = "content_type")]
    pub content_type: String,
    #[serde(alias = "total_size")]
    pub total_size: i64,
    /// `upload` (default), `project`, `render` or `receipt`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "project_slug")]
    pub project_slug: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/uploads/resumable",
    tag = "uploads",
    request_body = InitUploadRequest,
    responses(
        (status = 201, description = "Session created", body = UploadProgress),
        (status = 400, description = "Invalid size")
    ),
    security(("bearer_auth" = []))
)]
#[post("/uploads/resumable")]
pub async fn init_resumable(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<InitUploadRequest>,
) -> ApiResult<HttpResponse> {
    let req = payload.into_inner();
    let session = uploads::init(
        &state,
        *user_id,
        InitUpload {
            file_name: req.file_name.map(|n| sanitize_filename(&n)),
            target: UploadTarget::parse(req.kind.as_deref(), req.project_slug.as_deref()),
            content_type: req.content_type,
            total_size: req.total_size,
        },
    )
    .await?;
    Ok(super::created(UploadProgress::of(&session)))
}

#[utoipa::path(
    put,
    path = "/api/uploads/resumable/{id}/chunk",
    tag = "uploads",
    params(("id" = Uuid, Path, description = "Upload session id")),
    request_body(content = Vec<u8>, content_type = "application/octet-stream", description = "Next part of the file"),
    responses(
        (status = 200, description = "Chunk stored", body = UploadProgress),
        (status = 400, description = "Session expired, finished, or chunk too large"),
        (status = 404, description = "Unknown session")
    ),
    security(("bearer_auth" = []))
)]
#[put("/uploads/resumable/{id}/chunk")]
pub async fn upload_chunk(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let session = uploads::upload_chunk(&state, path.into_inner(), *user_id, &body).await?;
    Ok(super::ok(UploadProgress::of(&session)))
}

#[utoipa::path(
    get,
    path = "/api/uploads/resumable/{id}/status",
    tag = "uploads",
    params(("id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 200, description = "Progress", body = UploadProgress),
        (status = 400, description = "Session expired"),
        (status = 404, description = "Unknown session")
    ),
    security(("bearer_auth" = []))
)]
#[get("/uploads/resumable/{id}/status")]
pub async fn upload_status(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let progress = uploads::status(&state, path.into_inner(), *user_id).await?;
    Ok(super::ok(progress))
}

#[utoipa::path(
    post,
    path = "/api/uploads/resumable/{id}/finalize",
    tag = "uploads",
    params(("id" = Uuid, Path, description = "Upload session id")),
    responses(
        (status = 200, description = "Upload completed", body = crate::uploads::FinalizedUpload),
        (status = 400, description = "Incomplete, expired or failed session"),
        (status = 404, description = "Unknown session")
    ),
    security(("bearer_auth" = []))
)]
#[post("/uploads/resumable/{id}/finalize")]
pub async fn finalize_upload(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let finalized = uploads::finalize(&state, path.into_inner(), *user_id).await?;
    Ok(super::ok(finalized))
}
