// src/api/api_keys.rs

use actix_web::{delete, get, post, web, HttpResponse};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::plugin_auth::{API_KEY_PREFIX, KNOWN_SCOPES};
use crate::error::{ApiError, ApiResult};
use crate::security::sanitize_input;
use crate::signature::{random_hex, sha256_hex};
use crate::{db, AppState};

/// Characters of the plain key kept for display (`rk_live_ab12cd34`).
const DISPLAY_PREFIX_LEN: usize = 16;
const MAX_EXPIRY_DAYS: i64 = 365;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, alias = "expires_in_days")]
    pub expires_in_days: Option<i64>,
}

/// `rk_live_` followed by 32 hex characters.
pub fn generate_key() -> String {
    format!("{API_KEY_PREFIX}{}", random_hex(16))
}

fn validate_scopes(scopes: &[String]) -> ApiResult<Vec<String>> {
    if scopes.is_empty() {
        return Err(ApiError::Validation("At least one scope is required".into()));
    }
    if let Some(unknown) = scopes.iter().find(|s| !KNOWN_SCOPES.contains(&s.as_str())) {
        return Err(ApiError::Validation(format!("Unknown scope: {unknown}")));
    }
    let mut scopes = scopes.to_vec();
    scopes.sort();
    scopes.dedup();
    Ok(scopes)
}

#[utoipa::path(
    get,
    path = "/api/api-keys",
    tag = "api-keys",
    responses((status = 200, description = "Keys without their secret part")),
    security(("bearer_auth" = []))
)]
#[get("/api-keys")]
pub async fn list_keys(state: web::Data<AppState>, user_id: web::ReqData<Uuid>) -> ApiResult<HttpResponse> {
    let keys = db::api_keys::list_keys(&state.pool, *user_id).await?;
    Ok(super::ok(keys))
}

#[utoipa::path(
    post,
    path = "/api/api-keys",
    tag = "api-keys",
    request_body = CreateKeyRequest,
    responses(
        (status = 201, description = "Key created; the plain key is returned only once"),
        (status = 400, description = "Invalid name, scopes or expiry")
    ),
    security(("bearer_auth" = []))
)]
#[post("/api-keys")]
pub async fn create_key(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CreateKeyRequest>,
) -> ApiResult<HttpResponse> {
    let name = sanitize_input(&payload.name);
    if name.is_empty() {
        return Err(ApiError::Validation("Key name is required".into()));
    }
    let scopes = validate_scopes(&payload.scopes)?;
    let expires_at = match payload.expires_in_days {
        Some(days) if !(1..=MAX_EXPIRY_DAYS).contains(&days) => {
            return Err(ApiError::Validation(format!(
                "expiresInDays must be between 1 and {MAX_EXPIRY_DAYS}"
            )))
        }
        Some(days) => Some(Utc::now() + Duration::days(days)),
        None => None,
    };

    let plain = generate_key();
    let key = db::api_keys::create_key(
        &state.pool,
        *user_id,
        &name,
        &sha256_hex(&plain),
        &plain[..DISPLAY_PREFIX_LEN],
        &scopes,
        expires_at,
    )
    .await?;

    log::info!("api key {} created for user {}", key.id, key.user_id);
    Ok(super::created(json!({ "key": plain, "apiKey": key })))
}

#[utoipa::path(
    delete,
    path = "/api/api-keys/{id}",
    tag = "api-keys",
    params(("id" = Uuid, Path, description = "Key id")),
    responses(
        (status = 200, description = "Key revoked"),
        (status = 404, description = "No active key with this id")
    ),
    security(("bearer_auth" = []))
)]
#[delete("/api-keys/{id}")]
pub async fn revoke_key(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let key_id = path.into_inner();
    if !db::api_keys::revoke_key(&state.pool, key_id, *user_id).await? {
        return Err(ApiError::NotFound("API key".into()));
    }
    log::info!("api key {key_id} revoked");
    Ok(super::message("API key revoked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_prefix_and_32_hex_chars() {
        let key = generate_key();
        let suffix = key.strip_prefix(API_KEY_PREFIX).unwrap();
        assert_eq!(suffix.len(), 32);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_key(), key);
    }

    #[test]
    fn scopes_are_checked_and_deduplicated() {
        let scopes = vec!["renders:read".to_string(), "projects:read".to_string(), "renders:read".to_string()];
        assert_eq!(validate_scopes(&scopes).unwrap(), vec!["projects:read", "renders:read"]);
        assert!(validate_scopes(&["admin".to_string()]).is_err());
        assert!(validate_scopes(&[]).is_err());
    }
}
