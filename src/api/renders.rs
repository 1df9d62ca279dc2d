// src/api/renders.rs

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::require_verified_email;
use super::projects::owned_project;
use crate::billing::{credit_cost, refund_render};
use crate::db::billing::CreditReference;
use crate::db::renders::NewRender;
use crate::error::{ApiError, ApiResult};
use crate::models::{Render, RenderSettings, RenderStatus, RenderType};
use crate::security::validate_prompt;
use crate::{db, delivery, limits, AppState};

pub const CALLBACK_SECRET_HEADER: &str = "X-Callback-Secret";
const MAX_OUTPUTS: u32 = 4;
const MAX_VIDEO_SECONDS: u32 = 8;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRenderRequest {
    #[serde(alias = "project_id")]
    pub project_id: Uuid,
    #[serde(rename = "type", default = "default_render_type")]
    pub render_type: RenderType,
    pub prompt: String,
    #[serde(default)]
    pub settings: RenderSettings,
    #[serde(default, alias = "chain_id")]
    pub chain_id: Option<Uuid>,
    #[serde(default, alias = "reference_render_id")]
    pub reference_render_id: Option<Uuid>,
    #[serde(default, alias = "parent_render_id")]
    pub parent_render_id: Option<Uuid>,
    /// Number of outputs to generate (1-4).
    #[serde(default)]
    pub outputs: Option<u32>,
}

fn default_render_type() -> RenderType {
    RenderType::Image
}

fn denied(check: limits::LimitCheck) -> ApiError {
    ApiError::Forbidden(check.error.unwrap_or_else(|| "Plan limit reached".into()))
}

/// Validates, charges and queues a render as `pending`. The debit and the
/// render row are written in one transaction.
pub async fn create_render_for(state: &AppState, user_id: Uuid, req: &CreateRenderRequest) -> ApiResult<Render> {
    let pool = &state.pool;
    require_verified_email(pool, user_id).await?;

    let prompt = validate_prompt(&req.prompt).map_err(|e| ApiError::Validation(e.into()))?;
    let outputs = req.outputs.unwrap_or(1);
    if !(1..=MAX_OUTPUTS).contains(&outputs) {
        return Err(ApiError::Validation(format!("outputs must be between 1 and {MAX_OUTPUTS}")));
    }
    if let Some(seconds) = req.settings.duration {
        if seconds == 0 || seconds > MAX_VIDEO_SECONDS {
            return Err(ApiError::Validation("Invalid duration value".into()));
        }
    }

    let project = owned_project(pool, req.project_id, user_id).await?;

    let plan = limits::plan_limits(pool, user_id).await?;
    let quality = plan.check_quality(req.settings.quality);
    if !quality.allowed {
        return Err(denied(quality));
    }
    if req.render_type == RenderType::Video {
        let video = plan.check_video();
        if !video.allowed {
            return Err(denied(video));
        }
    }

    // Only completed renders of the same user can be used as a reference.
    let reference_render_id = match req.reference_render_id {
        Some(id) => db::renders::get_render(pool, id)
            .await?
            .filter(|r| r.user_id == user_id && r.status == RenderStatus::Completed)
            .map(|r| r.id),
        None => None,
    };
    let parent_render_id = match req.parent_render_id {
        Some(id) => db::renders::get_render(pool, id)
            .await?
            .filter(|r| r.user_id == user_id)
            .map(|r| r.id),
        None => None,
    };

    let cost = credit_cost(req.render_type, &req.settings, outputs);
    let settings =
        serde_json::to_value(&req.settings).map_err(|e| ApiError::Internal(format!("encode settings: {e}")))?;

    let mut tx = pool.begin().await?;
    // Renders of one project are serialized from here on: the per-project
    // count, the chain lookup and the chain position are read under this lock.
    if !db::projects::lock_project(&mut tx, project.id).await? {
        return Err(ApiError::NotFound("Project".into()));
    }
    let per_project = limits::check_render_limit_locked(&mut tx, &plan, project.id).await?;
    if !per_project.allowed {
        return Err(denied(per_project));
    }

    let chain = match req.chain_id {
        Some(chain_id) => {
            let chain = db::renders::lock_chain(&mut tx, chain_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("Render chain".into()))?;
            if chain.project_id != project.id {
                return Err(ApiError::BadRequest("Chain belongs to a different project".into()));
            }
            chain
        }
        None => match db::renders::lock_latest_chain(&mut tx, project.id).await? {
            Some(chain) => chain,
            None => {
                db::renders::create_chain(
                    &mut tx,
                    project.id,
                    &format!("{} - Iterations", project.name),
                    Some("Automatic chain for render iterations"),
                )
                .await?
            }
        },
    };

    let render = db::renders::insert_render(
        &mut tx,
        NewRender {
            project_id: Some(project.id),
            user_id,
            render_type: req.render_type,
            prompt: &prompt,
            settings,
            credits_cost: cost,
            chain_id: Some(chain.id),
            reference_render_id,
            parent_render_id,
        },
    )
    .await?;

    let render_ref = render.id.to_string();
    let debited = db::billing::debit_credits(
        &mut tx,
        user_id,
        cost,
        &format!("Generated {} - {}", req.render_type, req.settings.style.as_deref().unwrap_or("default")),
        Some(CreditReference {
            id: &render_ref,
            kind: "render",
        }),
    )
    .await?;
    if debited.is_none() {
        return Err(ApiError::InsufficientCredits(format!(
            "Insufficient credits: {cost} required"
        )));
    }
    tx.commit().await?;
    state.credits_dedup.invalidate(&user_id.to_string());

    log::info!("render {} queued for user {user_id} ({cost} credits)", render.id);
    Ok(render)
}

/// Loads a render and checks that `user_id` owns it.
pub async fn owned_render(state: &AppState, render_id: Uuid, user_id: Uuid) -> ApiResult<Render> {
    let render = db::renders::get_render(&state.pool, render_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Render".into()))?;
    if render.user_id != user_id {
        return Err(ApiError::Forbidden("You do not have access to this render".into()));
    }
    Ok(render)
}

#[utoipa::path(
    post,
    path = "/api/renders",
    tag = "renders",
    request_body = CreateRenderRequest,
    responses(
        (status = 201, description = "Render queued", body = Render),
        (status = 400, description = "Invalid prompt or settings"),
        (status = 402, description = "Insufficient credits"),
        (status = 403, description = "Email not verified, plan limit reached or project not owned")
    ),
    security(("bearer_auth" = []))
)]
#[post("/renders")]
pub async fn create_render(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CreateRenderRequest>,
) -> ApiResult<HttpResponse> {
    let render = create_render_for(&state, *user_id, &payload).await?;
    Ok(super::created(render))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RendersQuery {
    pub project_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/renders",
    tag = "renders",
    params(RendersQuery),
    responses((status = 200, description = "Renders, newest first")),
    security(("bearer_auth" = []))
)]
#[get("/renders")]
pub async fn list_renders(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    query: web::Query<RendersQuery>,
) -> ApiResult<HttpResponse> {
    let page = super::Pagination {
        limit: query.limit,
        offset: query.offset,
    };
    let renders =
        db::renders::list_renders(&state.pool, *user_id, query.project_id, page.limit(), page.offset()).await?;
    Ok(super::ok(renders))
}

#[utoipa::path(
    get,
    path = "/api/renders/{id}",
    tag = "renders",
    params(("id" = Uuid, Path, description = "Render id")),
    responses(
        (status = 200, description = "Render", body = Render),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/renders/{id}")]
pub async fn get_render(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let render = owned_render(&state, path.into_inner(), *user_id).await?;
    Ok(super::ok(render))
}

#[utoipa::path(
    get,
    path = "/api/renders/chains/{chain_id}",
    tag = "renders",
    params(("chain_id" = Uuid, Path, description = "Chain id")),
    responses(
        (status = 200, description = "Chain with its renders ordered by position"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/renders/chains/{chain_id}")]
pub async fn get_chain(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let chain = db::renders::get_chain(&state.pool, path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Render chain".into()))?;
    owned_project(&state.pool, chain.project_id, *user_id).await?;

    let renders = db::renders::list_chain_renders(&state.pool, chain.id).await?;
    Ok(super::ok(json!({ "chain": chain, "renders": renders })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderCallback {
    #[serde(alias = "render_id")]
    pub render_id: Uuid,
    pub status: RenderStatus,
    #[serde(default, alias = "output_url")]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn callback_authorized(req: &HttpRequest, secret: &str) -> bool {
    !secret.is_empty()
        && req
            .headers()
            .get(CALLBACK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == secret)
}

/// Provider completion report. Terminal renders are left untouched; failed
/// renders are refunded and plugin webhooks are notified of every change.
#[utoipa::path(
    post,
    path = "/api/renders/callback",
    tag = "renders",
    request_body = RenderCallback,
    responses(
        (status = 200, description = "Status applied or render already final"),
        (status = 401, description = "Missing or wrong X-Callback-Secret"),
        (status = 404, description = "Unknown render")
    )
)]
#[post("/api/renders/callback")]
pub async fn render_callback(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<RenderCallback>,
) -> ApiResult<HttpResponse> {
    if !callback_authorized(&req, &state.config.render_callback_secret) {
        log::warn!("render callback rejected: bad secret");
        return Err(ApiError::Unauthorized);
    }
    if payload.status == RenderStatus::Pending {
        return Err(ApiError::Validation("status must be processing, completed or failed".into()));
    }
    if payload.status == RenderStatus::Completed && payload.output_url.is_none() {
        return Err(ApiError::Validation("outputUrl is required for completed renders".into()));
    }

    let updated = db::renders::apply_status_update(
        &state.pool,
        payload.render_id,
        payload.status,
        payload.output_url.as_deref(),
        payload.error.as_deref(),
    )
    .await?;

    let Some(render) = updated else {
        return match db::renders::get_render(&state.pool, payload.render_id).await? {
            Some(existing) => {
                log::info!("render {} already {}, callback ignored", existing.id, existing.status);
                Ok(super::ok(json!({ "renderId": existing.id, "status": existing.status })))
            }
            None => Err(ApiError::NotFound("Render".into())),
        };
    };

    log::info!("render {} is now {}", render.id, render.status);
    if render.status == RenderStatus::Failed {
        refund_render(&state.pool, &render).await?;
        state.credits_dedup.invalidate(&render.user_id.to_string());
    }
    delivery::notify_render(&state.pool, &state.http, &render).await;

    Ok(super::ok(json!({ "renderId": render.id, "status": render.status })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn callback_requires_matching_secret() {
        let req = TestRequest::default()
            .insert_header((CALLBACK_SECRET_HEADER, "s3cret"))
            .to_http_request();
        assert!(callback_authorized(&req, "s3cret"));
        assert!(!callback_authorized(&req, "other"));

        let empty = TestRequest::default().insert_header((CALLBACK_SECRET_HEADER, "")).to_http_request();
        assert!(!callback_authorized(&empty, ""));
    }

    #[test]
    fn create_request_defaults_to_one_image() {
        let req: CreateRenderRequest = serde_json::from_value(json!({
            "projectId": Uuid::nil(),
            "prompt": "modern villa at dusk"
        }))
        .unwrap();
        assert_eq!(req.render_type, RenderType::Image);
        assert_eq!(req.outputs, None);
        assert!(req.chain_id.is_none());
    }
}
