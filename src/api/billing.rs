// src/api/billing.rs

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::Pagination;
use crate::billing::refresh_monthly_credits;
use crate::error::{ApiError, ApiResult};
use crate::limits;
use crate::models::{CreditAccount, Quality};
use crate::{db, AppState};

/// Balance and totals, refreshed with the monthly subscription grant when due.
/// Concurrent requests for the same user share one lookup.
pub async fn load_credits(state: &AppState, user_id: Uuid) -> ApiResult<CreditAccount> {
    let pool = state.pool.clone();
    state
        .credits_dedup
        .deduplicate(&user_id.to_string(), move || async move {
            refresh_monthly_credits(&pool, user_id)
                .await
                .map_err(|e| e.to_string())?;
            db::billing::ensure_credit_account(&pool, user_id)
                .await
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| ApiError::Internal(format!("load credits: {e}")))
}

#[utoipa::path(
    get,
    path = "/api/billing/credits",
    tag = "billing",
    responses(
        (status = 200, description = "Credit balance", body = CreditAccount),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
#[get("/billing/credits")]
pub async fn get_credits(state: web::Data<AppState>, user_id: web::ReqData<Uuid>) -> ApiResult<HttpResponse> {
    let account = load_credits(&state, *user_id).await?;
    Ok(super::ok(account))
}

#[utoipa::path(
    get,
    path = "/api/billing/transactions",
    tag = "billing",
    params(Pagination),
    responses((status = 200, description = "Credit ledger, newest first")),
    security(("bearer_auth" = []))
)]
#[get("/billing/transactions")]
pub async fn list_transactions(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    page: web::Query<Pagination>,
) -> ApiResult<HttpResponse> {
    let transactions =
        db::billing::list_credit_transactions(&state.pool, *user_id, page.limit(), page.offset()).await?;
    Ok(super::ok(transactions))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LimitsQuery {
    /// projects | renders_per_project | credits | quality | video | api
    #[serde(rename = "type")]
    pub limit_type: String,
    pub project_id: Option<Uuid>,
    pub quality: Option<Quality>,
    /// Credits the caller is about to spend (for `type=credits`).
    pub required: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/billing/limits",
    tag = "billing",
    params(LimitsQuery),
    responses(
        (status = 200, description = "Limit check result", body = crate::limits::LimitCheck),
        (status = 400, description = "Unknown limit type or missing parameter")
    ),
    security(("bearer_auth" = []))
)]
#[get("/billing/limits")]
pub async fn check_limits(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    query: web::Query<LimitsQuery>,
) -> ApiResult<HttpResponse> {
    let user_id = *user_id;
    let pool = &state.pool;

    let check = match query.limit_type.as_str() {
        "projects" => limits::check_project_limit(pool, user_id).await?,
        "renders_per_project" => {
            let project_id = query
                .project_id
                .ok_or_else(|| ApiError::Validation("project_id is required".into()))?;
            limits::check_render_limit(pool, user_id, project_id).await?
        }
        "credits" => limits::check_credits_limit(pool, user_id, query.required.unwrap_or(1)).await?,
        "quality" => {
            let quality = query
                .quality
                .ok_or_else(|| ApiError::Validation("quality is required".into()))?;
            limits::plan_limits(pool, user_id).await?.check_quality(quality)
        }
        "video" => limits::plan_limits(pool, user_id).await?.check_video(),
        "api" => limits::plan_limits(pool, user_id).await?.check_api(),
        other => return Err(ApiError::Validation(format!("Unknown limit type: {other}"))),
    };

    Ok(super::ok(check))
}

#[utoipa::path(
    get,
    path = "/api/billing/plans",
    tag = "billing",
    responses((status = 200, description = "Active subscription plans"))
)]
#[get("/api/billing/plans")]
pub async fn list_plans(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let plans = db::billing::list_active_plans(&state.pool).await?;
    Ok(super::ok(plans))
}

#[utoipa::path(
    get,
    path = "/api/billing/packages",
    tag = "billing",
    responses((status = 200, description = "Active credit packages"))
)]
#[get("/api/billing/packages")]
pub async fn list_packages(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let packages = db::billing::list_active_packages(&state.pool).await?;
    Ok(super::ok(packages))
}
