// src/api/plugins.rs
//
// Plugin API for design-tool integrations. Registered outside the session
// middleware: every handler authenticates through `PluginAuth`, which accepts
// a session JWT or an `rk_live_` API key and applies the plugin rate limit.

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::billing::load_credits;
use super::plugin_auth::PluginAuth;
use super::projects::{create_project_for, owned_project, CreateProjectRequest};
use super::renders::{create_render_for, owned_render, CreateRenderRequest};
use crate::error::{ApiError, ApiResult};
use crate::models::Platform;
use crate::signature::random_hex;
use crate::{db, AppState};

pub const WEBHOOK_EVENTS: &[&str] = &["render.completed", "render.failed", "render.processing"];
const MAX_WEBHOOKS_PER_USER: usize = 10;
const PROJECT_RENDERS_SHOWN: i64 = 50;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PluginProjectsQuery {
    pub platform: Option<Platform>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/plugins/projects",
    tag = "plugins",
    params(PluginProjectsQuery),
    responses(
        (status = 200, description = "Projects of the caller"),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 403, description = "Missing scope projects:read"),
        (status = 429, description = "Rate limit exceeded")
    ),
    security(("bearer_auth" = []))
)]
#[get("/api/plugins/projects")]
pub async fn list_projects(
    auth: PluginAuth,
    state: web::Data<AppState>,
    query: web::Query<PluginProjectsQuery>,
) -> ApiResult<HttpResponse> {
    auth.require("projects:read")?;
    let page = super::Pagination {
        limit: query.limit,
        offset: query.offset,
    };
    let projects =
        db::projects::list_projects(&state.pool, auth.user_id, query.platform, page.limit(), page.offset()).await?;
    Ok(super::ok(json!({
        "projects": projects,
        "limit": page.limit(),
        "offset": page.offset(),
    })))
}

#[utoipa::path(
    post,
    path = "/api/plugins/projects",
    tag = "plugins",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created"),
        (status = 403, description = "Missing scope projects:write or project limit reached")
    ),
    security(("bearer_auth" = []))
)]
#[post("/api/plugins/projects")]
pub async fn create_project(
    auth: PluginAuth,
    state: web::Data<AppState>,
    payload: web::Json<CreateProjectRequest>,
) -> ApiResult<HttpResponse> {
    auth.require("projects:write")?;
    let project = create_project_for(&state.pool, auth.user_id, &payload).await?;
    Ok(super::created(project))
}

#[utoipa::path(
    get,
    path = "/api/plugins/projects/{id}",
    tag = "plugins",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project with its latest renders"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/api/plugins/projects/{id}")]
pub async fn get_project(
    auth: PluginAuth,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    auth.require("projects:read")?;
    let project = owned_project(&state.pool, path.into_inner(), auth.user_id).await?;
    let renders =
        db::renders::list_renders(&state.pool, auth.user_id, Some(project.id), PROJECT_RENDERS_SHOWN, 0).await?;
    Ok(super::ok(json!({ "project": project, "renders": renders })))
}

#[utoipa::path(
    post,
    path = "/api/plugins/renders",
    tag = "plugins",
    request_body = CreateRenderRequest,
    responses(
        (status = 201, description = "Render queued"),
        (status = 402, description = "Insufficient credits"),
        (status = 403, description = "Missing scope renders:write or plan limit reached")
    ),
    security(("bearer_auth" = []))
)]
#[post("/api/plugins/renders")]
pub async fn create_render(
    auth: PluginAuth,
    state: web::Data<AppState>,
    payload: web::Json<CreateRenderRequest>,
) -> ApiResult<HttpResponse> {
    auth.require("renders:write")?;
    let render = create_render_for(&state, auth.user_id, &payload).await?;
    Ok(super::created(render))
}

#[utoipa::path(
    get,
    path = "/api/plugins/renders/{id}",
    tag = "plugins",
    params(("id" = Uuid, Path, description = "Render id")),
    responses(
        (status = 200, description = "Render status and output"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/api/plugins/renders/{id}")]
pub async fn get_render(
    auth: PluginAuth,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    auth.require("renders:read")?;
    let render = owned_render(&state, path.into_inner(), auth.user_id).await?;
    Ok(super::ok(render))
}

#[utoipa::path(
    get,
    path = "/api/plugins/credits",
    tag = "plugins",
    responses((status = 200, description = "Credit balance")),
    security(("bearer_auth" = []))
)]
#[get("/api/plugins/credits")]
pub async fn get_credits(auth: PluginAuth, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require("credits:read")?;
    let account = load_credits(&state, auth.user_id).await?;
    Ok(super::ok(account))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWebhookRequest {
    pub url: String,
    #[serde(default)]
    pub events: Vec<String>,
}

fn validate_webhook(req: &CreateWebhookRequest) -> ApiResult<Vec<String>> {
    let url = reqwest::Url::parse(&req.url).map_err(|_| ApiError::Validation("Invalid webhook URL".into()))?;
    let local = matches!(url.host_str(), Some("localhost" | "127.0.0.1"));
    if url.scheme() != "https" && !(url.scheme() == "http" && local) {
        return Err(ApiError::Validation("Webhook URL must use https".into()));
    }

    if req.events.is_empty() {
        return Ok(WEBHOOK_EVENTS.iter().map(|e| e.to_string()).collect());
    }
    if let Some(unknown) = req.events.iter().find(|e| !WEBHOOK_EVENTS.contains(&e.as_str())) {
        return Err(ApiError::Validation(format!("Unknown event: {unknown}")));
    }
    let mut events = req.events.clone();
    events.sort();
    events.dedup();
    Ok(events)
}

#[utoipa::path(
    get,
    path = "/api/plugins/webhooks",
    tag = "plugins",
    responses((status = 200, description = "Registered webhooks (secrets omitted)")),
    security(("bearer_auth" = []))
)]
#[get("/api/plugins/webhooks")]
pub async fn list_webhooks(auth: PluginAuth, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    auth.require("webhook:read")?;
    let hooks = db::webhooks::list_webhooks(&state.pool, auth.user_id).await?;
    Ok(super::ok(hooks))
}

#[utoipa::path(
    post,
    path = "/api/plugins/webhooks",
    tag = "plugins",
    request_body = CreateWebhookRequest,
    responses(
        (status = 201, description = "Webhook registered; the signing secret is returned only once"),
        (status = 400, description = "Invalid URL or events")
    ),
    security(("bearer_auth" = []))
)]
#[post("/api/plugins/webhooks")]
pub async fn create_webhook(
    auth: PluginAuth,
    state: web::Data<AppState>,
    payload: web::Json<CreateWebhookRequest>,
) -> ApiResult<HttpResponse> {
    auth.require("webhook:write")?;
    let events = validate_webhook(&payload)?;

    let existing = db::webhooks::list_webhooks(&state.pool, auth.user_id).await?;
    if existing.len() >= MAX_WEBHOOKS_PER_USER {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_WEBHOOKS_PER_USER} webhooks can be registered"
        )));
    }

    let secret = format!("whsec_{}", random_hex(24));
    let hook = db::webhooks::create_webhook(&state.pool, auth.user_id, &payload.url, &secret, &events).await?;

    log::info!("webhook {} registered for user {}", hook.id, auth.user_id);
    Ok(super::created(json!({ "webhook": hook, "secret": secret })))
}

#[utoipa::path(
    delete,
    path = "/api/plugins/webhooks/{id}",
    tag = "plugins",
    params(("id" = Uuid, Path, description = "Webhook id")),
    responses(
        (status = 200, description = "Webhook deleted"),
        (status = 404, description = "No webhook with this id belongs to the caller")
    ),
    security(("bearer_auth" = []))
)]
#[delete("/api/plugins/webhooks/{id}")]
pub async fn delete_webhook(
    auth: PluginAuth,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    auth.require("webhook:write")?;
    if !db::webhooks::delete_webhook(&state.pool, path.into_inner(), auth.user_id).await? {
        return Err(ApiError::NotFound("Webhook".into()));
    }
    Ok(super::message("Webhook deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, events: &[&str]) -> CreateWebhookRequest {
        CreateWebhookRequest {
            url: url.to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn webhooks_need_https_except_on_localhost() {
        assert!(validate_webhook(&request("https://example.com/hook", &[])).is_ok());
        assert!(validate_webhook(&request("http://localhost:4000/hook", &[])).is_ok());
        assert!(validate_webhook(&request("http://example.com/hook", &[])).is_err());
        assert!(validate_webhook(&request("not a url", &[])).is_err());
    }

    #[test]
    fn empty_event_list_subscribes_to_everything() {
        let events = validate_webhook(&request("https://example.com", &[])).unwrap();
        assert_eq!(events.len(), WEBHOOK_EVENTS.len());

        let events = validate_webhook(&request("https://example.com", &["render.failed", "render.failed"])).unwrap();
        assert_eq!(events, vec!["render.failed"]);
        assert!(validate_webhook(&request("https://example.com", &["user.deleted"])).is_err());
    }
}
