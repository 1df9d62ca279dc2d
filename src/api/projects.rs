// src/api/projects.rs

use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::Pagination;
use crate::error::{ApiError, ApiResult};
use crate::limits;
use crate::models::{Platform, Project};
use crate::security::{sanitize_input, slugify};
use crate::signature::random_hex;
use crate::{db, AppState};

const MAX_NAME_LEN: usize = 100;
const SLUG_ATTEMPTS: u32 = 5;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProjectsQuery {
    pub platform: Option<Platform>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `name`, `name-2`, ... and finally a random suffix.
async fn unique_slug(pool: &PgPool, name: &str) -> Result<String, sqlx::Error> {
    let base = slugify(name);
    if !db::projects::slug_exists(pool, &base).await? {
        return Ok(base);
    }
    for n in 2..=SLUG_ATTEMPTS {
        let candidate = format!("{base}-{n}");
        if !db::projects::slug_exists(pool, &candidate).await? {
            return Ok(candidate);
        }
    }
    Ok(format!("{base}-{}", random_hex(3)))
}

/// Loads a project and checks that `user_id` owns it.
pub async fn owned_project(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> ApiResult<Project> {
    let project = db::projects::get_project(pool, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project".into()))?;
    if project.user_id != user_id {
        return Err(ApiError::Forbidden("You do not have access to this project".into()));
    }
    Ok(project)
}

/// Creates a project after the plan's project limit check.
pub async fn create_project_for(pool: &PgPool, user_id: Uuid, req: &CreateProjectRequest) -> ApiResult<Project> {
    let name = sanitize_input(&req.name);
    if name.is_empty() {
        return Err(ApiError::Validation("Project name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "Project name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    let plan = limits::plan_limits(pool, user_id).await?;
    let description = req.description.as_deref().map(sanitize_input).filter(|d| !d.is_empty());
    let slug = unique_slug(pool, &name).await?;

    let mut tx = pool.begin().await?;
    if !db::users::lock_user(&mut tx, user_id).await? {
        return Err(ApiError::Unauthorized);
    }
    let check = limits::check_project_limit_locked(&mut tx, &plan, user_id).await?;
    if !check.allowed {
        return Err(ApiError::Forbidden(
            check.error.unwrap_or_else(|| "Project limit reached".into()),
        ));
    }

    let project = db::projects::create_project(
        &mut *tx,
        user_id,
        &name,
        &slug,
        description.as_deref(),
        req.platform.unwrap_or(Platform::Render),
    )
    .await?;
    tx.commit().await?;

    log::info!("project {} created for user {user_id}", project.id);
    Ok(project)
}

#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "projects",
    params(ProjectsQuery),
    responses((status = 200, description = "Projects, most recently updated first")),
    security(("bearer_auth" = []))
)]
#[get("/projects")]
pub async fn list_projects(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    query: web::Query<ProjectsQuery>,
) -> ApiResult<HttpResponse> {
    let page = Pagination {
        limit: query.limit,
        offset: query.offset,
    };
    let projects =
        db::projects::list_projects(&state.pool, *user_id, query.platform, page.limit(), page.offset()).await?;
    Ok(super::ok(projects))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Invalid name"),
        (status = 403, description = "Project limit reached")
    ),
    security(("bearer_auth" = []))
)]
#[post("/projects")]
pub async fn create_project(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CreateProjectRequest>,
) -> ApiResult<HttpResponse> {
    let project = create_project_for(&state.pool, *user_id, &payload).await?;
    Ok(super::created(project))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/projects/{id}")]
pub async fn get_project(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let project = owned_project(&state.pool, path.into_inner(), *user_id).await?;
    Ok(super::ok(project))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    tag = "projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project deleted with its renders"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[delete("/projects/{id}")]
pub async fn delete_project(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let project = owned_project(&state.pool, path.into_inner(), *user_id).await?;
    if !db::projects::delete_project(&state.pool, project.id, *user_id).await? {
        return Err(ApiError::NotFound("Project".into()));
    }
    log::info!("project {} deleted", project.id);
    Ok(super::message("Project deleted"))
}
