// src/api/canvas.rs

use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::projects::owned_project;
use crate::canvas::graph::CanvasGraph;
use crate::error::{ApiError, ApiResult};
use crate::models::CanvasFile;
use crate::security::{sanitize_input, slugify};
use crate::signature::random_hex;
use crate::{db, AppState};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct FilesQuery {
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    #[serde(alias = "project_id")]
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

async fn owned_file(state: &AppState, file_id: Uuid, user_id: Uuid) -> ApiResult<CanvasFile> {
    let file = db::canvas::get_file(&state.pool, file_id)
        .await?
        .filter(|f| !f.is_archived)
        .ok_or_else(|| ApiError::NotFound("Canvas file".into()))?;
    if file.user_id != user_id {
        return Err(ApiError::Forbidden("You do not have access to this canvas file".into()));
    }
    Ok(file)
}

#[utoipa::path(
    get,
    path = "/api/canvas/files",
    tag = "canvas",
    params(FilesQuery),
    responses((status = 200, description = "Canvas files, most recently updated first")),
    security(("bearer_auth" = []))
)]
#[get("/canvas/files")]
pub async fn list_files(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    query: web::Query<FilesQuery>,
) -> ApiResult<HttpResponse> {
    let files = db::canvas::list_files(&state.pool, *user_id, query.project_id, query.include_archived).await?;
    Ok(super::ok(files))
}

#[utoipa::path(
    post,
    path = "/api/canvas/files",
    tag = "canvas",
    request_body = CreateFileRequest,
    responses(
        (status = 201, description = "Canvas file created", body = CanvasFile),
        (status = 403, description = "Project belongs to another user")
    ),
    security(("bearer_auth" = []))
)]
#[post("/canvas/files")]
pub async fn create_file(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CreateFileRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = *user_id;
    let project = owned_project(&state.pool, payload.project_id, user_id).await?;

    let name = sanitize_input(&payload.name);
    if name.is_empty() {
        return Err(ApiError::Validation("File name is required".into()));
    }
    let description = payload.description.as_deref().map(sanitize_input);
    let slug = slugify(&name);

    let file = match db::canvas::create_file(&state.pool, project.id, user_id, &name, &slug, description.as_deref()).await
    {
        Ok(file) => file,
        Err(e) if db::is_unique_violation(&e) => {
            let slug = format!("{slug}-{}", random_hex(3));
            db::canvas::create_file(&state.pool, project.id, user_id, &name, &slug, description.as_deref()).await?
        }
        Err(e) => return Err(e.into()),
    };

    log::info!("canvas file {} created in project {}", file.id, project.id);
    Ok(super::created(file))
}

#[utoipa::path(
    get,
    path = "/api/canvas/files/{id}",
    tag = "canvas",
    params(("id" = Uuid, Path, description = "Canvas file id")),
    responses(
        (status = 200, description = "File with its graph"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[get("/canvas/files/{id}")]
pub async fn get_file(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let file = owned_file(&state, path.into_inner(), *user_id).await?;
    let (graph, version) = db::canvas::get_graph(&state.pool, file.id)
        .await?
        .unwrap_or_else(|| (CanvasGraph::default(), 0));

    Ok(super::ok(json!({ "file": file, "graph": graph, "graphVersion": version })))
}

#[utoipa::path(
    delete,
    path = "/api/canvas/files/{id}",
    tag = "canvas",
    params(("id" = Uuid, Path, description = "Canvas file id")),
    responses(
        (status = 200, description = "File archived"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[delete("/canvas/files/{id}")]
pub async fn delete_file(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let file = owned_file(&state, path.into_inner(), *user_id).await?;
    if !db::canvas::archive_file(&state.pool, file.id, *user_id).await? {
        return Err(ApiError::NotFound("Canvas file".into()));
    }
    Ok(super::message("Canvas file archived"))
}

#[utoipa::path(
    put,
    path = "/api/canvas/files/{id}/graph",
    tag = "canvas",
    params(("id" = Uuid, Path, description = "Canvas file id")),
    request_body = CanvasGraph,
    responses(
        (status = 200, description = "Graph saved; returns the new version"),
        (status = 400, description = "Graph failed validation"),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
#[put("/canvas/files/{id}/graph")]
pub async fn save_graph(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    path: web::Path<Uuid>,
    payload: web::Json<CanvasGraph>,
) -> ApiResult<HttpResponse> {
    let file = owned_file(&state, path.into_inner(), *user_id).await?;
    let graph = payload.into_inner();
    graph
        .validate()
        .map_err(|e| ApiError::Validation(format!("Invalid graph: {e}")))?;

    let version = db::canvas::save_graph(&state.pool, file.id, *user_id, &graph).await?;
    log::debug!(
        "canvas file {} saved at version {version} ({} nodes, {} edges)",
        file.id,
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(super::ok(json!({ "fileId": file.id, "version": version })))
}
