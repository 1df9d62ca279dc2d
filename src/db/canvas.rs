// src/db/canvas.rs

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::canvas::graph::{CanvasEdge, CanvasGraph, CanvasNode, Viewport};
use crate::models::CanvasFile;

const FILE_COLUMNS: &str = "id, project_id, user_id, name, slug, description, version, is_archived, created_at, updated_at";

fn file_from_row(r: &PgRow) -> CanvasFile {
    CanvasFile {
        id: r.get("id"),
        project_id: r.get("project_id"),
        user_id: r.get("user_id"),
        name: r.get("name"),
        slug: r.get("slug"),
        description: r.get("description"),
        version: r.get("version"),
        is_archived: r.get("is_archived"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

pub async fn create_file(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    name: &str,
    slug: &str,
    description: Option<&str>,
) -> Result<CanvasFile, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO canvas_files (id, project_id, user_id, name, slug, description)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING {FILE_COLUMNS}"#
    ))
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(user_id)
    .bind(name)
    .bind(slug)
    .bind(description)
    .fetch_one(pool)
    .await?;

    Ok(file_from_row(&row))
}

pub async fn get_file(pool: &PgPool, file_id: Uuid) -> Result<Option<CanvasFile>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {FILE_COLUMNS} FROM canvas_files WHERE id = $1"))
        .bind(file_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(file_from_row))
}

pub async fn list_files(
    pool: &PgPool,
    user_id: Uuid,
    project_id: Option<Uuid>,
    include_archived: bool,
) -> Result<Vec<CanvasFile>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {FILE_COLUMNS} FROM canvas_files
           WHERE user_id = $1
             AND ($2::uuid IS NULL OR project_id = $2)
             AND ($3 OR is_archived = false)
           ORDER BY updated_at DESC"#
    ))
    .bind(user_id)
    .bind(project_id)
    .bind(include_archived)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(file_from_row).collect())
}

/// Soft delete.
pub async fn archive_file(pool: &PgPool, file_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE canvas_files SET is_archived = true, updated_at = NOW()
           WHERE id = $1 AND user_id = $2 AND is_archived = false"#,
    )
    .bind(file_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// The saved graph and its version, if the file was ever saved.
pub async fn get_graph(pool: &PgPool, file_id: Uuid) -> Result<Option<(CanvasGraph, i32)>, sqlx::Error> {
    let row = sqlx::query("SELECT nodes, edges, viewport, version FROM canvas_graphs WHERE file_id = $1")
        .bind(file_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| {
        let nodes: Json<Vec<CanvasNode>> = r.get("nodes");
        let edges: Json<Vec<CanvasEdge>> = r.get("edges");
        let viewport: Option<Json<Viewport>> = r.get("viewport");
        let graph = CanvasGraph {
            nodes: nodes.0,
            edges: edges.0,
            viewport: viewport.map(|v| v.0),
        };
        (graph, r.get("version"))
    }))
}

/// Creates the graph on first save, otherwise replaces it. Both the graph and
/// its file move to the next version, which is returned.
pub async fn save_graph(
    pool: &PgPool,
    file_id: Uuid,
    user_id: Uuid,
    graph: &CanvasGraph,
) -> Result<i32, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"INSERT INTO canvas_graphs (id, file_id, user_id, nodes, edges, viewport)
           VALUES ($1, $2, $3, $4, $5, $6)
           ON CONFLICT (file_id) DO UPDATE SET
               nodes = EXCLUDED.nodes,
               edges = EXCLUDED.edges,
               viewport = EXCLUDED.viewport,
               version = canvas_graphs.version + 1,
               updated_at = NOW()
           RETURNING version"#,
    )
    .bind(Uuid::new_v4())
    .bind(file_id)
    .bind(user_id)
    .bind(Json(&graph.nodes))
    .bind(Json(&graph.edges))
    .bind(graph.viewport.as_ref().map(Json))
    .fetch_one(&mut *tx)
    .await?;
    let version: i32 = row.get("version");

    sqlx::query("UPDATE canvas_files SET version = $1, updated_at = NOW() WHERE id = $2")
        .bind(version)
        .bind(file_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(version)
}
