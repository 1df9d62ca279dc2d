// src/db/renders.rs

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, PgPool, Row};
use uuid::Uuid;

use super::decode;
use crate::models::{Render, RenderChain, RenderStatus, RenderType};

const RENDER_COLUMNS: &str = "id, project_id, user_id, type, prompt, settings, status, output_url, error_message, \
     credits_cost, chain_id, chain_position, reference_render_id, parent_render_id, is_public, \
     created_at, updated_at";

fn render_from_row(r: &PgRow) -> Result<Render, sqlx::Error> {
    Ok(Render {
        id: r.get("id"),
        project_id: r.get("project_id"),
        user_id: r.get("user_id"),
        render_type: decode::<RenderType>(r.get("type"))?,
        prompt: r.get("prompt"),
        settings: r.get("settings"),
        status: decode::<RenderStatus>(r.get("status"))?,
        output_url: r.get("output_url"),
        error_message: r.get("error_message"),
        credits_cost: r.get("credits_cost"),
        chain_id: r.get("chain_id"),
        chain_position: r.get("chain_position"),
        reference_render_id: r.get("reference_render_id"),
        parent_render_id: r.get("parent_render_id"),
        is_public: r.get("is_public"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

pub struct NewRender<'a> {
    pub project_id: Option<Uuid>,
    pub user_id: Uuid,
    pub render_type: RenderType,
    pub prompt: &'a str,
    pub settings: serde_json::Value,
    pub credits_cost: i32,
    pub chain_id: Option<Uuid>,
    pub reference_render_id: Option<Uuid>,
    pub parent_render_id: Option<Uuid>,
}

/// Inserts a `pending` render. When it joins a chain it takes the next free
/// position (0 for the first render of the chain); callers lock the chain row
/// first so concurrent appends see each other.
pub async fn insert_render(conn: &mut PgConnection, render: NewRender<'_>) -> Result<Render, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO renders
                (id, project_id, user_id, type, prompt, settings, status, credits_cost,
                 chain_id, chain_position, reference_render_id, parent_render_id)
           VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8,
                   CASE WHEN $8::uuid IS NULL THEN NULL
                        ELSE (SELECT COALESCE(MAX(chain_position) + 1, 0) FROM renders WHERE chain_id = $8)
                   END,
                   $9, $10)
           RETURNING {RENDER_COLUMNS}"#
    ))
    .bind(Uuid::new_v4())
    .bind(render.project_id)
    .bind(render.user_id)
    .bind(render.render_type.as_str())
    .bind(render.prompt)
    .bind(render.settings)
    .bind(render.credits_cost)
    .bind(render.chain_id)
    .bind(render.reference_render_id)
    .bind(render.parent_render_id)
    .fetch_one(conn)
    .await?;

    render_from_row(&row)
}

pub async fn get_render(pool: &PgPool, render_id: Uuid) -> Result<Option<Render>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {RENDER_COLUMNS} FROM renders WHERE id = $1"))
        .bind(render_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(render_from_row).transpose()
}

pub async fn list_renders(
    pool: &PgPool,
    user_id: Uuid,
    project_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Render>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {RENDER_COLUMNS} FROM renders
           WHERE user_id = $1 AND ($2::uuid IS NULL OR project_id = $2)
           ORDER BY created_at DESC
           LIMIT $3 OFFSET $4"#
    ))
    .bind(user_id)
    .bind(project_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(render_from_row).collect()
}

pub async fn count_renders_in_project<'e>(
    executor: impl PgExecutor<'e>,
    project_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM renders WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(executor)
        .await?;
    Ok(row.get("n"))
}

/// Applies a provider status report. Renders already in a final state are left
/// untouched and `None` is returned.
pub async fn apply_status_update(
    pool: &PgPool,
    render_id: Uuid,
    status: RenderStatus,
    output_url: Option<&str>,
    error_message: Option<&str>,
) -> Result<Option<Render>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"UPDATE renders
           SET status = $2,
               output_url = COALESCE($3, output_url),
               error_message = COALESCE($4, error_message),
               completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() ELSE completed_at END,
               updated_at = NOW()
           WHERE id = $1 AND status IN ('pending', 'processing')
           RETURNING {RENDER_COLUMNS}"#
    ))
    .bind(render_id)
    .bind(status.as_str())
    .bind(output_url)
    .bind(error_message)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(render_from_row).transpose()
}

pub async fn create_chain(
    conn: &mut PgConnection,
    project_id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<RenderChain, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO render_chains (id, project_id, name, description)
           VALUES ($1, $2, $3, $4)
           RETURNING id, project_id, name, description, created_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(name)
    .bind(description)
    .fetch_one(conn)
    .await?;

    Ok(chain_from_row(&row))
}

pub async fn get_chain(pool: &PgPool, chain_id: Uuid) -> Result<Option<RenderChain>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, project_id, name, description, created_at FROM render_chains WHERE id = $1",
    )
    .bind(chain_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(chain_from_row))
}

/// Locks a chain row for appending renders to it.
pub async fn lock_chain(conn: &mut PgConnection, chain_id: Uuid) -> Result<Option<RenderChain>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, project_id, name, description, created_at FROM render_chains
           WHERE id = $1
           FOR NO KEY UPDATE"#,
    )
    .bind(chain_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.as_ref().map(chain_from_row))
}

/// Most recently created chain of a project, locked like `lock_chain`.
pub async fn lock_latest_chain(conn: &mut PgConnection, project_id: Uuid) -> Result<Option<RenderChain>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, project_id, name, description, created_at FROM render_chains
           WHERE project_id = $1
           ORDER BY created_at DESC
           LIMIT 1
           FOR NO KEY UPDATE"#,
    )
    .bind(project_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.as_ref().map(chain_from_row))
}

fn chain_from_row(r: &PgRow) -> RenderChain {
    RenderChain {
        id: r.get("id"),
        project_id: r.get("project_id"),
        name: r.get("name"),
        description: r.get("description"),
        created_at: r.get("created_at"),
    }
}

pub async fn list_chain_renders(pool: &PgPool, chain_id: Uuid) -> Result<Vec<Render>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {RENDER_COLUMNS} FROM renders
           WHERE chain_id = $1
           ORDER BY chain_position ASC, created_at ASC"#
    ))
    .bind(chain_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(render_from_row).collect()
}

/// Completed public renders for the gallery sitemap.
pub async fn list_public_renders(pool: &PgPool, limit: i64) -> Result<Vec<(Uuid, DateTime<Utc>)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, updated_at FROM renders
           WHERE is_public = true AND status = 'completed'
           ORDER BY updated_at DESC
           LIMIT $1"#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| (r.get("id"), r.get("updated_at"))).collect())
}
