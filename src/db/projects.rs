// src/db/projects.rs

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgExecutor, PgPool, Row};
use uuid::Uuid;

use super::decode;
use crate::models::{Platform, Project};

const PROJECT_COLUMNS: &str = "id, user_id, name, slug, description, platform, is_public, created_at, updated_at";

fn project_from_row(r: &PgRow) -> Result<Project, sqlx::Error> {
    Ok(Project {
        id: r.get("id"),
        user_id: r.get("user_id"),
        name: r.get("name"),
        slug: r.get("slug"),
        description: r.get("description"),
        platform: decode::<Platform>(r.get("platform"))?,
        is_public: r.get("is_public"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

pub async fn create_project<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    name: &str,
    slug: &str,
    description: Option<&str>,
    platform: Platform,
) -> Result<Project, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO projects (id, user_id, name, slug, description, platform)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING {PROJECT_COLUMNS}"#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(slug)
    .bind(description)
    .bind(platform.as_str())
    .fetch_one(executor)
    .await?;

    project_from_row(&row)
}

/// Row lock held until the transaction ends. `false` when the project is gone.
pub async fn lock_project(conn: &mut PgConnection, project_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM projects WHERE id = $1 FOR NO KEY UPDATE")
        .bind(project_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn slug_exists(pool: &PgPool, slug: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM projects WHERE slug = $1) AS taken")
        .bind(slug)
        .fetch_one(pool)
        .await?;
    Ok(row.get("taken"))
}

pub async fn get_project(pool: &PgPool, project_id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
        .bind(project_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(project_from_row).transpose()
}

pub async fn list_projects(
    pool: &PgPool,
    user_id: Uuid,
    platform: Option<Platform>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Project>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {PROJECT_COLUMNS} FROM projects
           WHERE user_id = $1 AND ($2::text IS NULL OR platform = $2)
           ORDER BY updated_at DESC
           LIMIT $3 OFFSET $4"#
    ))
    .bind(user_id)
    .bind(platform.map(|p| p.as_str()))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(project_from_row).collect()
}

pub async fn count_projects<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM projects WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(executor)
        .await?;
    Ok(row.get("n"))
}

pub async fn delete_project(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
