// src/api/sitemap.rs

use actix_web::{get, web, HttpResponse};
use chrono::Utc;

use crate::error::ApiResult;
use crate::sitemap::{gallery_urls, page_urls, render_index, render_urlset, tool_urls};
use crate::{db, AppState};

/// Upper bound from the sitemap protocol for a single file.
const MAX_GALLERY_URLS: i64 = 50_000;

fn xml(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/xml; charset=utf-8")
        .insert_header(("Cache-Control", "public, max-age=3600, s-maxage=3600"))
        .body(body)
}

#[utoipa::path(get, path = "/sitemap.xml", tag = "sitemap", responses((status = 200, description = "Sitemap index")))]
#[get("/sitemap.xml")]
pub async fn sitemap_index(state: web::Data<AppState>) -> HttpResponse {
    xml(render_index(&state.config.app_base_url, Utc::now()))
}

#[utoipa::path(get, path = "/sitemap-pages.xml", tag = "sitemap", responses((status = 200, description = "Static pages")))]
#[get("/sitemap-pages.xml")]
pub async fn sitemap_pages(state: web::Data<AppState>) -> HttpResponse {
    xml(render_urlset(&page_urls(&state.config.app_base_url, Utc::now())))
}

#[utoipa::path(get, path = "/sitemap-tools.xml", tag = "sitemap", responses((status = 200, description = "Tool pages")))]
#[get("/sitemap-tools.xml")]
pub async fn sitemap_tools(state: web::Data<AppState>) -> HttpResponse {
    xml(render_urlset(&tool_urls(&state.config.app_base_url, Utc::now())))
}

#[utoipa::path(get, path = "/sitemap-gallery.xml", tag = "sitemap", responses((status = 200, description = "Public renders")))]
#[get("/sitemap-gallery.xml")]
pub async fn sitemap_gallery(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let renders = db::renders::list_public_renders(&state.pool, MAX_GALLERY_URLS).await?;
    Ok(xml(render_urlset(&gallery_urls(&state.config.app_base_url, &renders))))
}
