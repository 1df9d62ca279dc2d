// src/api/pwa.rs

use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ManifestIcon {
    pub src: &'static str,
    pub sizes: &'static str,
    #[serde(rename = "type")]
    pub mime: &'static str,
    pub purpose: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ManifestShortcut {
    pub name: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WebAppManifest {
    pub name: &'static str,
    pub short_name: &'static str,
    pub description: &'static str,
    pub id: String,
    pub start_url: &'static str,
    pub scope: &'static str,
    pub display: &'static str,
    pub orientation: &'static str,
    pub background_color: &'static str,
    pub theme_color: &'static str,
    pub categories: &'static [&'static str],
    pub icons: Vec<ManifestIcon>,
    pub shortcuts: Vec<ManifestShortcut>,
}

pub fn manifest(base_url: &str) -> WebAppManifest {
    let icon = |src, sizes, purpose| ManifestIcon {
        src,
        sizes,
        mime: "image/png",
        purpose,
    };

    WebAppManifest {
        name: "Renderiq - AI Architectural Visualization",
        short_name: "Renderiq",
        description: "Turn sketches and prompts into photorealistic architectural renders and videos.",
        id: format!("{}/", base_url.trim_end_matches('/')),
        start_url: "/?source=pwa",
        scope: "/",
        display: "standalone",
        orientation: "any",
        background_color: "#000000",
        theme_color: "#000000",
        categories: &["design", "productivity", "graphics"],
        icons: vec![
            icon("/icons/icon-192x192.png", "192x192", "any"),
            icon("/icons/icon-512x512.png", "512x512", "any"),
            icon("/icons/maskable-512x512.png", "512x512", "maskable"),
        ],
        shortcuts: vec![
            ManifestShortcut {
                name: "New render",
                url: "/render",
            },
            ManifestShortcut {
                name: "Canvas",
                url: "/canvas",
            },
            ManifestShortcut {
                name: "Gallery",
                url: "/gallery",
            },
        ],
    }
}

#[utoipa::path(
    get,
    path = "/manifest.json",
    tag = "pwa",
    responses((status = 200, description = "Web app manifest", content_type = "application/manifest+json"))
)]
#[get("/manifest.json")]
pub async fn web_manifest(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/manifest+json")
        .insert_header(("Cache-Control", "public, max-age=86400"))
        .json(manifest(&state.config.app_base_url))
}
