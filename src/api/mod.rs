pub mod api_keys;
pub mod auth;
pub mod billing;
pub mod canvas;
pub mod currency;
pub mod payments;
pub mod plugin_auth;
pub mod plugins;
pub mod projects;
pub mod pwa;
pub mod razorpay_client;
pub mod renders;
pub mod sitemap;
pub mod uploads;

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::IntoParams;

/// `{ "success": true, "data": ... }`
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(json!({ "success": true, "data": data }))
}

/// `{ "success": true, "message": ... }`
pub fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": text }))
}

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
