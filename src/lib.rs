pub mod api;
pub mod billing;
pub mod canvas;
pub mod config;
pub mod currency;
pub mod db;
pub mod dedup;
pub mod delivery;
pub mod docs;
pub mod email;
pub mod error;
pub mod limits;
pub mod models;
pub mod rate_limit;
pub mod s3_utils;
pub mod security;
pub mod signature;
pub mod sitemap;
pub mod uploads;

use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::currency::ExchangeRates;
use crate::dedup::RequestDeduplicator;
use crate::models::CreditAccount;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub s3_client: S3Client,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub credits_dedup: RequestDeduplicator<CreditAccount, String>,
    pub exchange_rates: ExchangeRates,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, s3_client: S3Client, config: Config) -> Self {
        let http = reqwest::Client::new();
        AppState {
            pool,
            s3_client,
            exchange_rates: ExchangeRates::new(http.clone(), config.exchange_rate_api_key.clone()),
            config: Arc::new(config),
            http,
            credits_dedup: RequestDeduplicator::new(),
            rate_limiter: RateLimiter::new(),
        }
    }
}
