// src/config.rs

use anyhow::{Context, Result};
use std::env;

use crate::api::razorpay_client::RAZORPAY_API_BASE;
use crate::email::{DEFAULT_FROM, RESEND_API_BASE};

/// Runtime configuration, read once at startup.
///
/// Required: `DATABASE_URL`, `JWT_SECRET`, `S3_BUCKET`.
/// Everything else has a development default or is optional.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub app_base_url: String,

    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub s3_public_base_url: String,

    pub razorpay_api_base: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_webhook_secret: String,
    pub paddle_webhook_secret: Option<String>,

    /// Shared secret the render provider echoes in `X-Callback-Secret`.
    pub render_callback_secret: String,

    pub exchange_rate_api_key: Option<String>,

    /// Without a key, outgoing mail is skipped with a warning.
    pub resend_api_key: Option<String>,
    pub resend_api_base: String,
    pub email_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let s3_bucket = env::var("S3_BUCKET").context("S3_BUCKET required")?;
        let s3_public_base_url = env::var("S3_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("https://{}.s3.amazonaws.com", s3_bucket));

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET required")?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "https://renderiq.io".to_string()),
            s3_bucket,
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_public_base_url,
            razorpay_api_base: env::var("RAZORPAY_API_BASE")
                .unwrap_or_else(|_| RAZORPAY_API_BASE.to_string()),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            razorpay_webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
            paddle_webhook_secret: env::var("PADDLE_WEBHOOK_SECRET").ok(),
            render_callback_secret: env::var("RENDER_CALLBACK_SECRET").unwrap_or_default(),
            exchange_rate_api_key: env::var("EXCHANGE_RATE_API_KEY").ok(),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            resend_api_base: env::var("RESEND_API_BASE").unwrap_or_else(|_| RESEND_API_BASE.to_string()),
            email_from: env::var("RESEND_FROM_EMAIL").unwrap_or_else(|_| DEFAULT_FROM.to_string()),
        })
    }

    /// Values used by tests and local tooling; nothing is read from the environment.
    pub fn for_tests() -> Self {
        Config {
            port: 0,
            database_url: String::new(),
            jwt_secret: "test-jwt-secret".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            s3_bucket: "test-bucket".to_string(),
            s3_endpoint: None,
            s3_public_base_url: "http://localhost".to_string(),
            razorpay_api_base: RAZORPAY_API_BASE.to_string(),
            razorpay_key_id: "rzp_test".to_string(),
            razorpay_key_secret: "rzp-secret".to_string(),
            razorpay_webhook_secret: "rzp-webhook-secret".to_string(),
            paddle_webhook_secret: Some("paddle-secret".to_string()),
            render_callback_secret: "callback-secret".to_string(),
            exchange_rate_api_key: None,
            resend_api_key: None,
            resend_api_base: RESEND_API_BASE.to_string(),
            email_from: DEFAULT_FROM.to_string(),
        }
    }
}
