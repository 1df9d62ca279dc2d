// src/main.rs
use std::time::Duration;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::Context;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client as S3Client;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use renderiq::api::uploads::MAX_CHUNK_BYTES;
use renderiq::config::Config;
use renderiq::dedup::SWEEP_INTERVAL;
use renderiq::error::ApiError;
use renderiq::rate_limit::AUTH_EMAIL_LIMIT;
use renderiq::{api, docs, AppState};

const MAX_JSON_BYTES: usize = 4 * 1024 * 1024;
const RATE_LIMIT_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

async fn build_s3_client(endpoint: Option<&str>) -> S3Client {
    let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await;
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

    // S3-compatible stores (MinIO, R2, ...) need path-style addressing.
    if let Some(endpoint) = endpoint {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint).force_path_style(true);
    }

    S3Client::from_conf(s3_config_builder.build())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env()?;
    let port = config.port;

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;
    sqlx::migrate!().run(&pool).await.context("failed to run migrations")?;

    let s3_client = build_s3_client(config.s3_endpoint.as_deref()).await;
    let state = AppState::new(pool, s3_client, config);

    state.credits_dedup.spawn_sweeper(SWEEP_INTERVAL);
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMIT_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.purge_expired(AUTH_EMAIL_LIMIT.window);
        }
    });

    let state = web::Data::new(state);
    log::info!("listening on 0.0.0.0:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(MAX_CHUNK_BYTES))
            .app_data(
                web::JsonConfig::default()
                    .limit(MAX_JSON_BYTES)
                    .error_handler(|err, _| ApiError::BadRequest(format!("Invalid JSON body: {err}")).into()),
            )
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // public
            .service(api::auth::register)
            .service(api::auth::login)
            .service(api::auth::forgot_password)
            .service(api::auth::reset_password)
            .service(api::auth::resend_verification)
            .service(api::auth::verify_email)
            .service(api::billing::list_plans)
            .service(api::billing::list_packages)
            .service(api::currency::exchange_rate)
            .service(api::sitemap::sitemap_index)
            .service(api::sitemap::sitemap_pages)
            .service(api::sitemap::sitemap_tools)
            .service(api::sitemap::sitemap_gallery)
            .service(api::pwa::web_manifest)
            // provider callbacks, authenticated by signature or shared secret
            .service(api::payments::razorpay_webhook)
            .service(api::payments::paddle_webhook)
            .service(api::renders::render_callback)
            // plugin API, authenticated per request by PluginAuth
            .service(api::plugins::list_projects)
            .service(api::plugins::create_project)
            .service(api::plugins::get_project)
            .service(api::plugins::create_render)
            .service(api::plugins::get_render)
            .service(api::plugins::get_credits)
            .service(api::plugins::list_webhooks)
            .service(api::plugins::create_webhook)
            .service(api::plugins::delete_webhook)
            // session
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::billing::get_credits)
                    .service(api::billing::list_transactions)
                    .service(api::billing::check_limits)
                    .service(api::payments::create_order)
                    .service(api::payments::verify_payment)
                    .service(api::payments::cancel_order)
                    .service(api::payments::create_subscription)
                    .service(api::payments::cancel_subscription)
                    .service(api::payments::payment_history)
                    .service(api::payments::list_invoices)
                    .service(api::projects::list_projects)
                    .service(api::projects::create_project)
                    .service(api::projects::get_project)
                    .service(api::projects::delete_project)
                    .service(api::renders::create_render)
                    .service(api::renders::list_renders)
                    .service(api::renders::get_chain)
                    .service(api::renders::get_render)
                    .service(api::canvas::list_files)
                    .service(api::canvas::create_file)
                    .service(api::canvas::get_file)
                    .service(api::canvas::delete_file)
                    .service(api::canvas::save_graph)
                    .service(api::uploads::upload_file)
                    .service(api::uploads::init_resumable)
                    .service(api::uploads::upload_chunk)
                    .service(api::uploads::upload_status)
                    .service(api::uploads::finalize_upload)
                    .service(api::api_keys::list_keys)
                    .service(api::api_keys::create_key)
                    .service(api::api_keys::revoke_key),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
