use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use chrono::{Duration, Utc};
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::{json, Value};
use sqlx::Row;
use uuid::Uuid;

use renderiq::api::auth::{forgot_password, login, register, verify_email};
use renderiq::config::Config;
use renderiq::db::users::{create_auth_token, TokenPurpose};
use renderiq::signature::sha256_hex;

mod support;

#[actix_web::test]
async fn register_grants_welcome_credits_and_login_checks_password() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(register)
            .service(login),
    )
    .await;

    let email = format!("architect-{}@example.com", Uuid::new_v4().simple());

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({ "email": email, "password": "short" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({ "email": email.to_uppercase(), "password": "correct-horse", "name": "Ada" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email_verified"], false);
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    let user_id: Uuid = body["data"]["user_id"].as_str().unwrap().parse().unwrap();

    assert_eq!(support::balance(pool, user_id).await, 10);
    let ledger = sqlx::query("SELECT amount, type FROM credit_transactions WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].get::<i32, _>("amount"), 10);
    assert_eq!(ledger[0].get::<String, _>("type"), "bonus");

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({ "email": email, "password": "another-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "User already exists");

    let req = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": email, "password": "wrong-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "nobody@example.com", "password": "correct-horse" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": email, "password": "correct-horse" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["user_id"], user_id.to_string());
}

#[actix_web::test]
async fn verification_tokens_are_single_use() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, false).await;
    let token = "3f1a9c0d2b7e4f6a8c5d1e0b9a7f3c2d";
    create_auth_token(
        pool,
        user_id,
        TokenPurpose::EmailVerification,
        &sha256_hex(token),
        Utc::now() + Duration::hours(1),
    )
    .await
    .unwrap();

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(App::new().app_data(state).service(verify_email)).await;

    let uri = format!("/auth/verify-email?token={token}");
    let resp = test::call_service(&app, TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let verified: bool = sqlx::query_scalar("SELECT email_verified FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();
    assert!(verified);

    let resp = test::call_service(&app, TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn forgot_password_mails_a_working_reset_link() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, true).await;
    let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();

    let server = MockServer::start_async().await;
    let reset_mail = server.mock(|when, then| {
        when.method(POST)
            .path("/emails")
            .header("Authorization", "Bearer re_test")
            .body_contains("Reset Your Password - Renderiq")
            .body_contains("http://localhost:3000/reset-password?token=");
        then.status(200).json_body(json!({ "id": "msg_reset" }));
    });

    let mut config = Config::for_tests();
    config.resend_api_key = Some("re_test".to_string());
    config.resend_api_base = server.url("");
    let state = web::Data::new(support::build_state_with(test_db.pool.clone(), config));
    let app = test::init_service(App::new().app_data(state).service(forgot_password)).await;

    let req = TestRequest::post()
        .uri("/auth/forgot-password")
        .set_json(json!({ "email": email }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    reset_mail.assert();
    let tokens: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM auth_tokens WHERE user_id = $1 AND purpose = 'password_reset' AND used_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap();
    assert_eq!(tokens, 1);
}
