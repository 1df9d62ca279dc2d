use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use renderiq::api::auth::JwtMiddleware;
use renderiq::api::payments::{cancel_order, razorpay_webhook};
use renderiq::signature::sign_hmac_sha256_hex;

mod support;

async fn insert_package(pool: &PgPool, credits: i32, bonus: i32) -> Uuid {
    let package_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO credit_packages (id, name, credits, bonus_credits, price, currency)
           VALUES ($1, 'Starter Pack', $2, $3, 499.00, 'INR')"#,
    )
    .bind(package_id)
    .bind(credits)
    .bind(bonus)
    .execute(pool)
    .await
    .expect("insert package");
    package_id
}

async fn insert_order(pool: &PgPool, user_id: Uuid, package_id: Uuid, razorpay_order_id: &str) -> Uuid {
    let order_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO payment_orders (id, user_id, type, reference_id, razorpay_order_id, amount, currency, status)
           VALUES ($1, $2, 'credit_package', $3, $4, 499.00, 'INR', 'pending')"#,
    )
    .bind(order_id)
    .bind(user_id)
    .bind(package_id)
    .bind(razorpay_order_id)
    .execute(pool)
    .await
    .expect("insert order");
    order_id
}

async fn order_status(pool: &PgPool, order_id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM payment_orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .expect("select order status")
}

#[actix_web::test]
async fn only_pending_orders_can_be_cancelled_by_their_owner() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let owner = support::insert_user(pool, true).await;
    let stranger = support::insert_user(pool, true).await;
    let package_id = insert_package(pool, 50, 0).await;
    let order_id = insert_order(pool, owner, package_id, &format!("order_{}", Uuid::new_v4().simple())).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(web::scope("/api").wrap(JwtMiddleware).service(cancel_order)),
    )
    .await;

    let req = TestRequest::post()
        .uri("/api/payments/cancel-order")
        .insert_header(support::bearer(stranger))
        .set_json(json!({ "paymentOrderId": order_id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = TestRequest::post()
        .uri("/api/payments/cancel-order")
        .insert_header(support::bearer(owner))
        .set_json(json!({ "paymentOrderId": order_id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(order_status(pool, order_id).await, "cancelled");

    let req = TestRequest::post()
        .uri("/api/payments/cancel-order")
        .insert_header(support::bearer(owner))
        .set_json(json!({ "paymentOrderId": order_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Payment order is cancelled, cannot cancel");

    let req = TestRequest::post()
        .uri("/api/payments/cancel-order")
        .insert_header(support::bearer(owner))
        .set_json(json!({ "paymentOrderId": Uuid::new_v4() }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn orders_can_be_cancelled_by_razorpay_order_id() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let owner = support::insert_user(pool, true).await;
    let package_id = insert_package(pool, 50, 0).await;
    let rzp_order_id = format!("order_{}", Uuid::new_v4().simple());
    let order_id = insert_order(pool, owner, package_id, &rzp_order_id).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .service(web::scope("/api").wrap(JwtMiddleware).service(cancel_order)),
    )
    .await;

    let req = TestRequest::post()
        .uri("/api/payments/cancel-order")
        .insert_header(support::bearer(owner))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Order ID or Payment Order ID is required");

    let req = TestRequest::post()
        .uri("/api/payments/cancel-order")
        .insert_header(support::bearer(owner))
        .set_json(json!({ "orderId": "order_unknown" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri("/api/payments/cancel-order")
        .insert_header(support::bearer(owner))
        .set_json(json!({ "orderId": rzp_order_id }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(order_status(pool, order_id).await, "cancelled");
}

#[actix_web::test]
async fn captured_payment_grants_package_credits_once() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, true).await;
    let package_id = insert_package(pool, 100, 20).await;
    let razorpay_order_id = format!("order_{}", Uuid::new_v4().simple());
    let order_id = insert_order(pool, user_id, package_id, &razorpay_order_id).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let secret = state.config.razorpay_webhook_secret.clone();
    let app = test::init_service(App::new().app_data(state.clone()).service(razorpay_webhook)).await;

    let body = json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": { "id": "pay_test_1", "order_id": razorpay_order_id }
            }
        }
    })
    .to_string();

    for _ in 0..2 {
        let req = TestRequest::post()
            .uri("/api/payments/webhook")
            .insert_header(("X-Razorpay-Signature", sign_hmac_sha256_hex(&secret, body.as_bytes())))
            .set_payload(body.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    assert_eq!(support::balance(pool, user_id).await, 120);
    assert_eq!(order_status(pool, order_id).await, "completed");

    let ledger: Vec<String> = sqlx::query_scalar(
        "SELECT type FROM credit_transactions WHERE user_id = $1 ORDER BY amount DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .expect("select ledger");
    assert_eq!(ledger, vec!["earned", "bonus"]);

    let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE payment_order_id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .expect("count invoices");
    assert_eq!(invoices, 1);
}
