use httpmock::Method::POST;
use httpmock::{Mock, MockServer};
use serde_json::json;

use renderiq::api::razorpay_client::{
    cancel_subscription, create_order, create_subscription, CreateOrderRequest, CreateSubscriptionRequest, Credentials,
    RazorpayError,
};

const BASIC_AUTH: &str = "Basic cnpwX3Rlc3Q6cnpwLXNlY3JldA==";

fn credentials(api_base: &str) -> Credentials<'_> {
    Credentials {
        api_base,
        key_id: "rzp_test",
        key_secret: "rzp-secret",
    }
}

#[tokio::test]
async fn create_order_posts_amount_in_paise() {
    let server = MockServer::start_async().await;
    let mock: Mock = server.mock(|when, then| {
        when.method(POST)
            .path("/orders")
            .header("Authorization", BASIC_AUTH)
            .body_contains("\"amount\":99900")
            .body_contains("\"receipt\":\"pkg_test\"");
        then.status(200).json_body(json!({
            "id": "order_123",
            "amount": 99900,
            "currency": "INR",
            "status": "created"
        }));
    });

    let base = server.url("");
    let order = create_order(
        &reqwest::Client::new(),
        &credentials(&base),
        CreateOrderRequest {
            amount: 99_900,
            currency: "INR",
            receipt: "pkg_test",
            notes: json!({ "credits": 100 }),
        },
    )
    .await
    .unwrap();

    mock.assert();
    assert_eq!(order.id, "order_123");
    assert_eq!(order.amount, 99_900);
    assert_eq!(order.status, "created");
}

#[tokio::test]
async fn api_errors_keep_status_and_body() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/subscriptions");
        then.status(400)
            .json_body(json!({ "error": { "description": "The id provided does not exist" } }));
    });

    let base = server.url("");
    let err = create_subscription(
        &reqwest::Client::new(),
        &credentials(&base),
        CreateSubscriptionRequest {
            plan_id: "plan_missing",
            total_count: 12,
            customer_notify: 1,
            notes: json!({}),
        },
    )
    .await
    .unwrap_err();

    match err {
        RazorpayError::Api { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("does not exist"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn cancel_at_cycle_end_is_sent_as_flag() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/subscriptions/sub_42/cancel")
            .body_contains("\"cancel_at_cycle_end\":1");
        then.status(200).json_body(json!({ "id": "sub_42", "status": "active" }));
    });

    let base = server.url("");
    let sub = cancel_subscription(&reqwest::Client::new(), &credentials(&base), "sub_42", true)
        .await
        .unwrap();

    mock.assert();
    assert_eq!(sub.id, "sub_42");
    assert!(sub.short_url.is_none());
}

#[tokio::test]
async fn malformed_success_body_is_reported() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/orders");
        then.status(200).body("not json");
    });

    let base = server.url("");
    let err = create_order(
        &reqwest::Client::new(),
        &credentials(&base),
        CreateOrderRequest {
            amount: 100,
            currency: "INR",
            receipt: "pkg_bad",
            notes: json!({}),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RazorpayError::InvalidResponse(_)));
}
