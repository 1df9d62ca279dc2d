use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use renderiq::email::{password_reset_email, send_email, EmailError, Mailer, SUPPORT_EMAIL};

fn mailer<'a>(api_base: &'a str, api_key: Option<&'a str>) -> Mailer<'a> {
    Mailer {
        api_base,
        api_key,
        from: "Renderiq <team@renderiq.io>",
    }
}

#[tokio::test]
async fn sends_message_with_bearer_key() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/emails")
            .header("Authorization", "Bearer re_test")
            .body_contains("\"to\":[\"ada@example.com\"]")
            .body_contains("\"subject\":\"Reset Your Password - Renderiq\"")
            .body_contains(SUPPORT_EMAIL);
        then.status(200).json_body(json!({ "id": "msg_1" }));
    });

    let base = server.url("");
    let message = password_reset_email("ada@example.com", Some("Ada"), "https://renderiq.io/reset-password?token=t1");
    let id = send_email(&reqwest::Client::new(), &mailer(&base, Some("re_test")), &message)
        .await
        .unwrap();

    mock.assert();
    assert_eq!(id, "msg_1");
}

#[tokio::test]
async fn rejected_messages_report_status() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/emails");
        then.status(422).json_body(json!({ "message": "Invalid `to` field" }));
    });

    let base = server.url("");
    let message = password_reset_email("ada@example.com", None, "https://renderiq.io/reset-password?token=t1");
    let err = send_email(&reqwest::Client::new(), &mailer(&base, Some("re_test")), &message)
        .await
        .unwrap_err();

    match err {
        EmailError::Api { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("Invalid"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_key_sends_nothing() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/emails");
        then.status(200).json_body(json!({ "id": "msg_1" }));
    });

    let base = server.url("");
    let message = password_reset_email("ada@example.com", None, "https://renderiq.io/reset-password?token=t1");
    for key in [None, Some("")] {
        let err = send_email(&reqwest::Client::new(), &mailer(&base, key), &message)
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::NotConfigured));
    }
    mock.assert_hits(0);
}
