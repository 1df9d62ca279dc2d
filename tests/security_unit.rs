use std::time::Duration;

use actix_web::test::TestRequest;

use renderiq::rate_limit::{client_identifier, RateLimitConfig, RateLimiter};
use renderiq::security::{
    is_valid_email, is_valid_file_size, is_valid_image_type, sanitize_input, slugify, validate_prompt,
    MAX_PROMPT_LEN,
};
use renderiq::signature::{
    paddle_signature_digest, random_hex, sha256_hex, sign_hmac_sha256_hex, verify_paddle_webhook,
    verify_razorpay_payment, verify_razorpay_subscription, verify_razorpay_webhook,
};

#[test]
fn email_validation() {
    assert!(is_valid_email("architect@studio.io"));
    assert!(!is_valid_email(""));
    assert!(!is_valid_email("no-at-sign.com"));
    assert!(!is_valid_email("a@b"));
    assert!(!is_valid_email("a b@studio.io"));
    assert!(!is_valid_email("a@b@studio.io"));
}

#[test]
fn sanitize_strips_markup_and_script_urls() {
    assert_eq!(sanitize_input("  <b>villa</b>  "), "bvilla/b");
    assert_eq!(sanitize_input("see JavaScript:alert(1)"), "see alert(1)");
    assert_eq!(sanitize_input("javajavascript:script:x"), "x");
}

#[test]
fn prompts_with_script_content_are_rejected() {
    assert_eq!(
        validate_prompt("Modern concrete villa on a hill").as_deref(),
        Ok("Modern concrete villa on a hill")
    );
    assert_eq!(validate_prompt("   "), Err("Prompt is required"));
    assert_eq!(validate_prompt("<script>alert(1)</script>"), Err("Invalid characters in prompt"));
    assert_eq!(validate_prompt("img onerror = steal()"), Err("Invalid characters in prompt"));
    assert_eq!(
        validate_prompt(&"a".repeat(MAX_PROMPT_LEN + 1)),
        Err("Prompt exceeds maximum length")
    );
}

#[test]
fn upload_checks() {
    assert!(is_valid_image_type("image/PNG"));
    assert!(is_valid_image_type("image/webp"));
    assert!(!is_valid_image_type("application/pdf"));
    assert!(is_valid_file_size(1, 10));
    assert!(!is_valid_file_size(0, 10));
    assert!(!is_valid_file_size(11, 10));
}

#[test]
fn slugs() {
    assert_eq!(slugify("Lake House, Phase 2!"), "lake-house-phase-2");
    assert_eq!(slugify("---"), "untitled");
    assert!(slugify(&"x".repeat(100)).len() <= 60);
}

#[test]
fn hmac_matches_reference_vector() {
    assert_eq!(
        sign_hmac_sha256_hex("Jefe", b"what do ya want for nothing?"),
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );
    assert_eq!(
        sha256_hex("abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn razorpay_signatures() {
    let sig = sign_hmac_sha256_hex("key-secret", b"order_1|pay_1");
    assert!(verify_razorpay_payment("key-secret", "order_1", "pay_1", &sig));
    assert!(!verify_razorpay_payment("key-secret", "order_1", "pay_2", &sig));
    assert!(!verify_razorpay_payment("", "order_1", "pay_1", &sig));

    let sig = sign_hmac_sha256_hex("key-secret", b"pay_1|sub_1");
    assert!(verify_razorpay_subscription("key-secret", "pay_1", "sub_1", &sig));

    let body = br#"{"event":"payment.captured"}"#;
    let sig = sign_hmac_sha256_hex("hook-secret", body);
    assert!(verify_razorpay_webhook("hook-secret", body, &sig));
    assert!(!verify_razorpay_webhook("hook-secret", body, "not-hex"));
}

#[test]
fn paddle_signature_header_forms() {
    assert_eq!(paddle_signature_digest("ts=1700000000;h1=abcd"), "abcd");
    assert_eq!(paddle_signature_digest("ts=1700000000, v1=ef01"), "ef01");
    assert_eq!(paddle_signature_digest(" bare "), "bare");

    let body = br#"{"event_type":"transaction.completed"}"#;
    let digest = sign_hmac_sha256_hex("paddle-secret", body);
    assert!(verify_paddle_webhook("paddle-secret", body, &format!("ts=1;h1={digest}")));
    assert!(!verify_paddle_webhook("other", body, &format!("ts=1;h1={digest}")));
}

#[test]
fn random_hex_has_requested_length() {
    let value = random_hex(16);
    assert_eq!(value.len(), 32);
    assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn rate_limiter_counts_per_identifier() {
    let limiter = RateLimiter::new();
    let config = RateLimitConfig::new(3, Duration::from_secs(60));

    let remaining: Vec<u32> = (0..3).map(|_| limiter.check("10.0.0.1", config).remaining).collect();
    assert_eq!(remaining, vec![2, 1, 0]);

    let blocked = limiter.check("10.0.0.1", config);
    assert!(!blocked.allowed);
    assert_eq!(blocked.limit, 3);
    assert!(limiter.check("10.0.0.2", config).allowed);

    limiter.purge_expired(Duration::ZERO);
    assert!(limiter.check("10.0.0.1", config).allowed);
}

#[tokio::test]
async fn rate_limit_window_resets() {
    let limiter = RateLimiter::new();
    let config = RateLimitConfig::new(1, Duration::from_millis(20));

    assert!(limiter.check("client", config).allowed);
    assert!(!limiter.check("client", config).allowed);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(limiter.check("client", config).allowed);
}

#[test]
fn client_identifier_prefers_first_forwarded_hop() {
    let req = TestRequest::default()
        .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
        .insert_header(("X-Real-IP", "10.0.0.9"))
        .to_http_request();
    assert_eq!(client_identifier(&req), "203.0.113.7");

    let req = TestRequest::default()
        .insert_header(("X-Real-IP", "10.0.0.9"))
        .to_http_request();
    assert_eq!(client_identifier(&req), "10.0.0.9");

    assert_eq!(client_identifier(&TestRequest::default().to_http_request()), "unknown");
}
