// src/signature.rs

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `data`, hex encoded.
pub fn sign_hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this branch never fails in practice.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex HMAC-SHA256 signature.
pub fn verify_hmac_sha256_hex(secret: &str, data: &[u8], signature_hex: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

/// Razorpay Checkout: HMAC of `"{order_id}|{payment_id}"` with the key secret.
pub fn verify_razorpay_payment(key_secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let payload = format!("{order_id}|{payment_id}");
    verify_hmac_sha256_hex(key_secret, payload.as_bytes(), signature)
}

/// Razorpay subscription checkout: HMAC of `"{payment_id}|{subscription_id}"`.
pub fn verify_razorpay_subscription(key_secret: &str, payment_id: &str, subscription_id: &str, signature: &str) -> bool {
    let payload = format!("{payment_id}|{subscription_id}");
    verify_hmac_sha256_hex(key_secret, payload.as_bytes(), signature)
}

/// Razorpay webhook: HMAC of the raw body with the webhook secret.
pub fn verify_razorpay_webhook(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify_hmac_sha256_hex(webhook_secret, body, signature)
}

/// Picks the digest out of a `paddle-signature` header (`ts=...;h1=...` or
/// `ts=...,v1=...`). A header without a recognised part is used as is.
pub fn paddle_signature_digest(header: &str) -> &str {
    let parts = || header.split([',', ';']).map(str::trim);
    parts()
        .find_map(|p| p.strip_prefix("v1="))
        .or_else(|| parts().find_map(|p| p.strip_prefix("h1=")))
        .unwrap_or(header.trim())
}

/// Paddle webhook: HMAC of the raw body with the webhook secret.
pub fn verify_paddle_webhook(webhook_secret: &str, body: &[u8], header: &str) -> bool {
    verify_hmac_sha256_hex(webhook_secret, body, paddle_signature_digest(header))
}

/// Lowercase hex SHA-256, used to store API keys and one-shot tokens.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// `len` random bytes, hex encoded.
pub fn random_hex(len: usize) -> String {
    let bytes: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
    hex::encode(bytes)
}
