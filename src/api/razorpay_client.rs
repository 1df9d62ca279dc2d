// src/api/razorpay_client.rs
//
// Minimal client for the Razorpay REST API (https://api.razorpay.com/v1).
// Auth: HTTP basic with key id / key secret.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub enum RazorpayError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    InvalidResponse(String),
}

impl fmt::Display for RazorpayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RazorpayError::Http(e) => write!(f, "http error: {e}"),
            RazorpayError::Api { status, body } => {
                write!(f, "razorpay api error status={status} body={body}")
            }
            RazorpayError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl From<reqwest::Error> for RazorpayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

pub struct Credentials<'a> {
    pub api_base: &'a str,
    pub key_id: &'a str,
    pub key_secret: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest<'a> {
    /// Smallest currency unit (paise for INR).
    pub amount: i64,
    pub currency: &'a str,
    pub receipt: &'a str,
    pub notes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSubscriptionRequest<'a> {
    pub plan_id: &'a str,
    pub total_count: u32,
    pub customer_notify: u8,
    pub notes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RazorpaySubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub short_url: Option<String>,
}

/// `"999.5"` -> `99950`. Rejects negative and malformed amounts.
pub fn to_minor_units(amount: &str) -> Option<i64> {
    let amount = amount.trim();
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut cents = fraction.chars().take(2).collect::<String>();
    while cents.len() < 2 {
        cents.push('0');
    }
    let whole: i64 = whole.parse().ok()?;
    let cents: i64 = cents.parse().ok()?;
    whole.checked_mul(100)?.checked_add(cents)
}

async fn parse<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, RazorpayError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(RazorpayError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<T>(&body).map_err(|e| RazorpayError::InvalidResponse(format!("{e}; body={body}")))
}

pub async fn create_order(
    client: &reqwest::Client,
    creds: &Credentials<'_>,
    req: CreateOrderRequest<'_>,
) -> Result<RazorpayOrder, RazorpayError> {
    let resp = client
        .post(format!("{}/orders", creds.api_base))
        .basic_auth(creds.key_id, Some(creds.key_secret))
        .timeout(REQUEST_TIMEOUT)
        .json(&req)
        .send()
        .await?;

    parse(resp).await
}

pub async fn create_subscription(
    client: &reqwest::Client,
    creds: &Credentials<'_>,
    req: CreateSubscriptionRequest<'_>,
) -> Result<RazorpaySubscription, RazorpayError> {
    let resp = client
        .post(format!("{}/subscriptions", creds.api_base))
        .basic_auth(creds.key_id, Some(creds.key_secret))
        .timeout(REQUEST_TIMEOUT)
        .json(&req)
        .send()
        .await?;

    parse(resp).await
}

pub async fn cancel_subscription(
    client: &reqwest::Client,
    creds: &Credentials<'_>,
    subscription_id: &str,
    cancel_at_cycle_end: bool,
) -> Result<RazorpaySubscription, RazorpayError> {
    let resp = client
        .post(format!("{}/subscriptions/{subscription_id}/cancel", creds.api_base))
        .basic_auth(creds.key_id, Some(creds.key_secret))
        .timeout(REQUEST_TIMEOUT)
        .json(&serde_json::json!({ "cancel_at_cycle_end": u8::from(cancel_at_cycle_end) }))
        .send()
        .await?;

    parse(resp).await
}

#[cfg(test)]
mod tests {
    use super::to_minor_units;

    #[test]
    fn converts_decimal_prices_to_paise() {
        assert_eq!(to_minor_units("999"), Some(99_900));
        assert_eq!(to_minor_units("999.5"), Some(99_950));
        assert_eq!(to_minor_units("12.345"), Some(1_234));
        assert_eq!(to_minor_units("-1"), None);
        assert_eq!(to_minor_units("abc"), None);
    }
}
