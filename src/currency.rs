// src/currency.rs

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::dedup::RequestDeduplicator;

pub const BASE_CURRENCY: &str = "INR";
pub const RATE_TTL: Duration = Duration::from_secs(5 * 60);
pub const FALLBACK_TTL: Duration = Duration::from_secs(60);

const EXCHANGE_RATE_API_URL: &str = "https://api.exchangerate-api.com/v4/latest/INR";
const FIXER_URL: &str = "https://api.fixer.io/latest";

/// Approximate `1 INR = x` rates used when every upstream lookup fails.
const FALLBACK_RATES: &[(&str, f64)] = &[
    ("USD", 0.012),
    ("EUR", 0.011),
    ("GBP", 0.0095),
    ("CAD", 0.016),
    ("AUD", 0.018),
    ("SGD", 0.016),
    ("JPY", 1.8),
    ("AED", 0.044),
    ("SAR", 0.045),
    ("CNY", 0.086),
    ("KRW", 16.0),
    ("HKD", 0.094),
    ("MYR", 0.056),
    ("THB", 0.43),
    ("IDR", 190.0),
    ("PHP", 0.67),
    ("VND", 300.0),
    ("QAR", 0.044),
    ("KWD", 0.0037),
    ("OMR", 0.0046),
    ("BHD", 0.0045),
    ("ILS", 0.044),
    ("TRY", 0.39),
    ("CHF", 0.011),
    ("SEK", 0.13),
    ("NOK", 0.13),
    ("DKK", 0.082),
    ("PLN", 0.048),
    ("CZK", 0.28),
    ("HUF", 4.3),
    ("RON", 0.054),
    ("RUB", 1.1),
    ("MXN", 0.20),
    ("BRL", 0.060),
    ("ARS", 10.5),
    ("CLP", 11.0),
    ("COP", 47.0),
    ("PEN", 0.044),
    ("NZD", 0.019),
    ("ZAR", 0.22),
    ("EGP", 0.37),
    ("NGN", 18.0),
    ("KES", 1.6),
    ("PKR", 3.3),
    ("BDT", 1.3),
    ("LKR", 3.8),
    ("NPR", 1.6),
];

const SYMBOLS: &[(&str, &str)] = &[
    ("INR", "₹"),
    ("USD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("JPY", "¥"),
    ("CNY", "¥"),
    ("KRW", "₩"),
    ("SGD", "S$"),
    ("HKD", "HK$"),
    ("MYR", "RM"),
    ("THB", "฿"),
    ("IDR", "Rp"),
    ("PHP", "₱"),
    ("AED", "د.إ"),
    ("CHF", "CHF"),
    ("CAD", "C$"),
    ("AUD", "A$"),
    ("NZD", "NZ$"),
    ("BRL", "R$"),
    ("ZAR", "R"),
    ("RUB", "₽"),
    ("TRY", "₺"),
    ("ILS", "₪"),
    ("NGN", "₦"),
    ("PKR", "₨"),
    ("BDT", "৳"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Invalid currency code: {0}")]
    InvalidCode(String),
}

/// Three uppercase ASCII letters.
pub fn validate_code(code: &str) -> Result<(), CurrencyError> {
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(CurrencyError::InvalidCode(code.to_string()))
    }
}

pub fn fallback_rate(code: &str) -> Option<f64> {
    FALLBACK_RATES.iter().find(|(c, _)| *c == code).map(|(_, r)| *r)
}

pub fn symbol(code: &str) -> &'static str {
    SYMBOLS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
        .unwrap_or("₹")
}

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedRate {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

#[derive(Deserialize)]
struct RatesResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// INR-based exchange rates with a per-currency cache.
#[derive(Clone)]
pub struct ExchangeRates {
    cache: Arc<Mutex<HashMap<String, CachedRate>>>,
    inflight: RequestDeduplicator<f64, String>,
    client: reqwest::Client,
    fixer_key: Option<String>,
}

impl ExchangeRates {
    pub fn new(client: reqwest::Client, fixer_key: Option<String>) -> Self {
        ExchangeRates {
            cache: Arc::new(Mutex::new(HashMap::new())),
            // The dedup layer only collapses concurrent fetches; caching is ours.
            inflight: RequestDeduplicator::with_timeouts(Duration::ZERO, Duration::from_secs(30)),
            client,
            fixer_key,
        }
    }

    /// Rate for converting INR into `code`, looked up upstream when not cached.
    pub async fn rate(&self, code: &str) -> Result<f64, CurrencyError> {
        let client = self.client.clone();
        let fixer_key = self.fixer_key.clone();
        self.rate_with(code, move |code| fetch_upstream(client, fixer_key, code))
            .await
    }

    /// Same as [`rate`](Self::rate) with a caller-provided upstream lookup.
    pub async fn rate_with<F, Fut>(&self, code: &str, fetch: F) -> Result<f64, CurrencyError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<f64, String>> + Send + 'static,
    {
        validate_code(code)?;
        if code == BASE_CURRENCY {
            return Ok(1.0);
        }

        let cached = self.cache.lock().get(code).copied();
        if let Some(entry) = cached.filter(CachedRate::is_fresh) {
            return Ok(entry.rate);
        }

        let owned = code.to_string();
        match self.inflight.deduplicate(code, move || fetch(owned)).await {
            Ok(rate) => {
                self.store(code, rate, RATE_TTL);
                Ok(rate)
            }
            Err(err) => {
                log::warn!("exchange rate lookup for {code} failed: {err}");
                if let Some(stale) = cached {
                    return Ok(stale.rate);
                }
                if let Some(rate) = fallback_rate(code) {
                    self.store(code, rate, FALLBACK_TTL);
                    return Ok(rate);
                }
                log::warn!("no exchange rate available for {code}, using 1:1");
                Ok(1.0)
            }
        }
    }

    /// Seeds the cache with a fresh rate.
    pub fn insert(&self, code: &str, rate: f64) {
        self.store(code, rate, RATE_TTL);
    }

    fn store(&self, code: &str, rate: f64, ttl: Duration) {
        self.cache.lock().insert(
            code.to_string(),
            CachedRate {
                rate,
                fetched_at: Instant::now(),
                ttl,
            },
        );
    }

    pub async fn convert(&self, amount_inr: f64, code: &str) -> Result<f64, CurrencyError> {
        Ok(amount_inr * self.rate(code).await?)
    }
}

async fn fetch_upstream(client: reqwest::Client, fixer_key: Option<String>, code: String) -> Result<f64, String> {
    if let Some(key) = fixer_key {
        match fetch_rates(&client, FIXER_URL, &[("base", BASE_CURRENCY), ("access_key", key.as_str())]).await {
            Ok(body) if body.success.unwrap_or(false) => {
                if let Some(rate) = body.rates.get(&code) {
                    return Ok(*rate);
                }
            }
            Ok(_) => log::warn!("fixer returned no rates, trying exchangerate-api"),
            Err(e) => log::warn!("fixer request failed, trying exchangerate-api: {e}"),
        }
    }

    let body = fetch_rates(&client, EXCHANGE_RATE_API_URL, &[]).await?;
    body.rates
        .get(&code)
        .copied()
        .filter(|r| *r > 0.0)
        .ok_or_else(|| format!("rate for {code} missing from response"))
}

async fn fetch_rates(client: &reqwest::Client, url: &str, query: &[(&str, &str)]) -> Result<RatesResponse, String> {
    let resp = client
        .get(url)
        .query(query)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !resp.status().is_success() {
        return Err(format!("exchange rate API returned {}", resp.status()));
    }
    resp.json::<RatesResponse>().await.map_err(|e| e.to_string())
}

/// `symbol` + thousands separators, two decimals (none for JPY).
pub fn format_amount(amount: f64, code: &str) -> String {
    let decimals = if code == "JPY" { 0 } else { 2 };
    let formatted = format!("{:.*}", decimals, amount.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted.clone(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{sign}{}{grouped}.{frac}", symbol(code)),
        None => format!("{sign}{}{grouped}", symbol(code)),
    }
}

/// Short form with k/m/b suffixes and at most one decimal.
pub fn format_compact(value: f64) -> String {
    let scaled = |divisor: f64, suffix: &str| {
        let text = format!("{:.1}", value / divisor);
        let text = text.strip_suffix(".0").unwrap_or(&text).to_string();
        format!("{text}{suffix}")
    };

    if value >= 1_000_000_000.0 {
        scaled(1_000_000_000.0, "b")
    } else if value >= 1_000_000.0 {
        scaled(1_000_000.0, "m")
    } else if value >= 1_000.0 {
        scaled(1_000.0, "k")
    } else {
        format!("{}", value.round() as i64)
    }
}

pub fn format_amount_compact(amount: f64, code: &str) -> String {
    format!("{}{}", symbol(code), format_compact(amount))
}
