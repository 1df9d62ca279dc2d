// src/api/currency.rs

use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::currency::{format_amount, symbol, BASE_CURRENCY};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExchangeRateQuery {
    /// ISO 4217 code, e.g. `USD`.
    pub currency: String,
    /// Optional INR amount to convert.
    pub amount: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/currency/exchange-rate",
    tag = "currency",
    params(ExchangeRateQuery),
    responses(
        (status = 200, description = "Rate from INR to the requested currency"),
        (status = 400, description = "Invalid currency code")
    )
)]
#[get("/api/currency/exchange-rate")]
pub async fn exchange_rate(
    state: web::Data<AppState>,
    query: web::Query<ExchangeRateQuery>,
) -> ApiResult<HttpResponse> {
    let code = query.currency.trim();
    let rate = state
        .exchange_rates
        .rate(code)
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut data = json!({
        "base": BASE_CURRENCY,
        "currency": code,
        "rate": rate,
        "symbol": symbol(code),
    });
    if let Some(amount) = query.amount {
        let converted = amount * rate;
        data["amount"] = json!(amount);
        data["converted"] = json!(converted);
        data["formatted"] = json!(format_amount(converted, code));
    }

    Ok(super::ok(data))
}
