// src/api/payments.rs

use actix_web::{post, get, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::razorpay_client::{self, Credentials};
use super::Pagination;
use crate::billing::{self, Fulfilment};
use crate::db::billing::SubscriptionProvider;
use crate::error::{ApiError, ApiResult};
use crate::models::{OrderStatus, OrderType, PaymentOrder};
use crate::signature::{
    verify_paddle_webhook, verify_razorpay_payment, verify_razorpay_subscription, verify_razorpay_webhook,
};
use crate::{db, AppState};

pub const RAZORPAY_SIGNATURE_HEADER: &str = "X-Razorpay-Signature";
pub const PADDLE_SIGNATURE_HEADER: &str = "paddle-signature";

fn credentials(state: &AppState) -> Credentials<'_> {
    Credentials {
        api_base: state.config.razorpay_api_base.trim_end_matches('/'),
        key_id: &state.config.razorpay_key_id,
        key_secret: &state.config.razorpay_key_secret,
    }
}

fn owned_order(order: Option<PaymentOrder>, user_id: Uuid) -> ApiResult<PaymentOrder> {
    let order = order.ok_or_else(|| ApiError::NotFound("Payment order".into()))?;
    if order.user_id != user_id {
        return Err(ApiError::Forbidden("You do not have access to this payment order".into()));
    }
    Ok(order)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(alias = "credit_package_id")]
    pub credit_package_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub payment_order_id: Uuid,
    /// In paise.
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    tag = "payments",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Razorpay order created", body = CreateOrderResponse),
        (status = 404, description = "Credit package not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/create-order")]
pub async fn create_order(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CreateOrderRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = *user_id;
    let package = db::billing::get_package(&state.pool, payload.credit_package_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Credit package".into()))?;

    let amount = razorpay_client::to_minor_units(&package.price)
        .ok_or_else(|| ApiError::Internal(format!("invalid price {} for package {}", package.price, package.id)))?;
    let receipt = format!("pkg_{}", &Uuid::new_v4().simple().to_string()[..16]);
    let notes = json!({
        "userId": user_id,
        "creditPackageId": package.id,
        "credits": package.credits,
        "bonusCredits": package.bonus_credits,
    });

    let rzp_order = razorpay_client::create_order(
        &state.http,
        &credentials(&state),
        razorpay_client::CreateOrderRequest {
            amount,
            currency: &package.currency,
            receipt: &receipt,
            notes,
        },
    )
    .await
    .map_err(|e| ApiError::Upstream(format!("razorpay create order: {e}")))?;

    let order = db::payments::create_payment_order(
        &state.pool,
        db::payments::NewPaymentOrder {
            user_id,
            order_type: OrderType::CreditPackage,
            reference_id: package.id,
            razorpay_order_id: Some(&rzp_order.id),
            razorpay_subscription_id: None,
            amount: &package.price,
            currency: &package.currency,
            metadata: json!({
                "credits": package.credits,
                "bonusCredits": package.bonus_credits,
                "packageName": package.name,
            }),
        },
    )
    .await?;

    log::info!("created razorpay order {} for user {user_id}", rzp_order.id);
    Ok(super::ok(CreateOrderResponse {
        order_id: rzp_order.id,
        payment_order_id: order.id,
        amount: rzp_order.amount,
        currency: rzp_order.currency,
        key_id: state.config.razorpay_key_id.clone(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: Option<String>,
    pub razorpay_subscription_id: Option<String>,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    tag = "payments",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified and applied"),
        (status = 400, description = "Invalid signature or request"),
        (status = 404, description = "Payment order not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/verify")]
pub async fn verify_payment(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<VerifyPaymentRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = *user_id;
    let secret = &state.config.razorpay_key_secret;

    let (order, signature_ok) = match (&payload.razorpay_order_id, &payload.razorpay_subscription_id) {
        (Some(order_id), _) => {
            let order = db::payments::get_order_by_razorpay_order_id(&state.pool, order_id).await?;
            let ok = verify_razorpay_payment(secret, order_id, &payload.razorpay_payment_id, &payload.razorpay_signature);
            (order, ok)
        }
        (None, Some(subscription_id)) => {
            let order = db::payments::get_order_by_razorpay_subscription_id(&state.pool, subscription_id).await?;
            let ok = verify_razorpay_subscription(
                secret,
                &payload.razorpay_payment_id,
                subscription_id,
                &payload.razorpay_signature,
            );
            (order, ok)
        }
        (None, None) => {
            return Err(ApiError::Validation(
                "razorpay_order_id or razorpay_subscription_id is required".into(),
            ))
        }
    };

    let order = owned_order(order, user_id)?;
    if !signature_ok {
        log::warn!("invalid razorpay checkout signature for order {}", order.id);
        return Err(ApiError::BadRequest("Invalid payment signature".into()));
    }

    let credits = match billing::fulfil_order(&state.pool, &order, Some(&payload.razorpay_payment_id)).await? {
        Fulfilment::Applied { credits } => {
            log::info!("payment order {} completed, {credits} credits granted", order.id);
            credits
        }
        Fulfilment::AlreadyProcessed => 0,
        Fulfilment::MissingReference(what) => {
            return Err(ApiError::BadRequest(format!("Payment order is missing {what}")));
        }
    };
    state.credits_dedup.invalidate(&user_id.to_string());

    Ok(super::ok(json!({
        "paymentOrderId": order.id,
        "creditsAdded": credits,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    /// Razorpay order id (`order_...`).
    #[serde(default, alias = "order_id")]
    pub order_id: Option<String>,
    #[serde(default, alias = "payment_order_id")]
    pub payment_order_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/payments/cancel-order",
    tag = "payments",
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled"),
        (status = 400, description = "No order id given, or the order is not pending"),
        (status = 403, description = "Order belongs to another user"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/cancel-order")]
pub async fn cancel_order(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CancelOrderRequest>,
) -> ApiResult<HttpResponse> {
    let order = match (payload.payment_order_id, payload.order_id.as_deref().map(str::trim)) {
        (Some(id), _) => db::payments::get_order(&state.pool, id).await?,
        (None, Some(rzp_id)) if !rzp_id.is_empty() => {
            db::payments::get_order_by_razorpay_order_id(&state.pool, rzp_id).await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Order ID or Payment Order ID is required".into(),
            ))
        }
    };
    let order = owned_order(order, *user_id)?;

    if order.status != OrderStatus::Pending || !db::payments::cancel_pending_order(&state.pool, order.id).await? {
        let status = match db::payments::get_order(&state.pool, order.id).await? {
            Some(current) => current.status,
            None => order.status,
        };
        return Err(ApiError::BadRequest(format!(
            "Payment order is {status}, cannot cancel"
        )));
    }

    log::info!("payment order {} cancelled by user", order.id);
    Ok(super::message("Payment order cancelled"))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    #[serde(alias = "plan_id")]
    pub plan_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/payments/create-subscription",
    tag = "payments",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 200, description = "Razorpay subscription created"),
        (status = 400, description = "Already subscribed or plan unavailable"),
        (status = 404, description = "Plan not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/create-subscription")]
pub async fn create_subscription(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CreateSubscriptionRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = *user_id;
    if db::billing::get_active_subscription(&state.pool, user_id).await?.is_some() {
        return Err(ApiError::BadRequest(
            "You already have an active subscription. Please cancel your current subscription or upgrade to a different plan."
                .into(),
        ));
    }

    let plan = db::billing::get_plan(&state.pool, payload.plan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subscription plan".into()))?;
    let razorpay_plan_id = plan
        .razorpay_plan_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("This plan cannot be purchased online".into()))?;

    let subscription = razorpay_client::create_subscription(
        &state.http,
        &credentials(&state),
        razorpay_client::CreateSubscriptionRequest {
            plan_id: razorpay_plan_id,
            total_count: if plan.interval == "year" { 1 } else { 12 },
            customer_notify: 1,
            notes: json!({ "userId": user_id, "planId": plan.id }),
        },
    )
    .await
    .map_err(|e| ApiError::Upstream(format!("razorpay create subscription: {e}")))?;

    let order = db::payments::create_payment_order(
        &state.pool,
        db::payments::NewPaymentOrder {
            user_id,
            order_type: OrderType::Subscription,
            reference_id: plan.id,
            razorpay_order_id: None,
            razorpay_subscription_id: Some(&subscription.id),
            amount: &plan.price,
            currency: &plan.currency,
            metadata: json!({ "planName": plan.name, "interval": plan.interval }),
        },
    )
    .await?;

    log::info!("created razorpay subscription {} for user {user_id}", subscription.id);
    Ok(super::ok(json!({
        "subscriptionId": subscription.id,
        "paymentOrderId": order.id,
        "status": subscription.status,
        "shortUrl": subscription.short_url,
        "keyId": state.config.razorpay_key_id,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionRequest {
    #[serde(alias = "subscription_id")]
    pub subscription_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/payments/cancel-subscription",
    tag = "payments",
    request_body = CancelSubscriptionRequest,
    responses(
        (status = 200, description = "Subscription ends with the current period"),
        (status = 404, description = "Subscription not found")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/cancel-subscription")]
pub async fn cancel_subscription(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    payload: web::Json<CancelSubscriptionRequest>,
) -> ApiResult<HttpResponse> {
    let user_id = *user_id;
    let subscription = db::billing::get_subscription_for_user(&state.pool, user_id, payload.subscription_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subscription".into()))?;

    if let Some(provider_id) = subscription.razorpay_subscription_id.as_deref() {
        razorpay_client::cancel_subscription(&state.http, &credentials(&state), provider_id, true)
            .await
            .map_err(|e| ApiError::Upstream(format!("razorpay cancel subscription: {e}")))?;
    }

    if !db::billing::mark_cancel_at_period_end(&state.pool, user_id, subscription.id).await? {
        return Err(ApiError::BadRequest(format!(
            "Subscription is {}, cannot cancel",
            subscription.status
        )));
    }

    log::info!("subscription {} set to cancel at period end", subscription.id);
    Ok(super::ok(json!({
        "subscriptionId": subscription.id,
        "cancelAtPeriodEnd": true,
        "currentPeriodEnd": subscription.current_period_end,
    })))
}

#[utoipa::path(
    get,
    path = "/api/payments/history",
    tag = "payments",
    params(Pagination),
    responses((status = 200, description = "Payment orders, newest first")),
    security(("bearer_auth" = []))
)]
#[get("/payments/history")]
pub async fn payment_history(
    state: web::Data<AppState>,
    user_id: web::ReqData<Uuid>,
    page: web::Query<Pagination>,
) -> ApiResult<HttpResponse> {
    let orders = db::payments::list_orders(&state.pool, *user_id, page.limit()).await?;
    Ok(super::ok(orders))
}

#[utoipa::path(
    get,
    path = "/api/payments/invoices",
    tag = "payments",
    responses((status = 200, description = "Invoices, newest first")),
    security(("bearer_auth" = []))
)]
#[get("/payments/invoices")]
pub async fn list_invoices(state: web::Data<AppState>, user_id: web::ReqData<Uuid>) -> ApiResult<HttpResponse> {
    let invoices = db::payments::list_invoices(&state.pool, *user_id).await?;
    Ok(super::ok(invoices))
}

// ---- provider webhooks ----

#[derive(Debug, Deserialize)]
struct Entity<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct RazorpayPayment {
    id: String,
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RazorpaySubscriptionEntity {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RazorpayPayload {
    #[serde(default)]
    payment: Option<Entity<RazorpayPayment>>,
    #[serde(default)]
    subscription: Option<Entity<RazorpaySubscriptionEntity>>,
}

#[derive(Debug, Deserialize)]
struct RazorpayEvent {
    event: String,
    #[serde(default)]
    payload: RazorpayPayload,
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn acknowledged() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "received": true }))
}

fn on_fulfilment(state: &AppState, order: &PaymentOrder, outcome: Fulfilment) {
    match outcome {
        Fulfilment::Applied { credits } => {
            log::info!("webhook completed order {} ({credits} credits)", order.id);
            state.credits_dedup.invalidate(&order.user_id.to_string());
        }
        Fulfilment::AlreadyProcessed => log::info!("order {} already processed", order.id),
        Fulfilment::MissingReference(what) => log::warn!("order {} is missing {what}", order.id),
    }
}

async fn handle_razorpay_event(state: &AppState, event: RazorpayEvent) -> ApiResult<()> {
    let payment = event.payload.payment.map(|p| p.entity);
    let subscription_id = event.payload.subscription.map(|s| s.entity.id);

    match event.event.as_str() {
        "payment.captured" => {
            let Some(payment) = payment else {
                return Ok(());
            };
            let Some(order_id) = payment.order_id.as_deref() else {
                return Ok(());
            };
            let Some(order) = db::payments::get_order_by_razorpay_order_id(&state.pool, order_id).await? else {
                log::info!("payment.captured for unknown razorpay order {order_id}");
                return Ok(());
            };
            let outcome = billing::fulfil_order(&state.pool, &order, Some(&payment.id)).await?;
            on_fulfilment(state, &order, outcome);
        }
        "payment.failed" => {
            let Some(order_id) = payment.and_then(|p| p.order_id) else {
                return Ok(());
            };
            if let Some(order) = db::payments::get_order_by_razorpay_order_id(&state.pool, &order_id).await? {
                if matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
                    db::payments::set_order_status(&state.pool, order.id, OrderStatus::Failed).await?;
                    log::info!("payment order {} failed", order.id);
                }
            }
        }
        "subscription.activated" | "subscription.charged" => {
            let Some(subscription_id) = subscription_id else {
                return Ok(());
            };
            let Some(order) =
                db::payments::get_order_by_razorpay_subscription_id(&state.pool, &subscription_id).await?
            else {
                log::info!("{} for unknown subscription {subscription_id}", event.event);
                return Ok(());
            };

            if matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
                let payment_id = payment.as_ref().map(|p| p.id.as_str());
                let outcome = billing::fulfil_order(&state.pool, &order, payment_id).await?;
                on_fulfilment(state, &order, outcome);
            } else if event.event == "subscription.charged" {
                if let Some(subscription) = db::billing::get_subscription_by_provider_id(
                    &state.pool,
                    SubscriptionProvider::Razorpay,
                    &subscription_id,
                )
                .await?
                {
                    if billing::renew_subscription(&state.pool, &subscription, SubscriptionProvider::Razorpay, &subscription_id)
                        .await?
                        .is_some()
                    {
                        state.credits_dedup.invalidate(&subscription.user_id.to_string());
                    }
                }
            }
        }
        "subscription.cancelled" | "subscription.completed" => {
            if let Some(subscription_id) = subscription_id {
                db::billing::set_subscription_status(&state.pool, SubscriptionProvider::Razorpay, &subscription_id, "canceled")
                    .await?;
            }
        }
        "subscription.halted" | "subscription.pending" => {
            if let Some(subscription_id) = subscription_id {
                let status = if event.event == "subscription.halted" { "unpaid" } else { "past_due" };
                db::billing::set_subscription_status(&state.pool, SubscriptionProvider::Razorpay, &subscription_id, status)
                    .await?;
            }
        }
        other => log::debug!("ignoring razorpay event {other}"),
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 401, description = "Missing or invalid X-Razorpay-Signature"),
        (status = 500, description = "Processing failed; provider retries")
    )
)]
#[post("/api/payments/webhook")]
pub async fn razorpay_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let signature = header(&req, RAZORPAY_SIGNATURE_HEADER).ok_or(ApiError::InvalidSignature)?;
    if !verify_razorpay_webhook(&state.config.razorpay_webhook_secret, &body, signature) {
        log::warn!("razorpay webhook signature mismatch");
        return Err(ApiError::InvalidSignature);
    }

    let event: RazorpayEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {e}")))?;
    log::info!("razorpay webhook {}", event.event);

    handle_razorpay_event(&state, event).await?;
    Ok(acknowledged())
}

#[derive(Debug, Default, Deserialize)]
struct PaddleCustomData {
    #[serde(default, rename = "userId", alias = "user_id")]
    user_id: Option<Uuid>,
    #[serde(default, rename = "creditPackageId", alias = "credit_package_id")]
    credit_package_id: Option<Uuid>,
    #[serde(default, rename = "planId", alias = "plan_id")]
    plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct PaddleData {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    subscription_id: Option<String>,
    #[serde(default, alias = "customData")]
    custom_data: Option<PaddleCustomData>,
}

#[derive(Debug, Deserialize)]
struct PaddleEvent {
    event_type: String,
    data: PaddleData,
}

fn paddle_subscription_status(status: &str) -> Option<&'static str> {
    match status {
        "active" | "trialing" => Some("active"),
        "canceled" => Some("canceled"),
        "past_due" => Some("past_due"),
        "paused" => Some("unpaid"),
        _ => None,
    }
}

async fn handle_paddle_event(state: &AppState, event: PaddleEvent) -> ApiResult<()> {
    let data = event.data;
    let custom = data.custom_data.unwrap_or_default();

    match event.event_type.as_str() {
        "transaction.completed" => {
            let Some(user_id) = custom.user_id else {
                log::warn!("paddle transaction {} has no userId", data.id);
                return Ok(());
            };
            let outcome = match (custom.credit_package_id, custom.plan_id, data.subscription_id.as_deref()) {
                (Some(package_id), _, _) => billing::fulfil_paddle_package(&state.pool, user_id, package_id, &data.id).await?,
                (None, Some(plan_id), Some(subscription_id)) => {
                    billing::fulfil_paddle_subscription(&state.pool, user_id, plan_id, &data.id, subscription_id).await?
                }
                _ => {
                    log::warn!("paddle transaction {} has nothing to fulfil", data.id);
                    return Ok(());
                }
            };
            match outcome {
                Fulfilment::Applied { credits } => {
                    log::info!("paddle transaction {} granted {credits} credits", data.id);
                    state.credits_dedup.invalidate(&user_id.to_string());
                }
                Fulfilment::AlreadyProcessed => log::info!("paddle transaction {} already processed", data.id),
                Fulfilment::MissingReference(what) => log::warn!("paddle transaction {} is missing {what}", data.id),
            }
        }
        "transaction.payment_failed" => {
            if let Some(order) = db::payments::get_order_by_paddle_transaction_id(&state.pool, &data.id).await? {
                if matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
                    db::payments::set_order_status(&state.pool, order.id, OrderStatus::Failed).await?;
                }
            }
            log::info!("paddle transaction {} payment failed", data.id);
        }
        "subscription.created" | "subscription.updated" => {
            if let Some(status) = data.status.as_deref().and_then(paddle_subscription_status) {
                db::billing::set_subscription_status(&state.pool, SubscriptionProvider::Paddle, &data.id, status).await?;
            }
        }
        "subscription.canceled" => {
            db::billing::set_subscription_status(&state.pool, SubscriptionProvider::Paddle, &data.id, "canceled").await?;
        }
        "subscription.payment_succeeded" | "subscription.payment_completed" => {
            let subscription_id = data.subscription_id.as_deref().unwrap_or(&data.id);
            if let Some(subscription) =
                db::billing::get_subscription_by_provider_id(&state.pool, SubscriptionProvider::Paddle, subscription_id)
                    .await?
            {
                if billing::renew_subscription(&state.pool, &subscription, SubscriptionProvider::Paddle, subscription_id)
                    .await?
                    .is_some()
                {
                    state.credits_dedup.invalidate(&subscription.user_id.to_string());
                }
            }
        }
        other => log::debug!("ignoring paddle event {other}"),
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/payments/paddle/webhook",
    tag = "webhooks",
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 401, description = "Missing or invalid paddle-signature"),
        (status = 500, description = "Processing failed; provider retries")
    )
)]
#[post("/api/payments/paddle/webhook")]
pub async fn paddle_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let secret = state
        .config
        .paddle_webhook_secret
        .as_deref()
        .ok_or(ApiError::InvalidSignature)?;
    let signature = header(&req, PADDLE_SIGNATURE_HEADER).ok_or(ApiError::InvalidSignature)?;
    if !verify_paddle_webhook(secret, &body, signature) {
        log::warn!("paddle webhook signature mismatch");
        return Err(ApiError::InvalidSignature);
    }

    let event: PaddleEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {e}")))?;
    log::info!("paddle webhook {}", event.event_type);

    handle_paddle_event(&state, event).await?;
    Ok(acknowledged())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_razorpay_payment_payload() {
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1","order_id":"order_9"}}}}"#;
        let event: RazorpayEvent = serde_json::from_slice(body).unwrap();
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(payment.id, "pay_1");
        assert_eq!(payment.order_id.as_deref(), Some("order_9"));
    }

    #[test]
    fn parses_paddle_custom_data_in_either_case() {
        let user = Uuid::new_v4();
        let body = format!(
            r#"{{"event_type":"transaction.completed","data":{{"id":"txn_1","customData":{{"userId":"{user}"}}}}}}"#
        );
        let event: PaddleEvent = serde_json::from_str(&body).unwrap();
        assert_eq!(event.data.custom_data.unwrap().user_id, Some(user));
    }

    #[test]
    fn maps_paddle_statuses() {
        assert_eq!(paddle_subscription_status("paused"), Some("unpaid"));
        assert_eq!(paddle_subscription_status("draft"), None);
    }
}
