// src/billing.rs

use chrono::{DateTime, Duration, Months, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::db::billing::{CreditReference, SubscriptionProvider};
use crate::models::{
    OrderType, PaymentOrder, Quality, Render, RenderSettings, RenderType, Subscription, SubscriptionPlan,
};

/// Provider cost in tenths of a US cent.
const IMAGE_STANDARD_COST: u64 = 134;
const IMAGE_ULTRA_COST: u64 = 240;
const VIDEO_COST_PER_SECOND: u64 = 150;
pub const DEFAULT_VIDEO_SECONDS: u32 = 5;

/// Credits charged for one request: `ceil(usd * 2 * 100 / 5)` per output.
pub fn credit_cost(render_type: RenderType, settings: &RenderSettings, outputs: u32) -> i32 {
    let provider_cost = match render_type {
        RenderType::Image => match settings.quality {
            Quality::Standard | Quality::High => IMAGE_STANDARD_COST,
            Quality::Ultra => IMAGE_ULTRA_COST,
        },
        RenderType::Video => {
            VIDEO_COST_PER_SECOND * u64::from(settings.duration.unwrap_or(DEFAULT_VIDEO_SECONDS).max(1))
        }
    };
    // cost/1000 USD * 40 credits per USD
    let per_output = (provider_cost * 40).div_ceil(1000);
    (per_output * u64::from(outputs.max(1))) as i32
}

/// End of the billing period that starts at `start`.
pub fn period_end(start: DateTime<Utc>, interval: &str) -> DateTime<Utc> {
    let months = if interval == "year" { 12 } else { 1 };
    start
        .checked_add_months(Months::new(months))
        .unwrap_or(start + chrono::Duration::days(30 * months as i64))
}

/// Grants the plan's monthly credits when an active subscription's last reset
/// is 30 or more days old. Returns the credits granted.
pub async fn refresh_monthly_credits(pool: &PgPool, user_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    let Some((subscription, plan)) = db::billing::get_active_subscription(pool, user_id).await? else {
        return Ok(None);
    };
    db::billing::ensure_credit_account(pool, user_id).await?;

    let mut tx = pool.begin().await?;
    if !db::billing::claim_monthly_reset(&mut tx, user_id).await? {
        return Ok(None);
    }
    let sub_id = subscription.id.to_string();
    db::billing::grant_credits(
        &mut tx,
        user_id,
        plan.credits_per_month,
        "earned",
        &format!("Monthly credits - {}", plan.name),
        Some(CreditReference {
            id: &sub_id,
            kind: "subscription",
        }),
    )
    .await?;
    tx.commit().await?;

    log::info!("granted {} monthly credits to user {user_id}", plan.credits_per_month);
    Ok(Some(plan.credits_per_month))
}

/// Returns a failed render's credits to its owner.
pub async fn refund_render(pool: &PgPool, render: &Render) -> Result<(), sqlx::Error> {
    if render.credits_cost <= 0 {
        return Ok(());
    }
    let render_id = render.id.to_string();
    let mut tx = pool.begin().await?;
    db::billing::refund_credits(
        &mut tx,
        render.user_id,
        render.credits_cost,
        "Refund for failed render",
        Some(CreditReference {
            id: &render_id,
            kind: "render",
        }),
    )
    .await?;
    tx.commit().await
}

/// Outcome of applying a paid order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfilment {
    Applied { credits: i32 },
    AlreadyProcessed,
    MissingReference(String),
}

/// Completes an open Razorpay order and applies what was bought: package
/// credits, or a subscription with its first month of credits. Runs in one
/// transaction and is idempotent per order.
pub async fn fulfil_order(
    pool: &PgPool,
    order: &PaymentOrder,
    razorpay_payment_id: Option<&str>,
) -> Result<Fulfilment, sqlx::Error> {
    let Some(reference_id) = order.reference_id else {
        return Ok(Fulfilment::MissingReference("order has no reference".into()));
    };
    let order_ref = order.id.to_string();
    let reference = CreditReference {
        id: &order_ref,
        kind: "payment_order",
    };

    match order.order_type {
        OrderType::CreditPackage => {
            let Some(package) = db::billing::get_package(pool, reference_id).await? else {
                return Ok(Fulfilment::MissingReference(format!("credit package {reference_id}")));
            };

            let mut tx = pool.begin().await?;
            if !db::payments::complete_order(&mut tx, order.id, razorpay_payment_id).await? {
                return Ok(Fulfilment::AlreadyProcessed);
            }
            db::billing::grant_credits(
                &mut tx,
                order.user_id,
                package.credits,
                "earned",
                &format!("Purchased {}", package.name),
                Some(reference),
            )
            .await?;
            if package.bonus_credits > 0 {
                db::billing::grant_credits(
                    &mut tx,
                    order.user_id,
                    package.bonus_credits,
                    "bonus",
                    &format!("Bonus credits - {}", package.name),
                    Some(reference),
                )
                .await?;
            }
            db::payments::create_invoice(&mut tx, order.id, order.user_id, &order.amount, &order.currency).await?;
            tx.commit().await?;

            Ok(Fulfilment::Applied {
                credits: package.credits + package.bonus_credits,
            })
        }
        OrderType::Subscription => {
            let Some(plan) = db::billing::get_plan(pool, reference_id).await? else {
                return Ok(Fulfilment::MissingReference(format!("plan {reference_id}")));
            };
            let Some(provider_id) = order.razorpay_subscription_id.as_deref() else {
                return Ok(Fulfilment::MissingReference("order has no subscription id".into()));
            };

            let mut tx = pool.begin().await?;
            if !db::payments::complete_order(&mut tx, order.id, razorpay_payment_id).await? {
                return Ok(Fulfilment::AlreadyProcessed);
            }
            let credits = activate_subscription_in(
                &mut tx,
                order.user_id,
                &plan,
                SubscriptionProvider::Razorpay,
                provider_id,
            )
            .await?;
            db::payments::create_invoice(&mut tx, order.id, order.user_id, &order.amount, &order.currency).await?;
            tx.commit().await?;

            Ok(Fulfilment::Applied { credits })
        }
    }
}

async fn activate_subscription_in(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
    plan: &SubscriptionPlan,
    provider: SubscriptionProvider,
    provider_subscription_id: &str,
) -> Result<i32, sqlx::Error> {
    let now = Utc::now();
    let subscription_id = db::billing::upsert_active_subscription(
        conn,
        user_id,
        plan.id,
        provider,
        provider_subscription_id,
        now,
        period_end(now, &plan.interval),
    )
    .await?;

    db::billing::reset_monthly_counters(conn, user_id).await?;
    let sub_ref = subscription_id.to_string();
    db::billing::grant_credits(
        conn,
        user_id,
        plan.credits_per_month,
        "earned",
        &format!("Subscription credits - {}", plan.name),
        Some(CreditReference {
            id: &sub_ref,
            kind: "subscription",
        }),
    )
    .await?;

    Ok(plan.credits_per_month)
}

/// Starts (or renews) a subscription period and grants its credits.
pub async fn activate_subscription(
    pool: &PgPool,
    user_id: Uuid,
    plan: &SubscriptionPlan,
    provider: SubscriptionProvider,
    provider_subscription_id: &str,
) -> Result<i32, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let credits = activate_subscription_in(&mut tx, user_id, plan, provider, provider_subscription_id).await?;
    tx.commit().await?;
    Ok(credits)
}

/// A renewal charge is applied only once the current period is within a day
/// of ending, so the first charge of a new subscription is not granted twice.
pub fn renewal_due(current_period_end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    current_period_end <= now + Duration::hours(24)
}

/// Starts the next period of a recurring subscription and grants its credits.
pub async fn renew_subscription(
    pool: &PgPool,
    subscription: &Subscription,
    provider: SubscriptionProvider,
    provider_subscription_id: &str,
) -> Result<Option<i32>, sqlx::Error> {
    if !renewal_due(subscription.current_period_end, Utc::now()) {
        return Ok(None);
    }
    let Some(plan) = db::billing::get_plan(pool, subscription.plan_id).await? else {
        log::warn!("subscription {} references missing plan {}", subscription.id, subscription.plan_id);
        return Ok(None);
    };
    let credits = activate_subscription(pool, subscription.user_id, &plan, provider, provider_subscription_id).await?;
    log::info!("renewed subscription {} for user {}", subscription.id, subscription.user_id);
    Ok(Some(credits))
}

/// Records the first Paddle transaction of a subscription and activates it.
pub async fn fulfil_paddle_subscription(
    pool: &PgPool,
    user_id: Uuid,
    plan_id: Uuid,
    transaction_id: &str,
    paddle_subscription_id: &str,
) -> Result<Fulfilment, sqlx::Error> {
    let Some(plan) = db::billing::get_plan(pool, plan_id).await? else {
        return Ok(Fulfilment::MissingReference(format!("plan {plan_id}")));
    };

    let mut tx = pool.begin().await?;
    let Some(order_id) = db::payments::insert_completed_paddle_order(
        &mut tx,
        user_id,
        OrderType::Subscription,
        plan_id,
        transaction_id,
        &plan.price,
        &plan.currency,
    )
    .await?
    else {
        return Ok(Fulfilment::AlreadyProcessed);
    };

    let credits = activate_subscription_in(
        &mut tx,
        user_id,
        &plan,
        SubscriptionProvider::Paddle,
        paddle_subscription_id,
    )
    .await?;
    db::payments::create_invoice(&mut tx, order_id, user_id, &plan.price, &plan.currency).await?;
    tx.commit().await?;

    Ok(Fulfilment::Applied { credits })
}

/// Records a Paddle credit-package purchase that has no prior order row.
pub async fn fulfil_paddle_package(
    pool: &PgPool,
    user_id: Uuid,
    package_id: Uuid,
    transaction_id: &str,
) -> Result<Fulfilment, sqlx::Error> {
    let Some(package) = db::billing::get_package(pool, package_id).await? else {
        return Ok(Fulfilment::MissingReference(format!("credit package {package_id}")));
    };

    let mut tx = pool.begin().await?;
    let Some(order_id) = db::payments::insert_completed_paddle_order(
        &mut tx,
        user_id,
        OrderType::CreditPackage,
        package_id,
        transaction_id,
        &package.price,
        &package.currency,
    )
    .await?
    else {
        return Ok(Fulfilment::AlreadyProcessed);
    };

    let order_ref = order_id.to_string();
    let total = package.credits + package.bonus_credits;
    db::billing::grant_credits(
        &mut tx,
        user_id,
        total,
        "earned",
        &format!("Purchased {}", package.name),
        Some(CreditReference {
            id: &order_ref,
            kind: "payment_order",
        }),
    )
    .await?;
    db::payments::create_invoice(&mut tx, order_id, user_id, &package.price, &package.currency).await?;
    tx.commit().await?;

    Ok(Fulfilment::Applied { credits: total })
}
