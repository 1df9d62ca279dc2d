// src/db/billing.rs

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::models::{CreditAccount, CreditPackage, CreditTransaction, Subscription, SubscriptionPlan};

/// What a ledger row points back to (`render`, `payment_order`, `subscription`).
#[derive(Debug, Clone, Copy)]
pub struct CreditReference<'a> {
    pub id: &'a str,
    pub kind: &'a str,
}

fn account_from_row(r: &PgRow) -> CreditAccount {
    CreditAccount {
        user_id: r.get("user_id"),
        balance: r.get("balance"),
        total_earned: r.get("total_earned"),
        total_spent: r.get("total_spent"),
        monthly_earned: r.get("monthly_earned"),
        monthly_spent: r.get("monthly_spent"),
        last_reset_at: r.get("last_reset_at"),
    }
}

fn plan_from_row(r: &PgRow) -> SubscriptionPlan {
    SubscriptionPlan {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        price: r.get("price"),
        currency: r.get("currency"),
        interval: r.get("interval"),
        credits_per_month: r.get("credits_per_month"),
        max_projects: r.get("max_projects"),
        max_renders_per_project: r.get("max_renders_per_project"),
        razorpay_plan_id: r.get("razorpay_plan_id"),
    }
}

fn subscription_from_row(r: &PgRow) -> Subscription {
    Subscription {
        id: r.get("id"),
        user_id: r.get("user_id"),
        plan_id: r.get("plan_id"),
        status: r.get("status"),
        razorpay_subscription_id: r.get("razorpay_subscription_id"),
        paddle_subscription_id: r.get("paddle_subscription_id"),
        current_period_start: r.get("current_period_start"),
        current_period_end: r.get("current_period_end"),
        cancel_at_period_end: r.get("cancel_at_period_end"),
        canceled_at: r.get("canceled_at"),
    }
}

const ACCOUNT_COLUMNS: &str = "user_id, balance, total_earned, total_spent, monthly_earned, monthly_spent, last_reset_at";

const PLAN_COLUMNS: &str = "id, name, description, price::text AS price, currency, interval, credits_per_month, \
     max_projects, max_renders_per_project, razorpay_plan_id";

const SUBSCRIPTION_COLUMNS: &str = "s.id, s.user_id, s.plan_id, s.status, s.razorpay_subscription_id, \
     s.paddle_subscription_id, s.current_period_start, s.current_period_end, \
     s.cancel_at_period_end, s.canceled_at";

// ---- credit accounts ----

/// Returns the account, creating an empty one on first access.
pub async fn ensure_credit_account(pool: &PgPool, user_id: Uuid) -> Result<CreditAccount, sqlx::Error> {
    sqlx::query("INSERT INTO user_credits (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM user_credits WHERE user_id = $1"))
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(account_from_row(&row))
}

pub async fn get_credit_account(pool: &PgPool, user_id: Uuid) -> Result<Option<CreditAccount>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM user_credits WHERE user_id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(account_from_row))
}

async fn insert_ledger_entry(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i32,
    tx_type: &str,
    description: &str,
    reference: Option<CreditReference<'_>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO credit_transactions (id, user_id, amount, type, description, reference_id, reference_type)
           VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(amount)
    .bind(tx_type)
    .bind(description)
    .bind(reference.map(|r| r.id))
    .bind(reference.map(|r| r.kind))
    .execute(conn)
    .await?;
    Ok(())
}

/// Adds credits and writes an `earned`/`bonus` ledger row. Returns the new balance.
pub async fn grant_credits(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i32,
    tx_type: &str,
    description: &str,
    reference: Option<CreditReference<'_>>,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO user_credits (user_id, balance, total_earned, monthly_earned)
           VALUES ($1, $2, $2, $2)
           ON CONFLICT (user_id) DO UPDATE SET
               balance = user_credits.balance + EXCLUDED.balance,
               total_earned = user_credits.total_earned + EXCLUDED.balance,
               monthly_earned = user_credits.monthly_earned + EXCLUDED.balance,
               updated_at = NOW()
           RETURNING balance"#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;

    insert_ledger_entry(conn, user_id, amount, tx_type, description, reference).await?;
    Ok(row.get("balance"))
}

/// Debits `amount` only if the balance covers it. `None` means insufficient credits
/// and nothing was written.
pub async fn debit_credits(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i32,
    description: &str,
    reference: Option<CreditReference<'_>>,
) -> Result<Option<i32>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE user_credits
           SET balance = balance - $2,
               total_spent = total_spent + $2,
               monthly_spent = monthly_spent + $2,
               updated_at = NOW()
           WHERE user_id = $1 AND balance >= $2
           RETURNING balance"#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    insert_ledger_entry(conn, user_id, -amount, "spent", description, reference).await?;
    Ok(Some(row.get("balance")))
}

/// Returns credits for a failed render.
pub async fn refund_credits(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: i32,
    description: &str,
    reference: Option<CreditReference<'_>>,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE user_credits
           SET balance = balance + $2,
               total_spent = GREATEST(total_spent - $2, 0),
               monthly_spent = GREATEST(monthly_spent - $2, 0),
               updated_at = NOW()
           WHERE user_id = $1
           RETURNING balance"#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;

    insert_ledger_entry(conn, user_id, amount, "refund", description, reference).await?;
    Ok(row.get("balance"))
}

/// Zeroes the monthly counters and stamps `last_reset_at`.
pub async fn reset_monthly_counters(conn: &mut PgConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO user_credits (user_id, last_reset_at) VALUES ($1, NOW())
           ON CONFLICT (user_id) DO UPDATE SET
               monthly_earned = 0,
               monthly_spent = 0,
               last_reset_at = NOW(),
               updated_at = NOW()"#,
    )
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Claims the monthly reset if the last one is at least 30 days old (or never
/// happened). Only one concurrent caller gets `true`.
pub async fn claim_monthly_reset(conn: &mut PgConnection, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE user_credits
           SET monthly_earned = 0,
               monthly_spent = 0,
               last_reset_at = NOW(),
               updated_at = NOW()
           WHERE user_id = $1
             AND (last_reset_at IS NULL OR last_reset_at <= NOW() - INTERVAL '30 days')"#,
    )
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_credit_transactions(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<CreditTransaction>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, amount, type, description, reference_id, reference_type, created_at
           FROM credit_transactions
           WHERE user_id = $1
           ORDER BY created_at DESC
           LIMIT $2 OFFSET $3"#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CreditTransaction {
            id: r.get("id"),
            user_id: r.get("user_id"),
            amount: r.get("amount"),
            tx_type: r.get("type"),
            description: r.get("description"),
            reference_id: r.get("reference_id"),
            reference_type: r.get("reference_type"),
            created_at: r.get("created_at"),
        })
        .collect())
}

// ---- catalog ----

pub async fn list_active_plans(pool: &PgPool) -> Result<Vec<SubscriptionPlan>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE is_active = true ORDER BY price ASC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(plan_from_row).collect())
}

pub async fn get_plan(pool: &PgPool, plan_id: Uuid) -> Result<Option<SubscriptionPlan>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1 AND is_active = true"
    ))
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(plan_from_row))
}

pub async fn list_active_packages(pool: &PgPool) -> Result<Vec<CreditPackage>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, name, description, credits, bonus_credits, price::text AS price, currency, is_popular
           FROM credit_packages
           WHERE is_active = true
           ORDER BY display_order ASC, price ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(package_from_row).collect())
}

pub async fn get_package(pool: &PgPool, package_id: Uuid) -> Result<Option<CreditPackage>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, name, description, credits, bonus_credits, price::text AS price, currency, is_popular
           FROM credit_packages
           WHERE id = $1 AND is_active = true"#,
    )
    .bind(package_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(package_from_row))
}

fn package_from_row(r: &PgRow) -> CreditPackage {
    CreditPackage {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        credits: r.get("credits"),
        bonus_credits: r.get("bonus_credits"),
        price: r.get("price"),
        currency: r.get("currency"),
        is_popular: r.get("is_popular"),
    }
}

// ---- subscriptions ----

/// The subscription that currently grants plan benefits, with its plan.
/// A subscription cancelled at period end keeps its benefits until the period ends.
pub async fn get_active_subscription(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<(Subscription, SubscriptionPlan)>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"SELECT {SUBSCRIPTION_COLUMNS},
                  p.name, p.description, p.price::text AS price, p.currency, p.interval,
                  p.credits_per_month, p.max_projects, p.max_renders_per_project, p.razorpay_plan_id
           FROM user_subscriptions s
           JOIN subscription_plans p ON p.id = s.plan_id
           WHERE s.user_id = $1
             AND s.status = 'active'
             AND s.current_period_end > NOW()
           ORDER BY s.created_at DESC
           LIMIT 1"#
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| {
        let subscription = subscription_from_row(&r);
        let plan = SubscriptionPlan {
            id: subscription.plan_id,
            name: r.get("name"),
            description: r.get("description"),
            price: r.get("price"),
            currency: r.get("currency"),
            interval: r.get("interval"),
            credits_per_month: r.get("credits_per_month"),
            max_projects: r.get("max_projects"),
            max_renders_per_project: r.get("max_renders_per_project"),
            razorpay_plan_id: r.get("razorpay_plan_id"),
        };
        (subscription, plan)
    }))
}

pub async fn get_subscription_for_user(
    pool: &PgPool,
    user_id: Uuid,
    subscription_id: Uuid,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM user_subscriptions s WHERE s.id = $1 AND s.user_id = $2"
    ))
    .bind(subscription_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(subscription_from_row))
}

/// Where a provider subscription id lives.
#[derive(Debug, Clone, Copy)]
pub enum SubscriptionProvider {
    Razorpay,
    Paddle,
}

impl SubscriptionProvider {
    fn column(&self) -> &'static str {
        match self {
            SubscriptionProvider::Razorpay => "razorpay_subscription_id",
            SubscriptionProvider::Paddle => "paddle_subscription_id",
        }
    }
}

pub async fn get_subscription_by_provider_id(
    pool: &PgPool,
    provider: SubscriptionProvider,
    provider_subscription_id: &str,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM user_subscriptions s WHERE s.{} = $1",
        provider.column()
    ))
    .bind(provider_subscription_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(subscription_from_row))
}

/// Inserts or reactivates the subscription identified by the provider id.
pub async fn upsert_active_subscription(
    conn: &mut PgConnection,
    user_id: Uuid,
    plan_id: Uuid,
    provider: SubscriptionProvider,
    provider_subscription_id: &str,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
) -> Result<Uuid, sqlx::Error> {
    let column = provider.column();
    let row = sqlx::query(&format!(
        r#"INSERT INTO user_subscriptions
                (id, user_id, plan_id, status, {column}, current_period_start, current_period_end)
           VALUES ($1, $2, $3, 'active', $4, $5, $6)
           ON CONFLICT ({column}) DO UPDATE SET
               plan_id = EXCLUDED.plan_id,
               status = 'active',
               current_period_start = EXCLUDED.current_period_start,
               current_period_end = EXCLUDED.current_period_end,
               canceled_at = NULL,
               updated_at = NOW()
           RETURNING id"#
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(plan_id)
    .bind(provider_subscription_id)
    .bind(current_period_start)
    .bind(current_period_end)
    .fetch_one(conn)
    .await?;

    Ok(row.get("id"))
}

pub async fn set_subscription_status(
    pool: &PgPool,
    provider: SubscriptionProvider,
    provider_subscription_id: &str,
    status: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(&format!(
        r#"UPDATE user_subscriptions
           SET status = $1,
               canceled_at = CASE WHEN $1 = 'canceled' THEN NOW() ELSE canceled_at END,
               updated_at = NOW()
           WHERE {} = $2"#,
        provider.column()
    ))
    .bind(status)
    .bind(provider_subscription_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn mark_cancel_at_period_end(
    pool: &PgPool,
    user_id: Uuid,
    subscription_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE user_subscriptions
           SET cancel_at_period_end = true, canceled_at = NOW(), updated_at = NOW()
           WHERE id = $1 AND user_id = $2 AND status = 'active'"#,
    )
    .bind(subscription_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
