// src/db/payments.rs

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use super::decode;
use crate::models::{Invoice, OrderStatus, OrderType, PaymentOrder};

const ORDER_COLUMNS: &str = "id, user_id, type, reference_id, razorpay_order_id, razorpay_payment_id, \
     razorpay_subscription_id, paddle_transaction_id, amount::text AS amount, currency, status, \
     created_at, updated_at";

fn order_from_row(r: &PgRow) -> Result<PaymentOrder, sqlx::Error> {
    Ok(PaymentOrder {
        id: r.get("id"),
        user_id: r.get("user_id"),
        order_type: decode::<OrderType>(r.get("type"))?,
        reference_id: r.get("reference_id"),
        razorpay_order_id: r.get("razorpay_order_id"),
        razorpay_payment_id: r.get("razorpay_payment_id"),
        razorpay_subscription_id: r.get("razorpay_subscription_id"),
        paddle_transaction_id: r.get("paddle_transaction_id"),
        amount: r.get("amount"),
        currency: r.get("currency"),
        status: decode::<OrderStatus>(r.get("status"))?,
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

pub struct NewPaymentOrder<'a> {
    pub user_id: Uuid,
    pub order_type: OrderType,
    pub reference_id: Uuid,
    pub razorpay_order_id: Option<&'a str>,
    pub razorpay_subscription_id: Option<&'a str>,
    pub amount: &'a str,
    pub currency: &'a str,
    pub metadata: serde_json::Value,
}

pub async fn create_payment_order(pool: &PgPool, order: NewPaymentOrder<'_>) -> Result<PaymentOrder, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"INSERT INTO payment_orders
                (id, user_id, type, reference_id, razorpay_order_id, razorpay_subscription_id,
                 amount, currency, status, metadata)
           VALUES ($1, $2, $3, $4, $5, $6, $7::numeric, $8, 'pending', $9)
           RETURNING {ORDER_COLUMNS}"#
    ))
    .bind(Uuid::new_v4())
    .bind(order.user_id)
    .bind(order.order_type.as_str())
    .bind(order.reference_id)
    .bind(order.razorpay_order_id)
    .bind(order.razorpay_subscription_id)
    .bind(order.amount)
    .bind(order.currency)
    .bind(order.metadata)
    .fetch_one(pool)
    .await?;

    order_from_row(&row)
}

pub async fn get_order(pool: &PgPool, order_id: Uuid) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM payment_orders WHERE id = $1"))
        .bind(order_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(order_from_row).transpose()
}

pub async fn get_order_by_razorpay_order_id(
    pool: &PgPool,
    razorpay_order_id: &str,
) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM payment_orders WHERE razorpay_order_id = $1"
    ))
    .bind(razorpay_order_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(order_from_row).transpose()
}

pub async fn get_order_by_razorpay_subscription_id(
    pool: &PgPool,
    razorpay_subscription_id: &str,
) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"SELECT {ORDER_COLUMNS} FROM payment_orders
           WHERE razorpay_subscription_id = $1
           ORDER BY created_at DESC
           LIMIT 1"#
    ))
    .bind(razorpay_subscription_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(order_from_row).transpose()
}

pub async fn get_order_by_paddle_transaction_id(
    pool: &PgPool,
    transaction_id: &str,
) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {ORDER_COLUMNS} FROM payment_orders WHERE paddle_transaction_id = $1"
    ))
    .bind(transaction_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(order_from_row).transpose()
}

/// Records a Paddle transaction as a completed order. Returns `None` if the
/// transaction was already recorded.
pub async fn insert_completed_paddle_order(
    conn: &mut PgConnection,
    user_id: Uuid,
    order_type: OrderType,
    reference_id: Uuid,
    transaction_id: &str,
    amount: &str,
    currency: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO payment_orders
                (id, user_id, type, reference_id, paddle_transaction_id, amount, currency, status)
           VALUES ($1, $2, $3, $4, $5, $6::numeric, $7, 'completed')
           ON CONFLICT (paddle_transaction_id) DO NOTHING
           RETURNING id"#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(order_type.as_str())
    .bind(reference_id)
    .bind(transaction_id)
    .bind(amount)
    .bind(currency)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|r| r.get("id")))
}

/// Moves an open order to `completed`. Returns `false` when the order was
/// already completed (or cancelled), so grants are applied at most once.
pub async fn complete_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    razorpay_payment_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE payment_orders
           SET status = 'completed',
               razorpay_payment_id = COALESCE($2, razorpay_payment_id),
               updated_at = NOW()
           WHERE id = $1 AND status IN ('pending', 'processing')"#,
    )
    .bind(order_id)
    .bind(razorpay_payment_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_order_status(pool: &PgPool, order_id: Uuid, status: OrderStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_orders SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(status.as_str())
        .bind(order_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Cancels the order only while it is still `pending`.
pub async fn cancel_pending_order(pool: &PgPool, order_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE payment_orders
           SET status = 'cancelled', updated_at = NOW()
           WHERE id = $1 AND status = 'pending'"#,
    )
    .bind(order_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_orders(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<PaymentOrder>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {ORDER_COLUMNS} FROM payment_orders
           WHERE user_id = $1
           ORDER BY created_at DESC
           LIMIT $2"#
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(order_from_row).collect()
}

/// `INV-YYYYMMDD-XXXXX`, the suffix being the low five digits of a sequence value.
pub fn invoice_number(at: DateTime<Utc>, sequence: u64) -> String {
    format!("INV-{}-{:05}", at.format("%Y%m%d"), sequence % 100_000)
}

/// Issues the invoice for a completed order; idempotent per order.
pub async fn create_invoice(
    conn: &mut PgConnection,
    order_id: Uuid,
    user_id: Uuid,
    amount: &str,
    currency: &str,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let number = invoice_number(now, now.timestamp_subsec_micros() as u64 + rand::random::<u16>() as u64);

    sqlx::query(
        r#"INSERT INTO invoices (id, user_id, payment_order_id, invoice_number, amount, currency)
           VALUES ($1, $2, $3, $4, $5::numeric, $6)
           ON CONFLICT (payment_order_id) DO NOTHING"#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(order_id)
    .bind(number)
    .bind(amount)
    .bind(currency)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_invoices(pool: &PgPool, user_id: Uuid) -> Result<Vec<Invoice>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, payment_order_id, invoice_number, amount::text AS amount, currency, created_at
           FROM invoices
           WHERE user_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Invoice {
            id: r.get("id"),
            user_id: r.get("user_id"),
            payment_order_id: r.get("payment_order_id"),
            invoice_number: r.get("invoice_number"),
            amount: r.get("amount"),
            currency: r.get("currency"),
            created_at: r.get("created_at"),
        })
        .collect())
}
