// src/db/mod.rs
//
// Data access layer: one module per entity, runtime `sqlx::query` calls only,
// so building the crate never needs a live database.

pub mod api_keys;
pub mod billing;
pub mod canvas;
pub mod payments;
pub mod projects;
pub mod renders;
pub mod uploads;
pub mod users;
pub mod webhooks;

use std::str::FromStr;

/// Parses a text column into one of the status enums in `models`.
pub(crate) fn decode<T>(value: String) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    value.parse::<T>().map_err(|e| sqlx::Error::Decode(e.into()))
}

/// `23505`: a UNIQUE constraint rejected the row.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}
