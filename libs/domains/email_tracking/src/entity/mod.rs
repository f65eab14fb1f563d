//! Sea-ORM entities for the tracking tables and the webhook dead-letter table.

pub mod dead_letter;
pub mod email_log;
pub mod event_log;
pub mod recipient_tracker;

/// Decode a JSON column into a typed value, falling back to the default.
pub(crate) fn from_json<T>(value: sea_orm::prelude::Json) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    serde_json::from_value(value).unwrap_or_default()
}

/// Encode a typed value into a JSON column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> sea_orm::prelude::Json {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
