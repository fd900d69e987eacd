//! Typed backend operations, grouped by dashboard area.
//!
//! Each group is an `impl ApiGateway` block; the free helpers below pull typed fields out
//! of `{success, ...}` payloads.

mod account;
mod admin;
mod auth;
mod keys;

pub use account::{PlanChange, ProfileUpdate, SupportTicket, TicketPriority};
pub use admin::{AdminDashboard, NewUser, UserUpdate};
pub use keys::{KeyUsage, TimeRange};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::GatewayError;

/// Deserialize `payload[name]`. A missing or mistyped field is invalid data.
pub(crate) fn field<T: DeserializeOwned>(payload: &mut Value, name: &str) -> Result<T, GatewayError> {
    let value = payload
        .get_mut(name)
        .map(Value::take)
        .ok_or(GatewayError::InvalidData)?;
    serde_json::from_value(value).map_err(|err| {
        log::debug!("field `{name}` did not match the expected shape: {err}");
        GatewayError::InvalidData
    })
}

/// `{collection}/{id}{suffix}`. Ids that would escape their path segment are refused.
pub(crate) fn resource_path(
    collection: &str,
    id: &str,
    suffix: &str,
) -> Result<String, GatewayError> {
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(GatewayError::Config(format!(
            "invalid id `{id}` for {collection}"
        )));
    }
    Ok(format!("{collection}/{id}{suffix}"))
}

/// Like [`field`], but a missing or null field yields `T::default()`.
pub(crate) fn field_or_default<T: DeserializeOwned + Default>(
    payload: &mut Value,
    name: &str,
) -> Result<T, GatewayError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(_) => field(payload, name),
    }
}
