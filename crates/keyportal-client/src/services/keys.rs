use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use super::{field, field_or_default, resource_path};
use crate::error::GatewayError;
use crate::gateway::{ApiCall, ApiGateway};
use crate::models::ApiKey;
use crate::normalize;
use crate::probe::{ProbeOperation, StatusChange};

/// Window for per-key usage statistics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TimeRange {
    Day,
    #[default]
    Week,
    Month,
    Quarter,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Day => "1d",
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "1d" => Ok(TimeRange::Day),
            "7d" => Ok(TimeRange::Week),
            "30d" => Ok(TimeRange::Month),
            "90d" => Ok(TimeRange::Quarter),
            other => Err(format!("unknown time range `{other}` (expected 1d, 7d, 30d or 90d)")),
        }
    }
}

/// Per-key usage: the statistics series plus the latest calls.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyUsage {
    pub stats: Value,
    pub recent_calls: Vec<Value>,
}

fn key_path(id: &str, suffix: &str) -> Result<String, GatewayError> {
    resource_path("/api-keys", id, suffix)
}

impl ApiGateway {
    /// Probes `GET /keys`, then `GET /key/list`.
    pub async fn list_keys(&self) -> Result<Vec<ApiKey>, GatewayError> {
        self.probe(&ProbeOperation::list_keys()).await
    }

    /// Probes `POST /keys`, then `POST /key/generate`. Returns the new secret.
    pub async fn generate_key(&self, name: &str) -> Result<String, GatewayError> {
        self.probe(&ProbeOperation::generate_key(name)).await
    }

    pub async fn set_key_status(
        &self,
        key_id: &str,
        active: bool,
    ) -> Result<StatusChange, GatewayError> {
        self.probe(&ProbeOperation::toggle_key_status(key_id, active)?)
            .await
    }

    pub async fn key(&self, id: &str) -> Result<ApiKey, GatewayError> {
        let mut payload = self.call_checked(&ApiCall::get(key_path(id, "")?)).await?;
        field(&mut payload, "apiKey")
    }

    /// Returns the backend's confirmation message, if any.
    pub async fn delete_key(&self, id: &str) -> Result<Option<String>, GatewayError> {
        let payload = self
            .call_checked(&ApiCall::delete(key_path(id, "")?))
            .await?;
        Ok(normalize::status_message(&payload))
    }

    /// Rotates the secret and returns the new one.
    pub async fn regenerate_key(&self, id: &str) -> Result<String, GatewayError> {
        let call = ApiCall::post(key_path(id, "/regenerate")?, json!({}));
        let mut payload = self.call_checked(&call).await?;
        field(&mut payload, "newKey")
    }

    pub async fn update_key_permissions(
        &self,
        id: &str,
        permissions: Value,
    ) -> Result<Value, GatewayError> {
        let call = ApiCall::post(
            key_path(id, "/update-permissions")?,
            json!({ "permissions": permissions }),
        );
        self.call_checked(&call).await
    }

    pub async fn recent_calls(&self, id: &str) -> Result<Vec<Value>, GatewayError> {
        let mut payload = self
            .call_checked(&ApiCall::get(key_path(id, "/recent-calls")?))
            .await?;
        field_or_default(&mut payload, "calls")
    }

    pub async fn key_usage_stats(&self, id: &str, range: TimeRange) -> Result<Value, GatewayError> {
        let call = ApiCall::get(key_path(id, "/usage-stats")?)
            .query(&[("timeRange", range.as_str())])?;
        let mut payload = self.call_checked(&call).await?;
        field_or_default(&mut payload, "stats")
    }

    /// Statistics and recent calls for one key, fetched one after the other.
    pub async fn key_usage(&self, id: &str, range: TimeRange) -> Result<KeyUsage, GatewayError> {
        let stats = self.key_usage_stats(id, range).await?;
        let recent_calls = self.recent_calls(id).await?;
        Ok(KeyUsage {
            stats,
            recent_calls,
        })
    }
}
