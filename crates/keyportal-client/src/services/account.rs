use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};

use super::{field, field_or_default};
use crate::error::GatewayError;
use crate::gateway::{ApiCall, ApiGateway};

/// Body of `POST /billing/update-plan`.
#[derive(Clone, Debug, Serialize)]
pub struct PlanChange {
    pub plan: String,
}

/// Body of `POST /user/update-profile`. `new_password` is sent as `null` when unchanged.
#[derive(Clone, Debug, Serialize)]
pub struct ProfileUpdate {
    pub email: String,
    pub current_password: String,
    pub new_password: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "critical" => Ok(TicketPriority::Critical),
            other => Err(format!("unknown priority `{other}`")),
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        })
    }
}

/// Body of `POST /support/create-ticket`.
#[derive(Clone, Debug, Serialize)]
pub struct SupportTicket {
    pub subject: String,
    pub category: String,
    pub description: String,
    pub priority: TicketPriority,
}

impl SupportTicket {
    fn validate(&self) -> Result<(), GatewayError> {
        let missing: Vec<&str> = [
            ("subject", &self.subject),
            ("category", &self.category),
            ("description", &self.description),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Config(format!(
                "support ticket is missing {}",
                missing.join(", ")
            )))
        }
    }
}

impl ApiGateway {
    /// `GET /stats`: account-wide overview.
    pub async fn stats(&self) -> Result<Value, GatewayError> {
        self.call(&ApiCall::get("/stats")).await
    }

    /// `GET /stats/usage?period=`. `period` is `day`, `week`, `month` or `year`.
    pub async fn usage(&self, period: &str) -> Result<Value, GatewayError> {
        let call = ApiCall::get("/stats/usage").query(&[("period", period)])?;
        let mut payload = self.call_checked(&call).await?;
        field_or_default(&mut payload, "stats")
    }

    /// `POST /verify {apiKey}`. Public; the result is returned as sent.
    pub async fn verify_key(&self, api_key: &str) -> Result<Value, GatewayError> {
        let call = ApiCall::post("/verify", json!({ "apiKey": api_key })).public();
        self.call(&call).await
    }

    pub async fn billing_info(&self) -> Result<Value, GatewayError> {
        let mut payload = self.call_checked(&ApiCall::get("/billing/info")).await?;
        field(&mut payload, "billingInfo")
    }

    pub async fn update_plan(&self, change: &PlanChange) -> Result<Value, GatewayError> {
        let call = ApiCall::post("/billing/update-plan", serde_json::to_value(change)?);
        self.call_checked(&call).await
    }

    pub async fn profile(&self) -> Result<Value, GatewayError> {
        let mut payload = self.call_checked(&ApiCall::get("/user/profile")).await?;
        field(&mut payload, "profile")
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Value, GatewayError> {
        let call = ApiCall::post("/user/update-profile", serde_json::to_value(update)?);
        self.call_checked(&call).await
    }

    pub async fn settings(&self) -> Result<Value, GatewayError> {
        let mut payload = self.call_checked(&ApiCall::get("/user/settings")).await?;
        field(&mut payload, "settings")
    }

    pub async fn update_settings(&self, settings: Value) -> Result<Value, GatewayError> {
        let call = ApiCall::post("/user/update-settings", json!({ "settings": settings }));
        self.call_checked(&call).await
    }

    /// Validates required fields locally before sending.
    pub async fn create_support_ticket(
        &self,
        ticket: &SupportTicket,
    ) -> Result<Value, GatewayError> {
        ticket.validate()?;
        let call = ApiCall::post("/support/create-ticket", serde_json::to_value(ticket)?);
        self.call_checked(&call).await
    }
}
