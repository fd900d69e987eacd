use serde::Serialize;
use serde_json::Value;

use super::{field, field_or_default, resource_path};
use crate::error::GatewayError;
use crate::gateway::{ApiCall, ApiGateway};
use crate::models::User;

/// Everything `GET /admin/dashboard/stats` returns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdminDashboard {
    pub stats: Value,
    pub usage_data: Vec<Value>,
    pub user_trend: Vec<Value>,
    pub plan_distribution: Vec<Value>,
    pub recent_signups: Vec<User>,
    pub top_users: Vec<Value>,
}

/// Body of `POST /admin/users`.
#[derive(Clone, Debug, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub is_active: bool,
}

/// Body of `PUT /admin/users/{id}`. An absent password leaves it unchanged.
#[derive(Clone, Debug, Serialize)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub role: String,
    pub is_active: bool,
}

impl ApiGateway {
    pub async fn admin_dashboard(&self) -> Result<AdminDashboard, GatewayError> {
        let mut payload = self
            .call_checked(&ApiCall::get("/admin/dashboard/stats"))
            .await?;
        Ok(AdminDashboard {
            stats: field_or_default(&mut payload, "stats")?,
            usage_data: field_or_default(&mut payload, "usageData")?,
            user_trend: field_or_default(&mut payload, "userTrend")?,
            plan_distribution: field_or_default(&mut payload, "planDistribution")?,
            recent_signups: field_or_default(&mut payload, "recentSignups")?,
            top_users: field_or_default(&mut payload, "topUsers")?,
        })
    }

    pub async fn admin_users(&self) -> Result<Vec<User>, GatewayError> {
        let mut payload = self.call_checked(&ApiCall::get("/admin/users")).await?;
        field(&mut payload, "users")
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<Value, GatewayError> {
        let call = ApiCall::post("/admin/users", serde_json::to_value(user)?);
        self.call_checked(&call).await
    }

    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<Value, GatewayError> {
        let call = ApiCall::put(
            resource_path("/admin/users", id, "")?,
            serde_json::to_value(update)?,
        );
        self.call_checked(&call).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<Value, GatewayError> {
        self.call_checked(&ApiCall::delete(resource_path("/admin/users", id, "")?))
            .await
    }
}
