use serde_json::Value;

use crate::error::GatewayError;
use crate::gateway::{ApiCall, ApiGateway};
use crate::models::{Credentials, LoginResponse, Registration, User};

impl ApiGateway {
    /// `POST /auth/register`. Does not log in.
    pub async fn register(&self, registration: &Registration) -> Result<Value, GatewayError> {
        let call = ApiCall::post("/auth/register", serde_json::to_value(registration)?).public();
        self.call_checked(&call).await
    }

    /// `POST /auth/login`, then persist the returned token and user.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<User, GatewayError> {
        let call = ApiCall::post("/auth/login", serde_json::to_value(credentials)?).public();
        let payload = self.call_checked(&call).await?;
        let LoginResponse { token, user } =
            serde_json::from_value(payload).map_err(|_| GatewayError::InvalidData)?;
        if token.is_empty() {
            return Err(GatewayError::InvalidData);
        }

        self.session_mut().login(&token, user.clone()).await?;
        log::info!("logged in as {}", user.display_name());
        Ok(user)
    }

    /// Local only; the backend keeps no server-side session.
    pub async fn logout(&mut self) -> Result<(), GatewayError> {
        self.session_mut().logout().await?;
        Ok(())
    }
}
