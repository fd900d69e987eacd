use http::StatusCode;
use keyportal_core::error::EdgeError;
use keyportal_core::kv::KvError;
use thiserror::Error;

/// Failures surfaced by [`ApiGateway`](crate::ApiGateway) and the typed operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid gateway configuration: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Transport(#[source] EdgeError),

    #[error("server returned invalid data")]
    InvalidData,

    #[error("session expired: {message}")]
    Unauthorized { message: String },

    #[error("{message} ({status})")]
    Upstream { status: StatusCode, message: String },

    /// A 2xx payload carrying `"success": false`.
    #[error("{message}")]
    Rejected { message: String },

    /// Every candidate endpoint of a probed operation failed.
    #[error("{}", exhausted_message(.operation, .detail.as_deref()))]
    Exhausted {
        operation: &'static str,
        detail: Option<String>,
        unauthorized: bool,
    },

    #[error("{operation}: {reason}")]
    Normalization {
        operation: &'static str,
        reason: String,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("session store error: {0}")]
    Session(#[from] KvError),
}

fn exhausted_message(operation: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("{operation}: {detail}"),
        None => operation.to_string(),
    }
}

impl GatewayError {
    /// True when the caller should discard the session and log in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            GatewayError::Unauthorized { .. }
                | GatewayError::Exhausted {
                    unauthorized: true,
                    ..
                }
        )
    }

    /// Upstream status, when the failure came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            GatewayError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}
