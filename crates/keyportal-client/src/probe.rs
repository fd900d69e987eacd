//! Ordered endpoint candidates for operations whose backend route is not fixed.
//!
//! [`ApiGateway::probe`](crate::ApiGateway::probe) tries the candidates of a
//! [`ProbeOperation`] one after another and stops at the first accepted payload.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::ApiMethod;
use crate::error::GatewayError;
use crate::models::ApiKey;
use crate::normalize;
use crate::services::resource_path;

pub type Accept = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Normalize<T> = Arc<dyn Fn(&Value) -> Option<T> + Send + Sync>;

pub struct Candidate<T> {
    pub method: ApiMethod,
    pub path: String,
    pub body: Option<Value>,
    pub accept: Accept,
    pub normalize: Normalize<T>,
}

impl<T> Candidate<T> {
    pub fn new<A, N>(method: ApiMethod, path: impl Into<String>, accept: A, normalize: N) -> Self
    where
        A: Fn(&Value) -> bool + Send + Sync + 'static,
        N: Fn(&Value) -> Option<T> + Send + Sync + 'static,
    {
        Self {
            method,
            path: path.into(),
            body: None,
            accept: Arc::new(accept),
            normalize: Arc::new(normalize),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl<T> Clone for Candidate<T> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            path: self.path.clone(),
            body: self.body.clone(),
            accept: Arc::clone(&self.accept),
            normalize: Arc::clone(&self.normalize),
        }
    }
}

impl<T> fmt::Debug for Candidate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// A named operation and its candidates in preference order.
///
/// `operation` doubles as the failure message when every candidate fails.
#[derive(Clone, Debug)]
pub struct ProbeOperation<T> {
    operation: &'static str,
    candidates: Vec<Candidate<T>>,
}

impl<T> ProbeOperation<T> {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            candidates: Vec::new(),
        }
    }

    #[must_use]
    pub fn candidate(mut self, candidate: Candidate<T>) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn candidates(&self) -> &[Candidate<T>] {
        &self.candidates
    }
}

pub const LIST_KEYS: &str = "failed to fetch API keys";
pub const GENERATE_KEY: &str = "failed to generate API key";
pub const TOGGLE_KEY_STATUS: &str = "failed to update API key status";

fn parse_keys(payload: &Value) -> Option<Vec<ApiKey>> {
    let items = normalize::key_list(payload)?;
    serde_json::from_value(Value::Array(items)).ok()
}

impl ProbeOperation<Vec<ApiKey>> {
    /// `GET /keys`, then `GET /key/list`.
    pub fn list_keys() -> Self {
        ProbeOperation::new(LIST_KEYS)
            .candidate(Candidate::new(
                ApiMethod::Get,
                "/keys",
                normalize::accepts_key_list,
                parse_keys,
            ))
            .candidate(Candidate::new(
                ApiMethod::Get,
                "/key/list",
                normalize::accepts_key_list,
                parse_keys,
            ))
    }
}

impl ProbeOperation<String> {
    /// `POST /keys {name}`, then `POST /key/generate {name}`.
    pub fn generate_key(name: &str) -> Self {
        let body = json!({ "name": name });
        ProbeOperation::new(GENERATE_KEY)
            .candidate(
                Candidate::new(
                    ApiMethod::Post,
                    "/keys",
                    normalize::accepts_generated_key,
                    normalize::generated_key,
                )
                .with_body(body.clone()),
            )
            .candidate(
                Candidate::new(
                    ApiMethod::Post,
                    "/key/generate",
                    normalize::accepts_generated_key,
                    normalize::generated_key,
                )
                .with_body(body),
            )
    }
}

/// Normalized result of a status change: the backend's message, if it sent one.
pub type StatusChange = Option<String>;

impl ProbeOperation<StatusChange> {
    /// `PATCH /keys/{id} {active}`, then `POST /key/toggle-status {key_id, status}`.
    ///
    /// Fails without building anything when `key_id` is not a single path segment.
    pub fn toggle_key_status(key_id: &str, active: bool) -> Result<Self, GatewayError> {
        let path = resource_path("/keys", key_id, "")?;
        let status = if active { "active" } else { "disabled" };
        let message = |payload: &Value| Some(normalize::status_message(payload));
        Ok(ProbeOperation::new(TOGGLE_KEY_STATUS)
            .candidate(
                Candidate::new(
                    ApiMethod::Patch,
                    path,
                    normalize::accepts_status_change,
                    message,
                )
                .with_body(json!({ "active": active })),
            )
            .candidate(
                Candidate::new(
                    ApiMethod::Post,
                    "/key/toggle-status",
                    normalize::accepts_status_change,
                    message,
                )
                .with_body(json!({ "key_id": key_id, "status": status })),
            ))
    }
}
