use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use keyportal_core::body::Body;
use keyportal_core::error::EdgeError;
use keyportal_core::proxy::{ProxyHandle, ProxyRequest};
use serde::Serialize;
use serde_json::Value;

use crate::config::{ApiMethod, GatewayConfig};
use crate::error::GatewayError;
use crate::normalize;
use crate::probe::ProbeOperation;
use crate::session::Session;

const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// One backend call: method, path (relative to the base URL), optional JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiCall {
    method: ApiMethod,
    path: String,
    body: Option<Value>,
    auth_required: bool,
}

impl ApiCall {
    pub fn new(method: ApiMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            auth_required: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(ApiMethod::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(ApiMethod::Delete, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send without the bearer token.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.auth_required = false;
        self
    }

    /// Append `params` as a URL-encoded query string.
    pub fn query<T: Serialize>(mut self, params: &T) -> Result<Self, GatewayError> {
        let query = serde_urlencoded::to_string(params)
            .map_err(|err| GatewayError::Config(format!("invalid query parameters: {err}")))?;
        if !query.is_empty() {
            let separator = if self.path.contains('?') { '&' } else { '?' };
            self.path = format!("{}{separator}{query}", self.path);
        }
        Ok(self)
    }

    pub fn method(&self) -> ApiMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Client-side entry point to the key-management backend.
///
/// Requests go out through a [`ProxyHandle`], so the same gateway runs over reqwest on a
/// workstation and over a scripted client in tests.
pub struct ApiGateway {
    config: GatewayConfig,
    transport: ProxyHandle,
    session: Session,
}

impl ApiGateway {
    pub fn new(config: GatewayConfig, transport: ProxyHandle, session: Session) -> Self {
        Self {
            config,
            transport,
            session,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Send `call` and return its JSON payload.
    ///
    /// 401 becomes [`GatewayError::Unauthorized`]; other non-2xx statuses become
    /// [`GatewayError::Upstream`] carrying the payload's `error`, else `message`, else the
    /// status reason. A body that is not JSON is [`GatewayError::InvalidData`].
    pub async fn call(&self, call: &ApiCall) -> Result<Value, GatewayError> {
        let (status, bytes) = self
            .exchange(call.method, &call.path, call.body.as_ref(), call.auth_required)
            .await?;
        interpret(status, &bytes)
    }

    /// Like [`ApiGateway::call`], but a payload with `"success": false` is an error.
    pub async fn call_checked(&self, call: &ApiCall) -> Result<Value, GatewayError> {
        let payload = self.call(call).await?;
        if normalize::is_rejected(&payload) {
            let message = normalize::detail(&payload)
                .unwrap_or_else(|| format!("{} {} was rejected", call.method, call.path));
            return Err(GatewayError::Rejected { message });
        }
        Ok(payload)
    }

    /// Try each candidate of `operation` in order until one is accepted.
    pub async fn probe<T>(&self, operation: &ProbeOperation<T>) -> Result<T, GatewayError> {
        let total = operation.candidates().len();
        let mut first_detail = None;
        let mut unauthorized = false;

        for (index, candidate) in operation.candidates().iter().enumerate() {
            let outcome = self
                .exchange(
                    candidate.method,
                    &candidate.path,
                    candidate.body.as_ref(),
                    true,
                )
                .await;

            let failure = match outcome {
                Err(err) => err.to_string(),
                Ok((status, bytes)) => {
                    unauthorized |= status == StatusCode::UNAUTHORIZED;
                    match serde_json::from_slice::<Value>(&bytes) {
                        Err(_) => GatewayError::InvalidData.to_string(),
                        Ok(payload) if status.is_success() && (candidate.accept)(&payload) => {
                            return (candidate.normalize)(&payload).ok_or_else(|| {
                                GatewayError::Normalization {
                                    operation: operation.operation(),
                                    reason: format!(
                                        "{} {} returned no usable value",
                                        candidate.method, candidate.path
                                    ),
                                }
                            });
                        }
                        Ok(payload) => {
                            let detail = normalize::detail(&payload);
                            if first_detail.is_none() {
                                first_detail = detail.clone();
                            }
                            detail.unwrap_or_else(|| {
                                if status.is_success() {
                                    "response not accepted".to_string()
                                } else {
                                    status.to_string()
                                }
                            })
                        }
                    }
                }
            };

            log::warn!(
                "{}: candidate {}/{} {} {} failed: {}",
                operation.operation(),
                index + 1,
                total,
                candidate.method,
                candidate.path,
                failure
            );
        }

        Err(GatewayError::Exhausted {
            operation: operation.operation(),
            detail: first_detail,
            unauthorized,
        })
    }

    async fn exchange(
        &self,
        method: ApiMethod,
        path: &str,
        body: Option<&Value>,
        auth_required: bool,
    ) -> Result<(StatusCode, Bytes), GatewayError> {
        let uri = self.config.endpoint(path)?;
        let mut request = ProxyRequest::new(method.as_method(), uri);
        request.headers_mut().insert(ACCEPT, APPLICATION_JSON);

        if auth_required {
            if let Some(token) = self.session.token().await? {
                let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    GatewayError::Config("stored token is not a valid header value".into())
                })?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }

        match body {
            Some(body) if method != ApiMethod::Get => {
                request.headers_mut().insert(CONTENT_TYPE, APPLICATION_JSON);
                *request.body_mut() = Body::json(body)?;
            }
            Some(_) => log::debug!("dropping body on GET {path}"),
            None => {}
        }

        log::debug!("{} {}", method, request.uri());
        let response = self
            .transport
            .forward(request)
            .await
            .map_err(GatewayError::Transport)?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|err| GatewayError::Transport(EdgeError::internal(err)))?;
        Ok((status, bytes))
    }
}

fn interpret(status: StatusCode, bytes: &[u8]) -> Result<Value, GatewayError> {
    let payload = serde_json::from_slice::<Value>(bytes).ok();
    let reason = || status.canonical_reason().unwrap_or("request failed").to_string();

    if status == StatusCode::UNAUTHORIZED {
        let message = payload.as_ref().and_then(error_message).unwrap_or_else(reason);
        return Err(GatewayError::Unauthorized { message });
    }

    let payload = payload.ok_or(GatewayError::InvalidData)?;
    if !status.is_success() {
        let message = error_message(&payload).unwrap_or_else(reason);
        return Err(GatewayError::Upstream { status, message });
    }
    Ok(payload)
}

/// `error`, then `message`.
fn error_message(payload: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|field| payload.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}
