//! Edge request forwarding to a bound upstream service.
//!
//! A [`Forwarder`] relays every request it receives to the upstream reached through the
//! request's [`ProxyHandle`]. It runs in one of two modes:
//!
//! * [`Forwarder::passthrough`] submits a structural copy of the request (same method, URL,
//!   headers and body).
//! * [`Forwarder::strip_prefix`] removes one leading public prefix such as `/api` from the path,
//!   keeps the raw query string byte-for-byte, and tags the outbound request with
//!   `X-Original-URL` / `X-New-URL` for tracing.
//!
//! Upstream responses, including 4xx/5xx, are returned unchanged. Only a failure of the
//! forwarding attempt itself (no binding, unparsable URL, transport error) is turned into the
//! JSON error envelope `{"error": "request processing failed", "message": <cause>}` with
//! status 500.

use std::borrow::Cow;

use serde::Serialize;

use crate::body::Body;
use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::http::{HeaderName, HeaderValue, Request, Response, StatusCode, Uri};
use crate::manifest::ManifestForwarder;
use crate::proxy::{ProxyHandle, ProxyRequest};
use crate::response::{json_response, response_with_body};

/// Carries the absolute URL the client originally requested.
pub const ORIGINAL_URL_HEADER: HeaderName = HeaderName::from_static("x-original-url");
/// Carries the absolute URL submitted to the upstream.
pub const NEW_URL_HEADER: HeaderName = HeaderName::from_static("x-new-url");
/// Label placed in the `error` field of the failure envelope.
pub const FAILURE_LABEL: &str = "request processing failed";

#[derive(Clone, Debug, Default)]
pub struct Forwarder {
    prefix: Option<String>,
    debug_headers: bool,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a str,
    message: String,
}

impl Forwarder {
    /// Forward requests unchanged.
    pub fn passthrough() -> Self {
        Self {
            prefix: None,
            debug_headers: false,
        }
    }

    /// Strip `prefix` from request paths and attach the debug headers.
    ///
    /// The prefix is normalised to a leading `/` without a trailing one; `""` and `"/"` leave
    /// paths untouched.
    pub fn strip_prefix(prefix: impl AsRef<str>) -> Self {
        let trimmed = prefix.as_ref().trim().trim_end_matches('/');
        let prefix = if trimmed.is_empty() {
            None
        } else if trimmed.starts_with('/') {
            Some(trimmed.to_string())
        } else {
            Some(format!("/{trimmed}"))
        };
        Self {
            prefix,
            debug_headers: true,
        }
    }

    #[must_use]
    pub fn with_debug_headers(mut self, enabled: bool) -> Self {
        self.debug_headers = enabled;
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn debug_headers(&self) -> bool {
        self.debug_headers
    }

    /// Remove one leading occurrence of the prefix, matching on a segment boundary only.
    ///
    /// `/api/keys` becomes `/keys`, `/api` becomes `/`, and `/apikeys` or `/keys` are returned
    /// as-is.
    pub fn rewrite_path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        let Some(prefix) = self.prefix.as_deref() else {
            return Cow::Borrowed(path);
        };
        match path.strip_prefix(prefix) {
            Some("") => Cow::Borrowed("/"),
            Some(rest) if rest.starts_with('/') => Cow::Borrowed(rest),
            _ => Cow::Borrowed(path),
        }
    }

    /// Build the upstream URL from the original origin, the rewritten path and the raw query.
    pub fn rewrite_uri(&self, uri: &Uri) -> Result<Uri, EdgeError> {
        if self.prefix.is_none() {
            return Ok(uri.clone());
        }

        let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) else {
            return Err(EdgeError::bad_request(format!(
                "request URL `{uri}` is not absolute"
            )));
        };

        let path = self.rewrite_path(uri.path());
        let target = match uri.query() {
            Some(query) if !query.is_empty() => format!("{scheme}://{authority}{path}?{query}"),
            _ => format!("{scheme}://{authority}{path}"),
        };

        target.parse::<Uri>().map_err(|err| {
            EdgeError::bad_request(format!("invalid rewritten URL `{target}`: {err}"))
        })
    }

    /// Derive the outbound request without submitting it.
    pub fn prepare(&self, request: Request) -> Result<ProxyRequest, EdgeError> {
        let original = request.uri().clone();
        let target = self.rewrite_uri(&original)?;
        let mut proxy_request = ProxyRequest::from_request(request, target);

        if self.debug_headers {
            let original_value = url_header(&original)?;
            let new_value = url_header(proxy_request.uri())?;
            let headers = proxy_request.headers_mut();
            headers.insert(ORIGINAL_URL_HEADER, original_value);
            headers.insert(NEW_URL_HEADER, new_value);
        }

        Ok(proxy_request)
    }

    /// Forward `request` through `upstream`, recovering any failure into the error envelope.
    pub async fn forward(&self, request: Request, upstream: Option<ProxyHandle>) -> Response {
        let method = request.method().clone();
        let original = request.uri().to_string();

        match self.try_forward(request, upstream).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(
                    "forward failed method={} url={} error={}",
                    method,
                    original,
                    err.cause()
                );
                error_envelope(&err)
            }
        }
    }

    /// Route handler entry point: forwards through the handle the adapter attached.
    pub async fn handle(&self, ctx: RequestContext) -> Response {
        let upstream = ctx.proxy_handle();
        self.forward(ctx.into_request(), upstream).await
    }

    async fn try_forward(
        &self,
        request: Request,
        upstream: Option<ProxyHandle>,
    ) -> Result<Response, EdgeError> {
        let proxy_request = self.prepare(request)?;
        let upstream =
            upstream.ok_or_else(|| EdgeError::upstream("no upstream service is bound"))?;

        tracing::debug!(
            "forwarding method={} url={}",
            proxy_request.method(),
            proxy_request.uri()
        );
        upstream.forward(proxy_request).await
    }
}

impl From<&ManifestForwarder> for Forwarder {
    fn from(config: &ManifestForwarder) -> Self {
        let forwarder = if config.strip_prefix {
            Forwarder::strip_prefix(&config.prefix)
        } else {
            Forwarder::passthrough()
        };
        forwarder.with_debug_headers(config.debug_headers)
    }
}

/// Build the 500 JSON envelope returned when forwarding fails.
pub fn error_envelope(err: &EdgeError) -> Response {
    let envelope = ErrorEnvelope {
        error: FAILURE_LABEL,
        message: err.cause(),
    };
    json_response(StatusCode::INTERNAL_SERVER_ERROR, &envelope).unwrap_or_else(|_| {
        response_with_body(StatusCode::INTERNAL_SERVER_ERROR, Body::text(FAILURE_LABEL))
    })
}

fn url_header(uri: &Uri) -> Result<HeaderValue, EdgeError> {
    HeaderValue::from_str(&uri.to_string()).map_err(EdgeError::internal)
}
