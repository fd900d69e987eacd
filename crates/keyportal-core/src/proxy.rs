use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::body::Body;
use crate::error::EdgeError;
use crate::http::{Extensions, HeaderMap, Method, Request, Response, StatusCode, Uri};

/// Outbound request handed to a bound upstream service.
pub struct ProxyRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
    extensions: Extensions,
}

impl ProxyRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Body::empty(),
            extensions: Extensions::new(),
        }
    }

    /// Reuse method, headers, body and extensions of `request`, targeting `uri`.
    pub fn from_request(request: Request, uri: Uri) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri,
            headers: parts.headers,
            body,
            extensions: parts.extensions,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn set_uri(&mut self, uri: Uri) {
        self.uri = uri;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn into_parts(self) -> (Method, Uri, HeaderMap, Body, Extensions) {
        (
            self.method,
            self.uri,
            self.headers,
            self.body,
            self.extensions,
        )
    }
}

impl fmt::Debug for ProxyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Response produced by the upstream, passed back to the caller untouched.
pub struct ProxyResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, body: Body) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl fmt::Debug for ProxyResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyResponse")
            .field("status", &self.status)
            .finish()
    }
}

/// Transport to a bound upstream service.
///
/// Cloudflare implements this over a service binding, the native adapter over reqwest.
#[async_trait(?Send)]
pub trait ProxyClient: Send + Sync {
    async fn send(&self, request: ProxyRequest) -> Result<ProxyResponse, EdgeError>;
}

/// Cloneable handle to a [`ProxyClient`], stored in request extensions by adapters.
#[derive(Clone)]
pub struct ProxyHandle {
    client: Arc<dyn ProxyClient>,
}

impl ProxyHandle {
    pub fn new(client: Arc<dyn ProxyClient>) -> Self {
        Self { client }
    }

    pub fn with_client<C>(client: C) -> Self
    where
        C: ProxyClient + 'static,
    {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> Arc<dyn ProxyClient> {
        Arc::clone(&self.client)
    }

    pub async fn forward(&self, request: ProxyRequest) -> Result<Response, EdgeError> {
        let response = self.client.send(request).await?;
        Ok(response.into_response())
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{request_builder, HeaderValue};
    use bytes::Bytes;
    use futures::executor::block_on;
    use futures_util::stream;

    struct EchoClient;

    #[async_trait(?Send)]
    impl ProxyClient for EchoClient {
        async fn send(&self, request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
            let (method, uri, headers, body, _) = request.into_parts();
            let mut response = ProxyResponse::new(StatusCode::OK, body);
            response.headers_mut().insert(
                "x-echo-method",
                HeaderValue::from_str(method.as_str()).map_err(EdgeError::internal)?,
            );
            response.headers_mut().insert(
                "x-echo-uri",
                HeaderValue::from_str(&uri.to_string()).map_err(EdgeError::internal)?,
            );
            if let Some(auth) = headers.get("authorization") {
                response
                    .headers_mut()
                    .insert("x-echo-authorization", auth.clone());
            }
            Ok(response)
        }
    }

    struct FailingClient;

    #[async_trait(?Send)]
    impl ProxyClient for FailingClient {
        async fn send(&self, _request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
            Err(EdgeError::upstream("connection refused"))
        }
    }

    #[test]
    fn from_request_keeps_method_headers_and_body() {
        let request = request_builder()
            .method(Method::POST)
            .uri("https://portal.example.com/api/keys")
            .header("authorization", "Bearer abc")
            .body(Body::from(r#"{"name":"ci"}"#))
            .expect("request");

        let target = Uri::from_static("https://portal.example.com/keys");
        let proxy_request = ProxyRequest::from_request(request, target.clone());
        assert_eq!(proxy_request.method(), &Method::POST);
        assert_eq!(proxy_request.uri(), &target);
        assert_eq!(
            proxy_request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
        assert_eq!(proxy_request.body().as_bytes(), br#"{"name":"ci"}"#);
    }

    #[test]
    fn set_uri_retargets_request() {
        let mut request = ProxyRequest::new(Method::GET, Uri::from_static("https://a.test/x"));
        request.set_uri(Uri::from_static("https://b.test/y"));
        assert_eq!(request.uri(), &Uri::from_static("https://b.test/y"));
    }

    #[test]
    fn handle_forwards_and_converts_response() {
        let handle = ProxyHandle::with_client(EchoClient);
        let mut request = ProxyRequest::new(Method::PATCH, Uri::from_static("https://a.test/keys/1"));
        request
            .headers_mut()
            .insert("authorization", HeaderValue::from_static("Bearer t"));
        *request.body_mut() = Body::from("{}");

        let response = block_on(handle.forward(request)).expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-echo-method"], "PATCH");
        assert_eq!(response.headers()["x-echo-uri"], "https://a.test/keys/1");
        assert_eq!(response.headers()["x-echo-authorization"], "Bearer t");
        assert_eq!(response.body().as_bytes(), b"{}");
    }

    #[test]
    fn streaming_bodies_pass_through_unbuffered() {
        let handle = ProxyHandle::with_client(EchoClient);
        let mut request = ProxyRequest::new(Method::POST, Uri::from_static("https://a.test/u"));
        *request.body_mut() = Body::stream(stream::iter(vec![
            Bytes::from_static(b"one"),
            Bytes::from_static(b"two"),
        ]));

        let response = block_on(handle.forward(request)).expect("response");
        assert!(response.body().is_stream());
        let bytes = block_on(response.into_body().collect()).expect("collect");
        assert_eq!(bytes.as_ref(), b"onetwo");
    }

    #[test]
    fn upstream_error_statuses_are_not_treated_as_failures() {
        struct NotFoundClient;

        #[async_trait(?Send)]
        impl ProxyClient for NotFoundClient {
            async fn send(&self, _request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
                let mut response =
                    ProxyResponse::new(StatusCode::NOT_FOUND, Body::from(r#"{"error":"gone"}"#));
                response
                    .headers_mut()
                    .insert("content-type", HeaderValue::from_static("application/json"));
                Ok(response)
            }
        }

        let handle = ProxyHandle::with_client(NotFoundClient);
        let request = ProxyRequest::new(Method::GET, Uri::from_static("https://a.test/missing"));
        let response = block_on(handle.forward(request)).expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.body().as_bytes(), br#"{"error":"gone"}"#);
    }

    #[test]
    fn handle_propagates_client_errors() {
        let handle = ProxyHandle::with_client(FailingClient);
        let request = ProxyRequest::new(Method::GET, Uri::from_static("https://a.test"));
        let err = block_on(handle.forward(request)).expect_err("error");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.cause(), "connection refused");
    }

    #[test]
    fn debug_output_names_request_parts() {
        let request = ProxyRequest::new(Method::DELETE, Uri::from_static("https://a.test/keys/9"));
        let debug = format!("{:?}", request);
        assert!(debug.contains("DELETE"));
        assert!(debug.contains("a.test"));
        assert!(format!("{:?}", ProxyResponse::new(StatusCode::IM_A_TEAPOT, Body::empty()))
            .contains("418"));
    }
}
