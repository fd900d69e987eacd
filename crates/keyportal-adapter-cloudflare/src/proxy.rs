use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use futures_util::TryStreamExt;
use keyportal_core::body::Body;
use keyportal_core::error::EdgeError;
use keyportal_core::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use keyportal_core::proxy::{ProxyClient, ProxyRequest, ProxyResponse};
use worker::{
    wasm_bindgen::JsValue, Body as WorkerBody, Headers, Method as CfMethod, Request as CfRequest,
    RequestInit, Response as CfResponse,
};

use crate::context::CloudflareRequestContext;

/// Sends forwarded requests through a Worker service binding.
///
/// The binding is resolved per request from the [`CloudflareRequestContext`] travelling in the
/// request extensions, so the client itself only holds the binding name.
#[derive(Clone, Debug)]
pub struct ServiceBindingClient {
    binding: String,
}

impl ServiceBindingClient {
    pub fn new(binding: impl Into<String>) -> Self {
        Self {
            binding: binding.into(),
        }
    }

    pub fn binding(&self) -> &str {
        &self.binding
    }
}

#[async_trait(?Send)]
impl ProxyClient for ServiceBindingClient {
    async fn send(&self, request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
        let (method, uri, headers, body, extensions) = request.into_parts();
        let context = extensions
            .get::<CloudflareRequestContext>()
            .ok_or_else(|| EdgeError::upstream("worker environment is not available"))?;
        let fetcher = context.env().service(&self.binding).map_err(|err| {
            EdgeError::upstream(format!("service binding `{}`: {err}", self.binding))
        })?;

        log::debug!("service binding {} {} {}", self.binding, method, uri);
        let cf_request = build_cf_request(method, &uri, &headers, body)?;
        let mut cf_response = fetcher
            .fetch_request(cf_request)
            .await
            .map_err(|err| EdgeError::upstream(err.to_string()))?;

        convert_response(&mut cf_response)
    }
}

fn build_cf_request(
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Body,
) -> Result<CfRequest, EdgeError> {
    let mut init = RequestInit::new();
    init.with_method(http_method_to_cf(&method));
    init.with_headers(Headers::from(headers));
    attach_body(&mut init, body)?;

    CfRequest::new_with_init(&uri.to_string(), &init).map_err(EdgeError::internal)
}

fn attach_body(init: &mut RequestInit, body: Body) -> Result<(), EdgeError> {
    let chunks = match body {
        Body::Once(bytes) if bytes.is_empty() => return Ok(()),
        Body::Once(bytes) => {
            let chunk = bytes.to_vec();
            stream::once(async move { Ok::<Vec<u8>, JsValue>(chunk) }).boxed_local()
        }
        Body::Stream(stream) => stream
            .map(|res| match res {
                Ok(bytes) => Ok::<Vec<u8>, JsValue>(bytes.to_vec()),
                Err(err) => Err(JsValue::from_str(&err.to_string())),
            })
            .boxed_local(),
    };

    let worker_body = WorkerBody::from_stream(chunks).map_err(EdgeError::internal)?;
    if let Some(readable) = worker_body.into_inner() {
        init.with_body(Some(JsValue::from(readable)));
    }
    Ok(())
}

/// Status, headers and body pass through untouched; the body keeps streaming.
fn convert_response(cf_response: &mut CfResponse) -> Result<ProxyResponse, EdgeError> {
    let status = StatusCode::from_u16(cf_response.status_code()).map_err(EdgeError::internal)?;
    let mut proxy_response = ProxyResponse::new(status, Body::empty());

    for (name, value) in cf_response.headers().entries() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            proxy_response.headers_mut().append(name, value);
        }
    }

    let chunks = cf_response
        .stream()
        .map_err(EdgeError::internal)?
        .map_ok(Bytes::from)
        .map_err(worker_error_to_io);
    *proxy_response.body_mut() = Body::from_stream(chunks);

    Ok(proxy_response)
}

fn http_method_to_cf(method: &Method) -> CfMethod {
    match *method {
        Method::GET => CfMethod::Get,
        Method::POST => CfMethod::Post,
        Method::PUT => CfMethod::Put,
        Method::PATCH => CfMethod::Patch,
        Method::DELETE => CfMethod::Delete,
        Method::HEAD => CfMethod::Head,
        Method::OPTIONS => CfMethod::Options,
        Method::CONNECT => CfMethod::Connect,
        Method::TRACE => CfMethod::Trace,
        _ => CfMethod::from(method.as_str().to_string()),
    }
}

fn worker_error_to_io(err: worker::Error) -> io::Error {
    io::Error::other(err.to_string())
}
