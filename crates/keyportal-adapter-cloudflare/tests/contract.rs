#![cfg(all(feature = "cloudflare", target_arch = "wasm32"))]

use bytes::Bytes;
use futures::stream;
use keyportal_adapter_cloudflare::{
    dispatch, from_core_response, into_core_request, CloudflareRequestContext,
};
use keyportal_core::forward::Forwarder;
use keyportal_core::{
    response_builder, App, Body, EdgeError, Method, RequestContext, RouterService, StatusCode,
};
use wasm_bindgen_test::*;
use worker::js_sys::Uint8Array;
use worker::wasm_bindgen::JsValue;
use worker::{
    Context, Env, Method as CfMethod, Request as CfRequest, RequestInit, Response as CfResponse,
};

wasm_bindgen_test_configure!(run_in_browser);

fn build_test_app() -> App {
    async fn capture_uri(ctx: RequestContext) -> Result<keyportal_core::Response, EdgeError> {
        let response = response_builder()
            .status(StatusCode::OK)
            .body(Body::text(ctx.request().uri().to_string()))
            .expect("response");
        Ok(response)
    }

    async fn mirror_body(ctx: RequestContext) -> Result<keyportal_core::Response, EdgeError> {
        let bytes = ctx.request().body().as_bytes().to_vec();
        let response = response_builder()
            .status(StatusCode::OK)
            .body(Body::from(bytes))
            .expect("response");
        Ok(response)
    }

    async fn forward(ctx: RequestContext) -> Result<keyportal_core::Response, EdgeError> {
        Ok(Forwarder::strip_prefix("/api").handle(ctx).await)
    }

    let router = RouterService::builder()
        .get("/uri", capture_uri)
        .post("/mirror", mirror_body)
        .any("/api/{*rest}", forward)
        .build();

    App::new(router)
}

fn cf_request(method: CfMethod, path: &str, body: Option<&[u8]>) -> CfRequest {
    let mut init = RequestInit::new();
    init.with_method(method);

    let headers = worker::Headers::new();
    headers.set("host", "portal.example.com").expect("host header");
    headers.set("x-keyportal-test", "1").expect("custom header");
    init.with_headers(headers);

    if let Some(bytes) = body {
        init.with_body(Some(JsValue::from(Uint8Array::from(bytes))));
    }

    let url = format!("https://portal.example.com{}", path);
    CfRequest::new_with_init(&url, &init).expect("cf request")
}

fn test_env_ctx() -> (Env, Context) {
    (Env::default(), Context::default())
}

#[wasm_bindgen_test]
async fn into_core_request_preserves_method_uri_headers_body_and_context() {
    let req = cf_request(CfMethod::Post, "/api/keys?limit=10", Some(b"{\"name\":\"ci\"}"));
    let (env, ctx) = test_env_ctx();

    let core_request = into_core_request(req, env, ctx)
        .await
        .expect("core request");

    assert_eq!(core_request.method(), &Method::POST);
    assert_eq!(core_request.uri().path(), "/api/keys");
    assert_eq!(core_request.uri().query(), Some("limit=10"));
    let header = core_request
        .headers()
        .get("x-keyportal-test")
        .and_then(|value| value.to_str().ok());
    assert_eq!(header, Some("1"));
    assert_eq!(core_request.body().as_bytes(), b"{\"name\":\"ci\"}");
    assert!(CloudflareRequestContext::get(&core_request).is_some());
}

#[wasm_bindgen_test]
async fn from_core_response_translates_status_headers_and_streaming_body() {
    let response = response_builder()
        .status(StatusCode::CREATED)
        .header("x-keyportal-res", "1")
        .body(Body::stream(stream::iter(vec![
            Bytes::from_static(b"hello"),
            Bytes::from_static(b" "),
            Bytes::from_static(b"world"),
        ])))
        .expect("response");

    let mut cf_response: CfResponse = from_core_response(response).expect("cf response");

    assert_eq!(cf_response.status_code(), StatusCode::CREATED.as_u16());
    let header = cf_response.headers().get("x-keyportal-res").unwrap();
    assert_eq!(header.as_deref(), Some("1"));
    let bytes = cf_response.bytes().await.expect("bytes");
    assert_eq!(bytes.as_slice(), b"hello world");
}

#[wasm_bindgen_test]
async fn dispatch_runs_router_and_returns_response() {
    let app = build_test_app();
    let req = cf_request(CfMethod::Get, "/uri", None);
    let (env, ctx) = test_env_ctx();

    let mut response = dispatch(&app, req, env, ctx).await.expect("cf response");

    assert_eq!(response.status_code(), StatusCode::OK.as_u16());
    assert_eq!(
        response.text().await.expect("text"),
        "https://portal.example.com/uri"
    );
}

#[wasm_bindgen_test]
async fn dispatch_passes_request_body_to_handlers() {
    let app = build_test_app();
    let req = cf_request(CfMethod::Post, "/mirror", Some(b"echo"));
    let (env, ctx) = test_env_ctx();

    let mut response = dispatch(&app, req, env, ctx).await.expect("cf response");

    let bytes = response.bytes().await.expect("bytes");
    assert_eq!(bytes.as_slice(), b"echo");
}

#[wasm_bindgen_test]
async fn missing_service_binding_yields_error_envelope() {
    let app = build_test_app();
    let req = cf_request(CfMethod::Get, "/api/keys", None);
    let (env, ctx) = test_env_ctx();

    let mut response = dispatch(&app, req, env, ctx).await.expect("cf response");

    assert_eq!(
        response.status_code(),
        StatusCode::INTERNAL_SERVER_ERROR.as_u16()
    );
    let payload: serde_json::Value =
        serde_json::from_str(&response.text().await.expect("text")).expect("json");
    assert_eq!(payload["error"], "request processing failed");
}
