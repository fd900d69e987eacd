use keyportal_core::context::RequestContext;
use keyportal_core::error::EdgeError;
use keyportal_core::manifest::{ManifestLoader, DEFAULT_PREFIX};
use keyportal_core::middleware::RequestLogger;
use keyportal_core::{Forwarder, Hooks, RouterService};

pub const MANIFEST: &str = include_str!("../../../keyportal.toml");

pub struct PortalApp;

impl Hooks for PortalApp {
    fn routes() -> RouterService {
        let (mount, forwarder) = forwarder_from_manifest(MANIFEST);
        build_router(&mount, forwarder)
    }

    fn name() -> &'static str {
        "KeyPortal"
    }
}

/// The `[forwarder]` mount point and forwarder. An unreadable manifest falls back to
/// stripping `/api`.
pub fn forwarder_from_manifest(src: &str) -> (String, Forwarder) {
    match ManifestLoader::load_from_str(src) {
        Ok(loader) => {
            let config = &loader.manifest().forwarder;
            let mount = config.mount().to_string();
            (mount, Forwarder::from(config))
        }
        Err(err) => {
            tracing::warn!("invalid manifest, using default forwarder: {}", err);
            (
                DEFAULT_PREFIX.to_string(),
                Forwarder::strip_prefix(DEFAULT_PREFIX),
            )
        }
    }
}

/// `GET /health` plus every forwarded method on `mount` and everything below it.
pub fn build_router(mount: &str, forwarder: Forwarder) -> RouterService {
    let nested = forwarder.clone();
    RouterService::builder()
        .middleware(RequestLogger)
        .get("/health", |_ctx: RequestContext| async {
            Ok::<_, EdgeError>("ok")
        })
        .any(mount, move |ctx: RequestContext| {
            let forwarder = forwarder.clone();
            async move { Ok::<_, EdgeError>(forwarder.handle(ctx).await) }
        })
        .any(&format!("{mount}/{{*rest}}"), move |ctx: RequestContext| {
            let forwarder = nested.clone();
            async move { Ok::<_, EdgeError>(forwarder.handle(ctx).await) }
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use keyportal_core::body::Body;
    use keyportal_core::http::{request_builder, Method, Request, StatusCode};
    use keyportal_core::proxy::{ProxyClient, ProxyHandle, ProxyRequest, ProxyResponse};
    use keyportal_core::Response;

    struct EchoUpstream;

    #[async_trait(?Send)]
    impl ProxyClient for EchoUpstream {
        async fn send(&self, request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
            let original = request
                .headers()
                .get("x-original-url")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let body = format!("{} {} {}", request.method(), request.uri(), original);
            Ok(ProxyResponse::new(StatusCode::OK, Body::from(body)))
        }
    }

    fn request(method: Method, uri: &str, bound: bool) -> Request {
        let mut request = request_builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        if bound {
            request
                .extensions_mut()
                .insert(ProxyHandle::with_client(EchoUpstream));
        }
        request
    }

    fn text(response: Response) -> String {
        String::from_utf8(response.into_body().into_bytes().to_vec()).expect("utf8")
    }

    #[test]
    fn embedded_manifest_strips_api() {
        let (mount, forwarder) = forwarder_from_manifest(MANIFEST);
        assert_eq!(mount, "/api");
        assert_eq!(forwarder.prefix(), Some("/api"));
        assert!(forwarder.debug_headers());
    }

    #[test]
    fn invalid_manifest_falls_back_to_default() {
        let (mount, forwarder) = forwarder_from_manifest("[forwarder]\nprefix = \"\"\n");
        assert_eq!(mount, DEFAULT_PREFIX);
        assert_eq!(forwarder.prefix(), Some(DEFAULT_PREFIX));
    }

    #[test]
    fn relative_prefix_falls_back_to_default() {
        let (mount, forwarder) = forwarder_from_manifest("[forwarder]\nprefix = \"api\"\n");
        assert_eq!(mount, DEFAULT_PREFIX);
        assert_eq!(forwarder.prefix(), Some(mount.as_str()));

        let router = build_router(&mount, forwarder);
        let response = block_on(router.oneshot(request(
            Method::GET,
            "https://portal.example/api/keys",
            true,
        )));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn mount_and_forwarder_prefix_agree() {
        let (mount, forwarder) = forwarder_from_manifest("[forwarder]\nprefix = \"/v1/\"\n");
        assert_eq!(mount, "/v1");
        assert_eq!(forwarder.prefix(), Some("/v1"));
    }

    #[test]
    fn passthrough_manifest_keeps_paths() {
        let (mount, forwarder) =
            forwarder_from_manifest("[forwarder]\nstrip_prefix = false\ndebug_headers = false\n");
        let router = build_router(&mount, forwarder);
        let response = block_on(router.oneshot(request(
            Method::GET,
            "https://portal.example/api/stats",
            true,
        )));
        assert_eq!(text(response), "GET https://portal.example/api/stats -");
    }

    #[test]
    fn health_is_served_locally() {
        let app = PortalApp::build_app();
        let response = block_on(app.router().oneshot(request(Method::GET, "/health", false)));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response), "ok");
    }

    #[test]
    fn api_requests_are_rewritten() {
        let app = PortalApp::build_app();
        let response = block_on(app.router().oneshot(request(
            Method::DELETE,
            "https://portal.example/api/keys/42?force=true",
            true,
        )));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            text(response),
            "DELETE https://portal.example/keys/42?force=true https://portal.example/api/keys/42?force=true"
        );
    }

    #[test]
    fn bare_mount_forwards_to_root() {
        let app = PortalApp::build_app();
        let response = block_on(app.router().oneshot(request(
            Method::POST,
            "https://portal.example/api",
            true,
        )));
        assert_eq!(
            text(response),
            "POST https://portal.example/ https://portal.example/api"
        );
    }

    #[test]
    fn missing_binding_yields_envelope() {
        let app = PortalApp::build_app();
        let response = block_on(app.router().oneshot(request(
            Method::GET,
            "https://portal.example/api/keys",
            false,
        )));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payload: serde_json::Value =
            serde_json::from_slice(&response.into_body().into_bytes()).expect("json");
        assert_eq!(payload["error"], "request processing failed");
        assert!(payload["message"].is_string());
    }

    #[test]
    fn other_paths_are_not_forwarded() {
        let app = PortalApp::build_app();
        let response = block_on(app.router().oneshot(request(
            Method::GET,
            "https://portal.example/apikeys",
            true,
        )));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn routes_cover_health_and_api() {
        let routes = PortalApp::build_app().router().routes();
        assert!(routes
            .iter()
            .any(|r| *r.method() == Method::GET && r.path() == "/health"));
        assert!(routes
            .iter()
            .any(|r| *r.method() == Method::PATCH && r.path() == "/api/{*rest}"));
    }
}
