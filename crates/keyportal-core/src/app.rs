use crate::router::RouterService;

const DEFAULT_APP_NAME: &str = "KeyPortal";

/// Named router service handed to a hosting adapter.
pub struct App {
    router: RouterService,
    name: String,
}

impl App {
    pub fn new(router: RouterService) -> Self {
        Self::with_name(router, DEFAULT_APP_NAME)
    }

    pub fn with_name<S>(router: RouterService, name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            router,
            name: name.into(),
        }
    }

    pub fn router(&self) -> &RouterService {
        &self.router
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S>(&mut self, name: S)
    where
        S: Into<String>,
    {
        self.name = name.into();
    }

    pub fn into_router(self) -> RouterService {
        self.router
    }

    pub fn default_name() -> &'static str {
        DEFAULT_APP_NAME
    }
}

/// Implemented once per application; adapters call [`Hooks::build_app`] at startup.
pub trait Hooks {
    /// Adjust the application after the router is built. No-op by default.
    fn configure(_app: &mut App) {}

    fn routes() -> RouterService;

    fn name() -> &'static str {
        App::default_name()
    }

    fn build_app() -> App
    where
        Self: Sized,
    {
        let mut app = App::with_name(Self::routes(), Self::name());
        Self::configure(&mut app);
        app
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::context::RequestContext;
    use crate::error::EdgeError;
    use crate::http::{request_builder, Method, StatusCode};
    use futures::executor::block_on;

    struct GatewayHooks;

    impl Hooks for GatewayHooks {
        fn routes() -> RouterService {
            async fn health(_ctx: RequestContext) -> Result<&'static str, EdgeError> {
                Ok("ok")
            }

            RouterService::builder().get("/health", health).build()
        }

        fn configure(app: &mut App) {
            app.set_name("gateway-configured");
        }

        fn name() -> &'static str {
            "gateway"
        }
    }

    #[test]
    fn build_app_invokes_routes_and_configure() {
        let app = GatewayHooks::build_app();
        assert_eq!(app.name(), "gateway-configured");

        let request = request_builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .expect("request");
        let response = block_on(app.router().oneshot(request));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"ok");
    }

    struct BareHooks;

    impl Hooks for BareHooks {
        fn routes() -> RouterService {
            RouterService::builder().build()
        }
    }

    #[test]
    fn default_hooks_use_default_name() {
        let app = BareHooks::build_app();
        assert_eq!(app.name(), "KeyPortal");
        assert!(app.into_router().routes().is_empty());
    }

    #[test]
    fn new_app_can_be_renamed() {
        let mut app = App::new(RouterService::builder().build());
        assert_eq!(app.name(), App::default_name());
        app.set_name("renamed");
        assert_eq!(app.name(), "renamed");
    }
}
