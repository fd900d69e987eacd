use std::sync::Arc;

use async_trait::async_trait;
use web_time::Instant;

use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::handler::DynHandler;
use crate::http::Response;

pub type BoxMiddleware = Arc<dyn Middleware>;

#[async_trait(?Send)]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: RequestContext, next: Next<'_>) -> Result<Response, EdgeError>;
}

/// Remaining middleware chain plus the matched handler.
pub struct Next<'a> {
    middlewares: &'a [BoxMiddleware],
    handler: &'a dyn DynHandler,
}

impl<'a> Next<'a> {
    pub fn new(middlewares: &'a [BoxMiddleware], handler: &'a dyn DynHandler) -> Self {
        Self {
            middlewares,
            handler,
        }
    }

    pub async fn run(self, ctx: RequestContext) -> Result<Response, EdgeError> {
        match self.middlewares.split_first() {
            Some((head, tail)) => head.handle(ctx, Next::new(tail, self.handler)).await,
            None => self.handler.call(ctx).await,
        }
    }
}

/// One log line per request: method, path, status and elapsed time.
///
/// Upstream failures surfaced by the forwarder arrive here as ordinary 5xx responses and are
/// logged at `warn`; router errors (404, 405) are logged at `error` and propagated.
pub struct RequestLogger;

#[async_trait(?Send)]
impl Middleware for RequestLogger {
    async fn handle(&self, ctx: RequestContext, next: Next<'_>) -> Result<Response, EdgeError> {
        let method = ctx.request().method().clone();
        let path = ctx.request().uri().path().to_string();
        let start = Instant::now();

        let result = next.run(ctx).await;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(response) if response.status().is_server_error() => tracing::warn!(
                "request method={} path={} status={} elapsed_ms={:.2}",
                method,
                path,
                response.status().as_u16(),
                elapsed
            ),
            Ok(response) => tracing::info!(
                "request method={} path={} status={} elapsed_ms={:.2}",
                method,
                path,
                response.status().as_u16(),
                elapsed
            ),
            Err(err) => tracing::error!(
                "request method={} path={} status={} error={} elapsed_ms={:.2}",
                method,
                path,
                err.status().as_u16(),
                err.message(),
                elapsed
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::handler::IntoHandler;
    use crate::http::{request_builder, Method, StatusCode};
    use crate::params::PathParams;
    use crate::response::response_with_body;
    use futures::executor::block_on;
    use std::sync::Mutex;

    struct Tagging {
        log: Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    }

    #[async_trait(?Send)]
    impl Middleware for Tagging {
        async fn handle(&self, ctx: RequestContext, next: Next<'_>) -> Result<Response, EdgeError> {
            self.log.lock().unwrap().push(self.tag);
            next.run(ctx).await
        }
    }

    struct RequireAuthorization;

    #[async_trait(?Send)]
    impl Middleware for RequireAuthorization {
        async fn handle(&self, ctx: RequestContext, next: Next<'_>) -> Result<Response, EdgeError> {
            if ctx.request().headers().contains_key("authorization") {
                next.run(ctx).await
            } else {
                Ok(response_with_body(StatusCode::UNAUTHORIZED, Body::empty()))
            }
        }
    }

    fn context(path: &str) -> RequestContext {
        let request = request_builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .expect("request");
        RequestContext::new(request, PathParams::default())
    }

    async fn ok_handler(_ctx: RequestContext) -> Result<Response, EdgeError> {
        Ok(response_with_body(StatusCode::OK, Body::empty()))
    }

    #[test]
    fn chain_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middlewares: Vec<BoxMiddleware> = vec![
            Arc::new(Tagging {
                log: Arc::clone(&log),
                tag: "outer",
            }),
            Arc::new(Tagging {
                log: Arc::clone(&log),
                tag: "inner",
            }),
        ];
        let handler = ok_handler.into_handler();

        let response = block_on(Next::new(&middlewares, handler.as_ref()).run(context("/api")))
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[test]
    fn middleware_can_short_circuit() {
        let handler = ok_handler.into_handler();
        let middlewares: Vec<BoxMiddleware> = vec![Arc::new(RequireAuthorization)];
        let response = block_on(Next::new(&middlewares, handler.as_ref()).run(context("/api")))
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn request_logger_passes_responses_through() {
        let handler = (|_ctx: RequestContext| async move {
            Ok::<Response, EdgeError>(response_with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                Body::from("{}"),
            ))
        })
        .into_handler();
        let response =
            block_on(RequestLogger.handle(context("/api/keys"), Next::new(&[], handler.as_ref())))
                .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body().as_bytes(), b"{}");
    }

    #[test]
    fn request_logger_propagates_errors() {
        let handler = (|_ctx: RequestContext| async move {
            Err::<Response, EdgeError>(EdgeError::bad_request("boom"))
        })
        .into_handler();
        let err = block_on(RequestLogger.handle(context("/health"), Next::new(&[], handler.as_ref())))
            .expect_err("error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
