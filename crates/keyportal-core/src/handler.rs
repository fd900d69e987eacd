use std::future::Future;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::http::HandlerFuture;
use crate::response::IntoResponse;

/// Object-safe handler invoked by the router once a route matches.
pub trait DynHandler: Send + Sync {
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut, Res> DynHandler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, EdgeError>> + 'static,
    Res: IntoResponse,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        let fut = (self)(ctx);
        Box::pin(async move {
            let response = fut.await?.into_response();
            Ok(response)
        })
    }
}

pub type BoxHandler = Arc<dyn DynHandler>;

pub trait IntoHandler {
    fn into_handler(self) -> BoxHandler;
}

impl<H> IntoHandler for H
where
    H: DynHandler + Sized + 'static,
{
    fn into_handler(self) -> BoxHandler {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::http::{request_builder, Method, StatusCode};
    use crate::params::PathParams;
    use futures::executor::block_on;

    fn context() -> RequestContext {
        let request = request_builder()
            .method(Method::GET)
            .uri("/handler")
            .body(Body::empty())
            .expect("request");
        RequestContext::new(request, PathParams::default())
    }

    #[test]
    fn closure_handler_converts_output_into_response() {
        let handler = (|_ctx: RequestContext| async { Ok::<_, EdgeError>("done") }).into_handler();
        let response = block_on(handler.call(context())).expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_bytes(), b"done");
    }

    #[test]
    fn handler_errors_are_propagated() {
        let handler = (|_ctx: RequestContext| async {
            Err::<String, _>(EdgeError::bad_request("nope"))
        })
        .into_handler();
        let err = block_on(handler.call(context())).expect_err("error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
