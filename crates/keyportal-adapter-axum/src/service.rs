use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body as AxumBody;
use axum::http::{Request, Response};
use keyportal_core::proxy::ProxyHandle;
use keyportal_core::response::IntoResponse;
use keyportal_core::router::RouterService;
use tokio::{runtime::Handle, task};
use tower::Service;

use crate::request::into_core_request;
use crate::response::into_axum_response;

/// Tower service that runs a [`RouterService`] behind axum.
///
/// The configured [`ProxyHandle`] is cloned into every request's extensions, playing the part
/// of the service binding a Worker receives from its environment.
#[derive(Clone)]
pub struct KeyPortalAxumService {
    router: RouterService,
    proxy_handle: Option<ProxyHandle>,
}

impl KeyPortalAxumService {
    pub fn new(router: RouterService) -> Self {
        Self {
            router,
            proxy_handle: None,
        }
    }

    #[must_use]
    pub fn with_proxy_handle(mut self, handle: ProxyHandle) -> Self {
        self.proxy_handle = Some(handle);
        self
    }
}

impl Service<Request<AxumBody>> for KeyPortalAxumService {
    type Response = Response<AxumBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<AxumBody>) -> Self::Future {
        let router = self.router.clone();
        let proxy_handle = self.proxy_handle.clone();
        Box::pin(async move {
            let mut core_request = match into_core_request(request).await {
                Ok(request) => request,
                Err(err) => return Ok(into_axum_response(err.into_response())),
            };

            if let Some(handle) = proxy_handle {
                core_request.extensions_mut().insert(handle);
            }

            let core_response = task::block_in_place(move || {
                Handle::current().block_on(router.oneshot(core_request))
            });
            Ok(into_axum_response(core_response))
        })
    }
}
