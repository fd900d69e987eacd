use crate::body::Body;
use crate::error::EdgeError;
use crate::http::Request;
use crate::params::PathParams;
use crate::proxy::ProxyHandle;
use serde::de::DeserializeOwned;

/// What a matched route sees: the request plus captured path segments.
///
/// Hosting adapters attach the bound upstream to the request extensions before dispatch.
pub struct RequestContext {
    request: Request,
    path_params: PathParams,
}

impl RequestContext {
    pub fn new(request: Request, path_params: PathParams) -> Self {
        Self {
            request,
            path_params,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Give the request back, e.g. to hand it to the forwarder.
    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Captured segments as `T`; a mismatch is a 400.
    pub fn path<T: DeserializeOwned>(&self) -> Result<T, EdgeError> {
        self.path_params
            .deserialize()
            .map_err(|err| EdgeError::bad_request(format!("invalid path parameters: {err}")))
    }

    pub fn body(&self) -> &Body {
        self.request.body()
    }

    /// Handle to the bound upstream service, when the adapter provided one.
    pub fn proxy_handle(&self) -> Option<ProxyHandle> {
        self.request.extensions().get::<ProxyHandle>().cloned()
    }
}
