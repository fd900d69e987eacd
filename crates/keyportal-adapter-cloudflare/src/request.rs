use keyportal_core::app::App;
use keyportal_core::body::Body;
use keyportal_core::error::EdgeError;
use keyportal_core::http::{request_builder, Method as CoreMethod, Request, Uri};
use keyportal_core::manifest::DEFAULT_BINDING;
use keyportal_core::proxy::ProxyHandle;
use keyportal_core::response::IntoResponse;
use worker::{
    Context, Env, Error as WorkerError, Method, Request as CfRequest, Response as CfResponse,
};

use crate::context::CloudflareRequestContext;
use crate::proxy::ServiceBindingClient;
use crate::response::from_core_response;

pub async fn into_core_request(
    mut req: CfRequest,
    env: Env,
    ctx: Context,
) -> Result<Request, EdgeError> {
    let method = into_core_method(req.method());
    let url = req
        .url()
        .map_err(|err| EdgeError::bad_request(format!("invalid URL: {}", err)))?;
    let uri: Uri = url
        .as_str()
        .parse()
        .map_err(|err| EdgeError::bad_request(format!("invalid URI: {}", err)))?;

    let mut builder = request_builder().method(method).uri(uri);
    for (name, value) in req.headers().entries() {
        builder = builder.header(name.as_str(), value);
    }

    let bytes = req.bytes().await.map_err(EdgeError::internal)?;
    let mut request = builder
        .body(Body::from(bytes))
        .map_err(EdgeError::internal)?;

    CloudflareRequestContext::insert(&mut request, env, ctx);
    Ok(request)
}

/// Dispatch with the upstream reached through the default `API` service binding.
pub async fn dispatch(
    app: &App,
    req: CfRequest,
    env: Env,
    ctx: Context,
) -> Result<CfResponse, WorkerError> {
    dispatch_with_binding(app, req, env, ctx, DEFAULT_BINDING).await
}

pub async fn dispatch_with_binding(
    app: &App,
    req: CfRequest,
    env: Env,
    ctx: Context,
    binding: &str,
) -> Result<CfResponse, WorkerError> {
    let response = match into_core_request(req, env, ctx).await {
        Ok(mut core_request) => {
            core_request
                .extensions_mut()
                .insert(ProxyHandle::with_client(ServiceBindingClient::new(binding)));
            app.router().oneshot(core_request).await
        }
        Err(err) => err.into_response(),
    };
    from_core_response(response).map_err(edge_error_to_worker)
}

fn edge_error_to_worker(err: EdgeError) -> WorkerError {
    WorkerError::RustError(err.to_string())
}

fn into_core_method(method: Method) -> CoreMethod {
    CoreMethod::from_bytes(method.as_ref().as_bytes()).unwrap_or(CoreMethod::GET)
}
