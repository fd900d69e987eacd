//! Cloudflare Workers adapter: request/response conversion and the upstream service binding.

#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod context;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod proxy;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod request;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod response;

#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use context::CloudflareRequestContext;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use proxy::ServiceBindingClient;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use request::{dispatch, dispatch_with_binding, into_core_request};
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use response::from_core_response;

/// Workers forward `console` output themselves; nothing to install.
pub fn init_logger() -> Result<(), log::SetLoggerError> {
    Ok(())
}

/// Serve one Worker request with `A`, reaching the upstream through `[forwarder] binding`.
///
/// ```rust,ignore
/// run_app::<PortalApp>(include_str!("../../../keyportal.toml"), req, env, ctx).await
/// ```
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub async fn run_app<A: keyportal_core::app::Hooks>(
    manifest_src: &str,
    req: worker::Request,
    env: worker::Env,
    ctx: worker::Context,
) -> Result<worker::Response, worker::Error> {
    init_logger().map_err(|err| worker::Error::RustError(err.to_string()))?;
    let loader = keyportal_core::manifest::ManifestLoader::load_from_str(manifest_src)
        .map_err(|err| worker::Error::RustError(format!("invalid manifest: {err}")))?;
    let app = A::build_app();
    dispatch_with_binding(&app, req, env, ctx, &loader.manifest().forwarder.binding).await
}
