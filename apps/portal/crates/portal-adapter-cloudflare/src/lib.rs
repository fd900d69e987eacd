#![cfg_attr(target_arch = "wasm32", no_main)]

#[cfg(target_arch = "wasm32")]
use portal_core::{PortalApp, MANIFEST};
#[cfg(target_arch = "wasm32")]
use worker::*;

#[cfg(target_arch = "wasm32")]
#[event(fetch)]
pub async fn main(req: Request, env: Env, ctx: Context) -> Result<Response> {
    keyportal_adapter_cloudflare::run_app::<PortalApp>(MANIFEST, req, env, ctx).await
}
