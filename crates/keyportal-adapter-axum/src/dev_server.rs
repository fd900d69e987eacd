use std::net::{SocketAddr, TcpListener as StdTcpListener};

use anyhow::Context;
use axum::http::Uri;
use axum::Router;
use tokio::runtime::Builder as RuntimeBuilder;
use tokio::signal;
use tower::{service_fn, Service};

use keyportal_core::app::Hooks;
use keyportal_core::manifest::{Manifest, ManifestLoader, ResolvedLoggingConfig};
use keyportal_core::proxy::ProxyHandle;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use crate::proxy::AxumProxyClient;
use crate::service::KeyPortalAxumService;

const LOGGING_ADAPTER: &str = "axum";

/// Listener settings for [`AxumDevServer`].
#[derive(Clone)]
pub struct AxumDevServerConfig {
    pub addr: SocketAddr,
    pub enable_ctrl_c: bool,
}

impl Default for AxumDevServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            enable_ctrl_c: true,
        }
    }
}

/// Blocking local server for the portal edge app.
pub struct AxumDevServer {
    service: KeyPortalAxumService,
    config: AxumDevServerConfig,
}

impl AxumDevServer {
    pub fn new(service: KeyPortalAxumService) -> Self {
        Self {
            service,
            config: AxumDevServerConfig::default(),
        }
    }

    pub fn with_config(service: KeyPortalAxumService, config: AxumDevServerConfig) -> Self {
        Self { service, config }
    }

    pub fn run(self) -> anyhow::Result<()> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        runtime.block_on(async move { self.run_async().await })
    }

    async fn run_async(self) -> anyhow::Result<()> {
        let AxumDevServer { service, config } = self;

        let listener = StdTcpListener::bind(config.addr)
            .with_context(|| format!("failed to bind dev server to {}", config.addr))?;
        listener
            .set_nonblocking(true)
            .context("failed to set listener to non-blocking")?;

        let listener = tokio::net::TcpListener::from_std(listener)
            .context("failed to adopt std listener into tokio")?;

        log::info!("listening on http://{}", config.addr);
        serve_with_listener(service, listener, config.enable_ctrl_c).await
    }

    #[cfg(test)]
    async fn run_with_listener(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        let AxumDevServer { service, config } = self;
        serve_with_listener(service, listener, config.enable_ctrl_c).await
    }
}

async fn serve_with_listener(
    service: KeyPortalAxumService,
    listener: tokio::net::TcpListener,
    enable_ctrl_c: bool,
) -> anyhow::Result<()> {
    let router = Router::new().fallback_service(service_fn(move |req| {
        let mut svc = service.clone();
        async move { svc.call(req).await }
    }));
    let server = axum::serve(listener, router);
    if enable_ctrl_c {
        server
            .with_graceful_shutdown(async {
                let _ = signal::ctrl_c().await;
            })
            .await
            .context("axum server error")?;
    } else {
        server.await.context("axum server error")?;
    }

    Ok(())
}

/// Install the process logger from a `[logging.axum]` table. Safe to call more than once.
pub fn init_logger(logging: &ResolvedLoggingConfig) {
    let level = if logging.echo_stdout {
        LevelFilter::from(logging.level)
    } else {
        LevelFilter::Off
    };
    SimpleLogger::new().with_level(level).init().ok();
}

/// Build the upstream transport described by `[forwarder]`.
pub fn proxy_handle_for(manifest: &Manifest) -> anyhow::Result<ProxyHandle> {
    let mut client = AxumProxyClient::new().context("failed to build upstream client")?;
    if let Some(upstream) = &manifest.forwarder.upstream {
        let origin: Uri = upstream
            .parse()
            .with_context(|| format!("invalid forwarder upstream `{upstream}`"))?;
        client = client.bound_to(origin);
    }
    Ok(ProxyHandle::with_client(client))
}

/// Load the manifest, configure logging and the upstream binding, then serve `A` until ctrl-c.
pub fn run_app<A: Hooks>(manifest_src: &str) -> anyhow::Result<()> {
    let loader = ManifestLoader::load_from_str(manifest_src).context("invalid manifest")?;
    let manifest = loader.manifest();
    init_logger(&manifest.logging_or_default(LOGGING_ADAPTER));

    let app = A::build_app();
    for route in app.router().routes() {
        log::debug!("route {} {}", route.method(), route.path());
    }
    match &manifest.forwarder.upstream {
        Some(upstream) => log::info!("{}: forwarding to {}", app.name(), upstream),
        None => log::info!("{}: forwarding to request URLs as-is", app.name()),
    }

    let service =
        KeyPortalAxumService::new(app.into_router()).with_proxy_handle(proxy_handle_for(manifest)?);
    AxumDevServer::new(service).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyportal_core::router::RouterService;
    use std::net::{IpAddr, Ipv4Addr};

    fn service() -> KeyPortalAxumService {
        KeyPortalAxumService::new(RouterService::builder().build())
    }

    #[test]
    fn default_config_uses_expected_address() {
        let config = AxumDevServerConfig::default();
        assert_eq!(config.addr.ip(), IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(config.addr.port(), 8787);
        assert!(config.enable_ctrl_c);
    }

    #[test]
    fn dev_server_with_config_uses_custom_config() {
        let config = AxumDevServerConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], 9000)),
            enable_ctrl_c: false,
        };
        let server = AxumDevServer::with_config(service(), config);
        assert_eq!(server.config.addr.port(), 9000);
        assert!(!server.config.enable_ctrl_c);
    }

    #[test]
    fn proxy_handle_rejects_bad_upstream() {
        let loader = ManifestLoader::load_from_str(
            r#"
[forwarder]
upstream = "http://bad host"
"#,
        )
        .expect("manifest");
        let err = proxy_handle_for(loader.manifest()).expect_err("error");
        assert!(err.to_string().contains("invalid forwarder upstream"));
    }

    #[test]
    fn run_app_rejects_invalid_manifest() {
        struct NoRoutes;
        impl Hooks for NoRoutes {
            fn routes() -> RouterService {
                RouterService::builder().build()
            }
        }

        let err = run_app::<NoRoutes>("[forwarder]\nprefix = \"\"\n").expect_err("error");
        assert!(err.to_string().contains("invalid manifest"));
    }
}
