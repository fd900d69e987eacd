//! KeyPortal edge app: serves `/health` and forwards `/api` traffic to the bound backend.

mod app;

pub use app::{build_router, forwarder_from_manifest, PortalApp, MANIFEST};
