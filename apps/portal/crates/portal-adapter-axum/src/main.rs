use portal_core::{PortalApp, MANIFEST};

fn main() {
    if let Err(err) = keyportal_adapter_axum::run_app::<PortalApp>(MANIFEST) {
        eprintln!("portal-adapter-axum failed: {err:#}");
        std::process::exit(1);
    }
}
