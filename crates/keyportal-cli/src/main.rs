//! KeyPortal CLI.

#[cfg(feature = "cli")]
mod args;
#[cfg(feature = "cli")]
mod commands;

#[cfg(feature = "cli")]
fn main() {
    use args::Args;
    use clap::Parser;

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("[keyportal] error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn run(args: args::Args) -> anyhow::Result<()> {
    use anyhow::Context;

    let loader = commands::load_manifest(args.manifest.as_deref())?;
    let manifest = loader.manifest();
    keyportal_adapter_axum::init_logger(&manifest.logging_or_default("cli"));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(commands::run(args, manifest))
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("keyportal-cli built without `cli` feature. Rebuild with `--features cli`.");
}
