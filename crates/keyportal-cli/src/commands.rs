use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use keyportal_adapter_axum::AxumProxyClient;
use keyportal_client::{
    ApiGateway, ApiKey, Credentials, GatewayConfig, GatewayError, PersistentKvStore, Registration,
    Session,
};
use keyportal_core::kv::KvHandle;
use keyportal_core::manifest::{Manifest, ManifestLoader};
use keyportal_core::proxy::ProxyHandle;
use serde_json::Value;

use crate::args::{Args, Command, KeyState, KeysCommand};

const DEFAULT_SESSION_FILE: &str = ".keyportal/session.redb";

/// Load `--manifest`, or an empty manifest (all defaults) when none was given.
pub fn load_manifest(path: Option<&Path>) -> Result<ManifestLoader> {
    match path {
        Some(path) => ManifestLoader::from_path(path)
            .with_context(|| format!("failed to load manifest {}", path.display())),
        None => ManifestLoader::load_from_str("").context("invalid default manifest"),
    }
}

/// `[client] session_path` relative to the manifest, else `~/.keyportal/session.redb`.
pub fn session_path(manifest: &Manifest) -> PathBuf {
    match &manifest.client.session_path {
        Some(path) => manifest.resolve_path(path),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(DEFAULT_SESSION_FILE),
    }
}

pub fn gateway_config(args: &Args, manifest: &Manifest) -> GatewayConfig {
    match &args.base_url {
        Some(base_url) => {
            let config = GatewayConfig::new(base_url.clone());
            match &manifest.client.origin {
                Some(origin) => config.with_origin(origin.clone()),
                None => config,
            }
        }
        None => GatewayConfig::from_manifest(&manifest.client, args.mode),
    }
}

pub fn build_gateway(args: &Args, manifest: &Manifest) -> Result<ApiGateway> {
    let path = session_path(manifest);
    let store = PersistentKvStore::open(&path)
        .with_context(|| format!("failed to open session store {}", path.display()))?;
    let transport = AxumProxyClient::new().context("failed to build HTTP client")?;
    let config = gateway_config(args, manifest);
    log::debug!("gateway base url {}", config.base_url());

    Ok(ApiGateway::new(
        config,
        ProxyHandle::with_client(transport),
        Session::new(KvHandle::with_store(store)),
    ))
}

pub async fn run(args: Args, manifest: &Manifest) -> Result<()> {
    let mut gateway = build_gateway(&args, manifest)?;
    gateway
        .session_mut()
        .hydrate()
        .await
        .context("failed to read session")?;

    let outcome = execute(args.cmd, &mut gateway).await;
    if let Err(err) = &outcome {
        if err
            .downcast_ref::<GatewayError>()
            .is_some_and(GatewayError::is_session_expired)
        {
            clear_expired_session(&mut gateway).await;
        }
    }
    outcome
}

/// Drop a session the backend no longer accepts. Returns whether the stored session is gone.
async fn clear_expired_session(gateway: &mut ApiGateway) -> bool {
    match gateway.logout().await {
        Ok(()) => {
            log::warn!("session cleared; run `keyportal login` again");
            true
        }
        Err(err) => {
            log::warn!("failed to clear expired session: {err}");
            false
        }
    }
}

async fn execute(command: Command, gateway: &mut ApiGateway) -> Result<()> {
    match command {
        Command::Login {
            username,
            email,
            password,
        } => {
            let user = gateway
                .login(&Credentials {
                    username,
                    email,
                    password,
                })
                .await?;
            println!("logged in as {}", user.display_name());
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let payload = gateway
                .register(&Registration {
                    username,
                    email,
                    password,
                })
                .await?;
            print_message(&payload, "registered; run `keyportal login` to continue");
        }
        Command::Logout => {
            gateway.logout().await?;
            println!("logged out");
        }
        Command::Whoami => match gateway.session().user() {
            Some(user) if user.is_admin() => println!("{} (admin)", user.display_name()),
            Some(user) => println!("{}", user.display_name()),
            None => println!("not logged in"),
        },
        Command::Keys(command) => keys(command, gateway).await?,
        Command::Stats => print_json(&gateway.stats().await?)?,
        Command::Usage { period } => print_json(&gateway.usage(period.as_str()).await?)?,
        Command::Verify { key } => print_json(&gateway.verify_key(&key).await?)?,
    }
    Ok(())
}

async fn keys(command: KeysCommand, gateway: &ApiGateway) -> Result<()> {
    match command {
        KeysCommand::List => {
            let keys = gateway.list_keys().await?;
            if keys.is_empty() {
                println!("no API keys");
            }
            for key in &keys {
                println!("{}", key_line(key));
            }
        }
        KeysCommand::Generate { name } => {
            let secret = gateway.generate_key(&name).await?;
            println!("{secret}");
        }
        KeysCommand::Toggle { id, state } => {
            let message = gateway
                .set_key_status(&id, state == KeyState::Active)
                .await?;
            println!("{}", message.unwrap_or_else(|| format!("key {id} updated")));
        }
        KeysCommand::Show { id, range } => {
            let key = gateway.key(&id).await?;
            let usage = gateway.key_usage(&id, range).await?;
            println!("{}", key_line(&key));
            println!("usage ({range}):");
            print_json(&usage.stats)?;
            println!("recent calls: {}", usage.recent_calls.len());
            for call in &usage.recent_calls {
                println!("  {call}");
            }
        }
        KeysCommand::Delete { id } => {
            let message = gateway.delete_key(&id).await?;
            println!("{}", message.unwrap_or_else(|| format!("key {id} deleted")));
        }
        KeysCommand::Regenerate { id } => {
            let secret = gateway.regenerate_key(&id).await?;
            println!("{secret}");
        }
    }
    Ok(())
}

fn key_line(key: &ApiKey) -> String {
    format!(
        "{}\t{}\t{}",
        key.id_string().unwrap_or_else(|| "-".into()),
        key.name.as_deref().unwrap_or("-"),
        if key.is_active() { "active" } else { "disabled" }
    )
}

fn print_message(payload: &Value, fallback: &str) {
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(fallback);
    println!("{message}");
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
