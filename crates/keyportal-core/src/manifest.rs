//! `keyportal.toml` loading.
//!
//! ```toml
//! [app]
//! name = "KeyPortal"
//!
//! [forwarder]
//! prefix = "/api"
//! strip_prefix = true
//! debug_headers = true
//! binding = "API"
//! upstream = "http://127.0.0.1:8788"
//!
//! [client]
//! mode = "development"
//! development_url = "https://api-key-system.8901530.workers.dev"
//! production_url = "/api"
//! origin = "https://portal.example.com"
//! session_path = ".keyportal/session.redb"
//!
//! [logging.axum]
//! level = "debug"
//! ```

use log::LevelFilter;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::{Validate, ValidationError};

pub const DEFAULT_PRODUCTION_URL: &str = "/api";
pub const DEFAULT_DEVELOPMENT_URL: &str = "https://api-key-system.8901530.workers.dev";
pub const DEFAULT_BINDING: &str = "API";
pub const DEFAULT_PREFIX: &str = "/api";

#[derive(Debug)]
pub struct ManifestLoader {
    manifest: Arc<Manifest>,
}

impl ManifestLoader {
    pub fn load_from_str(contents: &str) -> Result<Self, io::Error> {
        let manifest = parse(contents)?;
        Ok(Self {
            manifest: Arc::new(manifest),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, io::Error> {
        let contents = std::fs::read_to_string(path)?;
        let mut manifest = parse(&contents)?;
        let cwd = std::env::current_dir()?;
        manifest.root = Some(resolve_root_path(path, &cwd));
        Ok(Self {
            manifest: Arc::new(manifest),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn shared(&self) -> Arc<Manifest> {
        Arc::clone(&self.manifest)
    }
}

fn parse(contents: &str) -> Result<Manifest, io::Error> {
    let mut manifest: Manifest = toml::from_str(contents)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    manifest
        .validate()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    manifest.finalize();
    Ok(manifest)
}

fn resolve_root_path(path: &Path, cwd: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => cwd.to_path_buf(),
        Some(parent) if parent.is_relative() => cwd.join(parent),
        Some(parent) => parent.to_path_buf(),
        None => cwd.to_path_buf(),
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct Manifest {
    #[serde(default)]
    #[validate(nested)]
    pub app: ManifestApp,
    #[serde(default)]
    #[validate(nested)]
    pub forwarder: ManifestForwarder,
    #[serde(default)]
    #[validate(nested)]
    pub client: ManifestClient,
    #[serde(default)]
    #[validate(nested)]
    pub logging: ManifestLogging,
    #[serde(skip)]
    pub(crate) root: Option<PathBuf>,
    #[serde(skip)]
    pub(crate) logging_resolved: BTreeMap<String, ResolvedLoggingConfig>,
}

impl Manifest {
    /// Directory containing the manifest file, when loaded from disk.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn logging_for(&self, adapter: &str) -> Option<&ResolvedLoggingConfig> {
        self.logging_resolved.get(&adapter.to_ascii_lowercase())
    }

    pub fn logging_or_default(&self, adapter: &str) -> ResolvedLoggingConfig {
        self.logging_for(adapter).cloned().unwrap_or_default()
    }

    /// Resolve `path` against the manifest directory, falling back to the path as given.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        match self.root() {
            Some(root) if candidate.is_relative() => root.join(candidate),
            _ => candidate.to_path_buf(),
        }
    }

    fn finalize(&mut self) {
        self.logging_resolved = self
            .logging
            .adapters
            .iter()
            .map(|(adapter, cfg)| {
                (
                    adapter.to_ascii_lowercase(),
                    ResolvedLoggingConfig::from_manifest(cfg),
                )
            })
            .collect();
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ManifestApp {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: Option<String>,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_binding() -> String {
    DEFAULT_BINDING.to_string()
}

fn enabled() -> bool {
    true
}

/// `[forwarder]`: how `/api` traffic reaches the backend worker.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ManifestForwarder {
    /// Absolute path the forwarder is mounted on, e.g. `/api`.
    #[serde(default = "default_prefix")]
    #[validate(custom(function = "mount_prefix"))]
    pub prefix: String,
    /// `false` selects the pass-through forwarder.
    #[serde(default = "enabled")]
    pub strip_prefix: bool,
    #[serde(default = "enabled")]
    pub debug_headers: bool,
    /// Service binding name on Cloudflare.
    #[serde(default = "default_binding")]
    #[validate(length(min = 1))]
    pub binding: String,
    /// Origin the native adapter re-targets forwarded requests at.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub upstream: Option<String>,
}

impl ManifestForwarder {
    /// The prefix without trailing slashes; this is the route the portal mounts.
    pub fn mount(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }
}

fn mount_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.starts_with('/') && !prefix.trim_end_matches('/').is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new("mount_prefix")
            .with_message("forwarder prefix must be an absolute path below `/`".into()))
    }
}

impl Default for ManifestForwarder {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            strip_prefix: true,
            debug_headers: true,
            binding: default_binding(),
            upstream: None,
        }
    }
}

/// Which backend base URL the client gateway talks to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    Production,
    Development,
}

impl BuildMode {
    /// `Development` for debug builds, `Production` otherwise.
    pub fn from_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" => Some(Self::Development),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for BuildMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "client mode must be production or development (got `{}`)",
                value
            ))
        })
    }
}

fn default_production_url() -> String {
    DEFAULT_PRODUCTION_URL.to_string()
}

fn default_development_url() -> String {
    DEFAULT_DEVELOPMENT_URL.to_string()
}

/// `[client]`: settings for the API gateway and the CLI.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ManifestClient {
    #[serde(default)]
    pub mode: Option<BuildMode>,
    #[serde(default = "default_production_url")]
    #[validate(length(min = 1))]
    pub production_url: String,
    #[serde(default = "default_development_url")]
    #[validate(length(min = 1))]
    pub development_url: String,
    /// Origin used to resolve a relative base URL such as `/api`.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub origin: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub session_path: Option<String>,
}

impl Default for ManifestClient {
    fn default() -> Self {
        Self {
            mode: None,
            production_url: default_production_url(),
            development_url: default_development_url(),
            origin: None,
            session_path: None,
        }
    }
}

impl ManifestClient {
    pub fn mode_or_build_default(&self) -> BuildMode {
        self.mode.unwrap_or_else(BuildMode::from_build)
    }

    pub fn base_url(&self, mode: BuildMode) -> &str {
        match mode {
            BuildMode::Production => &self.production_url,
            BuildMode::Development => &self.development_url,
        }
    }
}

/// `[logging.<adapter>]` tables.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ManifestLogging {
    #[serde(flatten)]
    #[validate(nested)]
    pub adapters: BTreeMap<String, ManifestLoggingConfig>,
}

#[derive(Debug, Default, Deserialize, Clone, Validate)]
pub struct ManifestLoggingConfig {
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub echo_stdout: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedLoggingConfig {
    pub level: LogLevel,
    pub echo_stdout: bool,
}

impl Default for ResolvedLoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            echo_stdout: true,
        }
    }
}

impl ResolvedLoggingConfig {
    fn from_manifest(cfg: &ManifestLoggingConfig) -> Self {
        let defaults = Self::default();
        Self {
            level: cfg.level.unwrap_or(defaults.level),
            echo_stdout: cfg.echo_stdout.unwrap_or(defaults.echo_stdout),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            other => Err(serde::de::Error::custom(format!(
                "logging level must be trace, debug, info, warn, error, or off (got `{}`)",
                other
            ))),
        }
    }
}
