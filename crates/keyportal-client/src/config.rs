use std::fmt;

use http::{Method, Uri};
use keyportal_core::manifest::ManifestClient;
pub use keyportal_core::manifest::BuildMode;

use crate::error::GatewayError;

/// HTTP methods the backend accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl ApiMethod {
    pub fn as_method(self) -> Method {
        match self {
            ApiMethod::Get => Method::GET,
            ApiMethod::Post => Method::POST,
            ApiMethod::Put => Method::PUT,
            ApiMethod::Patch => Method::PATCH,
            ApiMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

/// Where gateway calls are sent.
///
/// `base_url` is either absolute (`https://api-key-system.example.dev`) or a path on the
/// portal's own origin (`/api`). A path needs `origin` to be usable outside a browser.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GatewayConfig {
    base_url: String,
    origin: Option<String>,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            origin: None,
        }
    }

    /// Resolve the base URL for `mode`, or for the manifest/build default when `None`.
    pub fn from_manifest(client: &ManifestClient, mode: Option<BuildMode>) -> Self {
        let mode = mode.unwrap_or_else(|| client.mode_or_build_default());
        Self {
            base_url: client.base_url(mode).to_string(),
            origin: client.origin.clone(),
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Absolute URL for `path` (which may carry a query string).
    pub fn endpoint(&self, path: &str) -> Result<Uri, GatewayError> {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let relative = format!("{base}/{path}");

        let url = if base.starts_with("http://") || base.starts_with("https://") {
            relative
        } else {
            let origin = self.origin.as_deref().ok_or_else(|| {
                GatewayError::Config(format!(
                    "base URL `{}` is relative; set [client] origin",
                    self.base_url
                ))
            })?;
            let origin = origin.trim_end_matches('/');
            if relative.starts_with('/') {
                format!("{origin}{relative}")
            } else {
                format!("{origin}/{relative}")
            }
        };

        url.parse()
            .map_err(|err| GatewayError::Config(format!("invalid URL `{url}`: {err}")))
    }
}
