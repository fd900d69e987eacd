//! Client-side gateway to the KeyPortal backend.
//!
//! [`ApiGateway`] resolves the base URL from the manifest, attaches the persisted bearer
//! token, and probes alternate endpoints for operations the backend exposes under more
//! than one route. Typed operations live in `impl ApiGateway` blocks under `services`.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod normalize;
pub mod probe;
pub mod services;
pub mod session;
pub mod store;
#[cfg(test)]
mod testing;

pub use config::{ApiMethod, BuildMode, GatewayConfig};
pub use error::GatewayError;
pub use gateway::{ApiCall, ApiGateway};
pub use models::{ApiKey, Credentials, Registration, User};
pub use probe::{Candidate, ProbeOperation};
pub use session::Session;
pub use store::PersistentKvStore;
