//! Core primitives shared by the KeyPortal edge forwarder and its hosting adapters.

pub mod app;
pub mod body;
pub mod context;
pub mod error;
pub mod forward;
pub mod handler;
pub mod http;
pub mod kv;
pub mod manifest;
pub mod middleware;
pub mod params;
pub mod proxy;
pub mod response;
pub mod router;

pub use app::{App, Hooks};
pub use body::Body;
pub use context::RequestContext;
pub use error::EdgeError;
pub use forward::Forwarder;
pub use http::{response_builder, Method, Request, Response, StatusCode};
pub use router::RouterService;
