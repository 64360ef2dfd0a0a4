//! Wirebind core — binds handler objects to an RPC transport.
//!
//! The server owns the service/middleware/guard registries, discovers
//! method mappings, builds the dispatch tables and route metadata index,
//! and installs the middleware and guard pipelines on the transport in a
//! strictly ordered startup sequence.

pub mod binder;
mod dispatch;
pub mod error;
pub mod guard;
pub mod handler;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod stores;

pub use binder::discover_mappings;
pub use error::ConfigError;
pub use guard::{Guard, GuardContext};
pub use handler::{HandlerMethod, ServiceHandler};
pub use middleware::{Middleware, MiddlewareConfig, ScopeFilter};
pub use routes::{RouteIndex, RouteMetadata};
pub use server::{BindOptions, WirebindServer};
pub use stores::{ClassKey, RegisterOptions};

/// Error type carried by middleware and guard results.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
