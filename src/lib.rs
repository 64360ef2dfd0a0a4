//! Wirebind — Connect-style RPC handler binding with middleware and
//! guard pipelines.
//!
//! Facade over the workspace crates:
//! - [`protocol`] — service descriptors, route keys, wire error codes.
//! - [`transport`] — the transport seam and the in-process transport.
//! - [`server`] — registries, method binder, dispatch tables, pipelines.

pub use wirebind_protocol as protocol;
pub use wirebind_server as server;
pub use wirebind_transport as transport;

pub use wirebind_protocol::{
    MethodDescriptor, MethodKind, RouteKey, RpcCode, RpcError, ServiceDescriptor,
};
pub use wirebind_server::{
    BindOptions, ConfigError, Guard, GuardContext, HandlerMethod, Middleware, MiddlewareConfig,
    RegisterOptions, ServiceHandler, WirebindServer,
};
pub use wirebind_transport::{
    CallContext, LocalTransport, MethodHandler, Payload, Transport, TransportCapabilities,
};
