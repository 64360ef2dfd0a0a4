//! Wirebind transport layer.
//!
//! The binding core never talks to a concrete wire protocol. It talks to
//! the [`Transport`] trait: a routing table keyed by the fixed
//! `/{serviceTypeName}/{MethodName}` path convention, an ordered list of
//! before-dispatch hooks, a capability flag set, and an accept-compression
//! option passed through unmodified. [`local::LocalTransport`] is the
//! in-process implementation used by tests and embedders.

pub mod context;
pub mod local;
pub mod service;

pub use context::{CallContext, RequestParts, ResponseParts};
pub use local::LocalTransport;
pub use service::{MethodHandler, Payload, PayloadStream, ResponseStream, ServiceImpl};

use futures_util::future::BoxFuture;
use wirebind_protocol::{RpcError, ServiceDescriptor};

/// A hook executed before dispatch, in installation order.
///
/// `Ok(())` continues the chain; an error aborts the call and is returned
/// to the peer as-is.
pub type BeforeHook =
    Box<dyn for<'a> Fn(&'a mut CallContext) -> BoxFuture<'a, Result<(), RpcError>> + Send + Sync>;

/// What the active transport can do. Consulted at bind time so that
/// unsupported method kinds fail at startup rather than per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportCapabilities {
    /// Whether bidirectional-streaming methods can be exposed.
    pub bidi_streaming: bool,
}

/// The seam between the binding core and a concrete transport.
pub trait Transport {
    fn capabilities(&self) -> TransportCapabilities;

    /// Accept-compression configuration, passed through unmodified.
    fn accept_compression(&mut self, encodings: &[String]);

    /// Install a before-dispatch hook. Hooks run in installation order on
    /// every inbound request, before the bound handler.
    fn add_before_hook(&mut self, hook: BeforeHook);

    /// Expose a service's implementation at `/{type_name}/{MethodName}`
    /// for each declared method.
    fn register_service(&mut self, service: ServiceDescriptor, implementation: ServiceImpl);
}
