//! Service handler surface — the objects that implement RPC methods.
//!
//! A handler names the service it implements via its descriptor and
//! declares an explicit method table. The binder matches table entries to
//! declared RPC methods by name; there is no runtime introspection.

use std::future::Future;
use std::sync::Arc;

use wirebind_protocol::{RpcError, ServiceDescriptor};
use wirebind_transport::{MethodHandler, Payload, PayloadStream};

/// Implemented by handler objects bound to one RPC service.
///
/// Handlers may implement any subset of the service's declared methods;
/// unimplemented methods fail per call, not at bind time.
pub trait ServiceHandler: Send + Sync + 'static {
    /// Descriptor of the service this handler implements.
    fn descriptor(&self) -> ServiceDescriptor;

    /// Declared method table, in declaration order. Entries capture the
    /// handler instance, so the receiver is the shared `Arc`.
    fn methods(self: Arc<Self>) -> Vec<HandlerMethod>;

    /// Class-level guard-skip marker. When true, no route of this handler
    /// runs guards.
    fn skip_guards(&self) -> bool {
        false
    }
}

/// One entry of a handler's declared method table.
pub struct HandlerMethod {
    name: &'static str,
    handler: MethodHandler,
    skip_guards: bool,
}

impl HandlerMethod {
    pub fn new(name: &'static str, handler: MethodHandler) -> Self {
        Self {
            name,
            handler,
            skip_guards: false,
        }
    }

    pub fn unary<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::new(name, MethodHandler::unary(f))
    }

    pub fn client_streaming<F, Fut>(name: &'static str, f: F) -> Self
    where
        F: Fn(PayloadStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::new(name, MethodHandler::client_streaming(f))
    }

    pub fn server_streaming<F, S>(name: &'static str, f: F) -> Self
    where
        F: Fn(Payload) -> S + Send + Sync + 'static,
        S: futures_util::Stream<Item = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::new(name, MethodHandler::server_streaming(f))
    }

    pub fn bidi_streaming<F, S>(name: &'static str, f: F) -> Self
    where
        F: Fn(PayloadStream) -> S + Send + Sync + 'static,
        S: futures_util::Stream<Item = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::new(name, MethodHandler::bidi_streaming(f))
    }

    /// Mark this method so guards are bypassed for its route.
    pub fn skip_guards(mut self) -> Self {
        self.skip_guards = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handler(&self) -> &MethodHandler {
        &self.handler
    }

    pub fn skips_guards(&self) -> bool {
        self.skip_guards
    }
}

impl std::fmt::Debug for HandlerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("name", &self.name)
            .field("kind", &self.handler.kind())
            .field("skip_guards", &self.skip_guards)
            .finish()
    }
}
