//! In-process transport — drives the full hook + dispatch pipeline
//! without a wire protocol underneath.
//!
//! Routes are keyed by the `/{serviceTypeName}/{MethodName}` path
//! convention. Each `call_*` entry point builds a fresh [`CallContext`],
//! runs the installed hooks sequentially (first error aborts the call),
//! then invokes the bound handler with the signature of its kind.

use std::collections::HashMap;

use tracing::debug;
use wirebind_protocol::{RouteKey, RpcError, ServiceDescriptor};

use crate::context::CallContext;
use crate::service::{MethodHandler, Payload, PayloadStream, ResponseStream, ServiceImpl};
use crate::{BeforeHook, Transport, TransportCapabilities};

/// In-process transport for tests and embedders.
pub struct LocalTransport {
    capabilities: TransportCapabilities,
    accept_compression: Vec<String>,
    hooks: Vec<BeforeHook>,
    routes: HashMap<String, MethodHandler>,
    services: Vec<ServiceDescriptor>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::with_capabilities(TransportCapabilities::default())
    }

    pub fn with_capabilities(capabilities: TransportCapabilities) -> Self {
        Self {
            capabilities,
            accept_compression: Vec::new(),
            hooks: Vec::new(),
            routes: HashMap::new(),
            services: Vec::new(),
        }
    }

    /// Descriptors of every registered service, in registration order.
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// The accept-compression encodings passed through at bind time.
    pub fn accepted_compression(&self) -> &[String] {
        &self.accept_compression
    }

    pub fn has_route(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Invoke a unary method at `path` with the given request headers.
    pub async fn call_unary(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        payload: Payload,
    ) -> Result<Payload, RpcError> {
        let mut ctx = self.context(path, headers);
        self.run_hooks(&mut ctx).await?;
        match self.routes.get(path) {
            Some(MethodHandler::Unary(f)) => f(payload).await,
            Some(other) => Err(kind_mismatch(path, "unary", other)),
            None => Err(RpcError::unimplemented(path)),
        }
    }

    /// Invoke a client-streaming method: many requests in, one response out.
    pub async fn call_client_streaming(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        input: PayloadStream,
    ) -> Result<Payload, RpcError> {
        let mut ctx = self.context(path, headers);
        self.run_hooks(&mut ctx).await?;
        match self.routes.get(path) {
            Some(MethodHandler::ClientStreaming(f)) => f(input).await,
            Some(other) => Err(kind_mismatch(path, "client_streaming", other)),
            None => Err(RpcError::unimplemented(path)),
        }
    }

    /// Invoke a server-streaming method: one request in, a lazy response
    /// stream out. Dropping the returned stream cancels production.
    pub async fn call_server_streaming(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        payload: Payload,
    ) -> Result<ResponseStream, RpcError> {
        let mut ctx = self.context(path, headers);
        self.run_hooks(&mut ctx).await?;
        match self.routes.get(path) {
            Some(MethodHandler::ServerStreaming(f)) => Ok(f(payload)),
            Some(other) => Err(kind_mismatch(path, "server_streaming", other)),
            None => Err(RpcError::unimplemented(path)),
        }
    }

    /// Invoke a bidi-streaming method. Only reachable when the transport
    /// was created with `bidi_streaming` capability (the binder rejects
    /// bidi methods at build time otherwise).
    pub async fn call_bidi_streaming(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        input: PayloadStream,
    ) -> Result<ResponseStream, RpcError> {
        let mut ctx = self.context(path, headers);
        self.run_hooks(&mut ctx).await?;
        match self.routes.get(path) {
            Some(MethodHandler::BidiStreaming(f)) => Ok(f(input)),
            Some(other) => Err(kind_mismatch(path, "bidi_streaming", other)),
            None => Err(RpcError::unimplemented(path)),
        }
    }

    fn context(&self, path: &str, headers: &[(&str, &str)]) -> CallContext {
        let mut ctx = CallContext::new(path);
        for (name, value) in headers {
            ctx.request_mut().insert_header(name, *value);
        }
        ctx
    }

    async fn run_hooks(&self, ctx: &mut CallContext) -> Result<(), RpcError> {
        for hook in &self.hooks {
            hook(ctx).await?;
        }
        Ok(())
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalTransport {
    fn capabilities(&self) -> TransportCapabilities {
        self.capabilities
    }

    fn accept_compression(&mut self, encodings: &[String]) {
        self.accept_compression = encodings.to_vec();
    }

    fn add_before_hook(&mut self, hook: BeforeHook) {
        self.hooks.push(hook);
    }

    fn register_service(&mut self, service: ServiceDescriptor, implementation: ServiceImpl) {
        for method in service.methods() {
            let path = RouteKey::new(service.type_name(), &method.name).path();
            match implementation.get(&method.local_name) {
                Some(handler) => {
                    debug!("route {} ({})", path, method.kind);
                    self.routes.insert(path, handler.clone());
                }
                None => {
                    debug!("route {} has no implementation entry", path);
                }
            }
        }
        debug!(
            "exposing service {} ({} methods)",
            service.type_name(),
            service.methods().len()
        );
        self.services.push(service);
    }
}

fn kind_mismatch(path: &str, invoked: &str, bound: &MethodHandler) -> RpcError {
    RpcError::invalid_argument(format!(
        "route {path} is {}, invoked as {invoked}",
        bound.kind()
    ))
}
