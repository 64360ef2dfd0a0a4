//! Dispatch table builder — turns handler bindings into the per-service
//! implementation objects a transport consumes.
//!
//! Mapped methods are wrapped with the exact transport-facing signature of
//! their kind; unmapped methods get a stub that fails with
//! `unimplemented` when invoked. Every declared method, mapped or not,
//! receives a route metadata entry so the guard pipeline runs before the
//! unimplemented failure surfaces.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, warn};
use wirebind_protocol::{MethodKind, RouteKey, RpcError, ServiceDescriptor};
use wirebind_transport::{MethodHandler, ServiceImpl, TransportCapabilities};

use crate::error::ConfigError;
use crate::routes::{RouteIndex, RouteMetadata};
use crate::stores::HandlerBinding;

pub(crate) struct DispatchTables {
    pub(crate) services: Vec<(ServiceDescriptor, ServiceImpl)>,
    pub(crate) routes: RouteIndex,
}

/// Build the dispatch tables and the route metadata index.
///
/// Fails fast when a declared bidi-streaming method cannot be exposed by
/// the active transport; this must happen at build time, never per call.
pub(crate) fn build(
    bindings: &[HandlerBinding],
    capabilities: &TransportCapabilities,
) -> Result<DispatchTables, ConfigError> {
    let mut services = Vec::with_capacity(bindings.len());
    let mut routes = RouteIndex::default();

    for binding in bindings {
        let descriptor = binding.descriptor();
        let class = binding.class();
        let mut implementation = ServiceImpl::new();

        for method in descriptor.methods() {
            if method.kind == MethodKind::BidiStreaming && !capabilities.bidi_streaming {
                return Err(ConfigError::UnsupportedMethodKind {
                    service: descriptor.type_name().to_string(),
                    method: method.name.clone(),
                });
            }

            let key = RouteKey::new(descriptor.type_name(), &method.name);
            let mapped = binding
                .mapping()
                .get(&method.name)
                .and_then(|name| binding.methods().iter().find(|m| m.name() == name.as_str()));

            match mapped {
                Some(entry) if entry.handler().kind() == method.kind => {
                    info!(
                        "binding {}.{} to {}.{}",
                        class.short_name(),
                        entry.name(),
                        descriptor.type_name(),
                        method.name
                    );
                    implementation.insert(&method.local_name, entry.handler().clone());
                    routes.insert(RouteMetadata::new(
                        key,
                        class.clone(),
                        binding.instance().clone(),
                        Some(entry.name().to_string()),
                        Some(entry.handler().clone()),
                        binding.instance().skip_guards() || entry.skips_guards(),
                    ));
                }
                Some(entry) => {
                    warn!(
                        "handler {}.{} is {}, but {}.{} declares {}; leaving unimplemented",
                        class.short_name(),
                        entry.name(),
                        entry.handler().kind(),
                        descriptor.type_name(),
                        method.name,
                        method.kind
                    );
                    implementation.insert(&method.local_name, unimplemented_stub(method.kind, &key));
                    routes.insert(RouteMetadata::new(
                        key,
                        class.clone(),
                        binding.instance().clone(),
                        None,
                        None,
                        binding.instance().skip_guards(),
                    ));
                }
                None => {
                    warn!("no handler method for {}", key);
                    implementation.insert(&method.local_name, unimplemented_stub(method.kind, &key));
                    routes.insert(RouteMetadata::new(
                        key,
                        class.clone(),
                        binding.instance().clone(),
                        None,
                        None,
                        binding.instance().skip_guards(),
                    ));
                }
            }
        }

        services.push((descriptor.clone(), implementation));
    }

    Ok(DispatchTables { services, routes })
}

/// Stub installed for declared-but-unmapped methods, shaped like the
/// declared kind so the transport wiring stays uniform.
fn unimplemented_stub(kind: MethodKind, key: &RouteKey) -> MethodHandler {
    let route = key.path();
    match kind {
        MethodKind::Unary => MethodHandler::Unary(Arc::new(move |_request| {
            let err = RpcError::unimplemented(&route);
            Box::pin(async move { Err(err) })
        })),
        MethodKind::ClientStreaming => MethodHandler::ClientStreaming(Arc::new(move |_input| {
            let err = RpcError::unimplemented(&route);
            Box::pin(async move { Err(err) })
        })),
        MethodKind::ServerStreaming => MethodHandler::ServerStreaming(Arc::new(move |_request| {
            let err = RpcError::unimplemented(&route);
            stream::once(async move { Err(err) }).boxed()
        })),
        MethodKind::BidiStreaming => MethodHandler::BidiStreaming(Arc::new(move |_input| {
            let err = RpcError::unimplemented(&route);
            stream::once(async move { Err(err) }).boxed()
        })),
    }
}
