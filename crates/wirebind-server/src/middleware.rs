//! Middleware pipeline — ordered cross-cutting hooks scoped by route.
//!
//! Middleware run before dispatch, in configuration order, each wrapped
//! with a scope filter: global, one service, or one service plus a method
//! subset. A middleware completes with `Ok(())` to continue the chain or
//! an error to abort the call, which surfaces to the peer as an
//! `internal` RPC error.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{info, warn};
use wirebind_protocol::descriptor::upper_first;
use wirebind_protocol::{RouteKey, RpcError, ServiceDescriptor};
use wirebind_transport::{BeforeHook, CallContext, Transport};

use crate::BoxError;
use crate::stores::{ClassKey, InstanceStore};

/// Cross-cutting hook executed before dispatch.
///
/// The completion is the signal: resolve to continue the chain, fail to
/// abort the call.
pub trait Middleware: Send + Sync + 'static {
    fn handle(
        &self,
        ctx: &mut CallContext,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Object-safe adapter over [`Middleware`] — all refs share lifetime `'a`.
pub(crate) trait MiddlewareDyn: Send + Sync {
    fn handle_dyn<'a>(
        &'a self,
        ctx: &'a mut CallContext,
    ) -> BoxFuture<'a, Result<(), BoxError>>;
}

impl<T: Middleware> MiddlewareDyn for T {
    fn handle_dyn<'a>(
        &'a self,
        ctx: &'a mut CallContext,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(self.handle(ctx))
    }
}

/// Scope predicate compiled from a [`MiddlewareConfig`].
///
/// Configured method names are declared in lowerCamel and upper-cased on
/// the first letter here, because the route-key method segment keeps the
/// schema's PascalCase. That casing bridge is load-bearing.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    service: Option<String>,
    methods: Option<BTreeSet<String>>,
}

impl ScopeFilter {
    pub fn applies(&self, route: &RouteKey) -> bool {
        if let Some(service) = &self.service {
            if route.service() != service {
                return false;
            }
        }
        if let Some(methods) = &self.methods {
            if !methods.contains(route.method()) {
                return false;
            }
        }
        true
    }
}

/// One middleware application: which class, and which routes it covers.
///
/// The constructors make the scope invariant unrepresentable: a method
/// subset can only be given together with its service.
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    class: ClassKey,
    scope_service: Option<String>,
    scope_methods: Option<BTreeSet<String>>,
}

impl MiddlewareConfig {
    /// Apply to every route of every service.
    pub fn global<M: Middleware>() -> Self {
        Self {
            class: ClassKey::of::<M>(),
            scope_service: None,
            scope_methods: None,
        }
    }

    /// Apply to every method of one service.
    pub fn for_service<M: Middleware>(service: &ServiceDescriptor) -> Self {
        Self {
            class: ClassKey::of::<M>(),
            scope_service: Some(service.type_name().to_string()),
            scope_methods: None,
        }
    }

    /// Apply to a subset of one service's methods, named in lowerCamel as
    /// declared (e.g. `sayMany`).
    pub fn for_methods<M, I, S>(service: &ServiceDescriptor, methods: I) -> Self
    where
        M: Middleware,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let methods: BTreeSet<String> = methods.into_iter().map(Into::into).collect();
        for name in &methods {
            if !service.methods().iter().any(|m| m.local_name == *name) {
                warn!(
                    "middleware scope names method `{}`, not declared by {}",
                    name,
                    service.type_name()
                );
            }
        }
        Self {
            class: ClassKey::of::<M>(),
            scope_service: Some(service.type_name().to_string()),
            scope_methods: Some(methods),
        }
    }

    pub fn class(&self) -> &ClassKey {
        &self.class
    }

    /// Compile the scope predicate, bridging lowerCamel method names to
    /// the PascalCase route segment. An empty method set means no method
    /// restriction, same as omitting it.
    pub fn scope_filter(&self) -> ScopeFilter {
        ScopeFilter {
            service: self.scope_service.clone(),
            methods: self
                .scope_methods
                .as_ref()
                .filter(|set| !set.is_empty())
                .map(|set| set.iter().map(|m| upper_first(m)).collect()),
        }
    }

    fn describe_scope(&self) -> String {
        match (&self.scope_service, &self.scope_methods) {
            (None, _) => "to all services".to_string(),
            (Some(service), None) => format!("to service {service}, all methods"),
            (Some(service), Some(methods)) => {
                let names: Vec<&str> = methods.iter().map(String::as_str).collect();
                format!("to service {service}, methods [{}]", names.join(", "))
            }
        }
    }
}

/// Install one before-dispatch hook per config, in order.
///
/// A config whose middleware instance was never registered is logged and
/// skipped — a cosmetic wiring mistake should not make the whole server
/// unstartable.
pub(crate) fn install<T: Transport + ?Sized>(
    transport: &mut T,
    configs: Vec<MiddlewareConfig>,
    store: &InstanceStore<dyn MiddlewareDyn>,
) {
    info!("installing {} middleware configuration(s)", configs.len());

    for config in configs {
        let Some(instance) = store.get(config.class()) else {
            warn!(
                "middleware {} not found in store; was the instance ever registered?",
                config.class().short_name()
            );
            continue;
        };

        let scope = Arc::new(config.scope_filter());
        let class = config.class().clone();
        let hook: BeforeHook = Box::new(move |ctx| {
            let instance = instance.clone();
            let scope = scope.clone();
            let class = class.clone();
            Box::pin(async move {
                let Some(route) = RouteKey::parse(ctx.request().path()) else {
                    // Not a routed call; nothing to do.
                    return Ok(());
                };
                if !scope.applies(&route) {
                    return Ok(());
                }
                instance.handle_dyn(ctx).await.map_err(|e| {
                    RpcError::internal(format!("middleware {}: {e}", class.short_name()))
                })
            })
        });
        transport.add_before_hook(hook);

        info!(
            "applied middleware {} {}",
            config.class().short_name(),
            config.describe_scope()
        );
    }
}
