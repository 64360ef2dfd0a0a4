//! Guard pipeline — fail-closed authorization, strictly after middleware.
//!
//! One hook is installed for all guards. Per call: parse the route key
//! (non-routes pass through), look up the route metadata (missing metadata
//! warns and passes), honor the skip marker, then run every registered
//! guard in registration order. The first non-true result short-circuits
//! the call with `permission_denied` before the handler executes; a guard
//! error is treated exactly like an explicit rejection.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};
use wirebind_protocol::{RouteKey, RpcError};
use wirebind_transport::{BeforeHook, CallContext, MethodHandler, Payload, RequestParts, ResponseParts, Transport};

use crate::BoxError;
use crate::routes::{RouteIndex, RouteMetadata};
use crate::stores::ClassKey;

/// Authorization check executed per routed call.
///
/// Returning `Ok(false)` or any error denies the call. Synchronous guards
/// simply return a ready future.
pub trait Guard: Send + Sync + 'static {
    fn can_activate(
        &self,
        ctx: &GuardContext<'_>,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send;
}

/// Object-safe adapter over [`Guard`] — all refs share lifetime `'a`.
pub(crate) trait GuardDyn: Send + Sync {
    fn can_activate_dyn<'a>(
        &'a self,
        ctx: &'a GuardContext<'a>,
    ) -> BoxFuture<'a, Result<bool, BoxError>>;
}

impl<T: Guard> GuardDyn for T {
    fn can_activate_dyn<'a>(
        &'a self,
        ctx: &'a GuardContext<'a>,
    ) -> BoxFuture<'a, Result<bool, BoxError>> {
        Box::pin(self.can_activate(ctx))
    }
}

/// A registered guard: class identity plus instance. Guards are unscoped;
/// every guard runs for every route without a skip marker.
pub(crate) struct GuardBinding {
    pub(crate) class: ClassKey,
    pub(crate) instance: Arc<dyn GuardDyn>,
}

/// What a guard can observe about the in-flight call.
///
/// Positional call arguments are not populated at guard time — bodies are
/// deserialized later by the transport — so guards authorize on routing
/// and header-level information.
pub struct GuardContext<'a> {
    route: &'a RouteMetadata,
    call: &'a CallContext,
}

impl<'a> GuardContext<'a> {
    pub(crate) fn new(route: &'a RouteMetadata, call: &'a CallContext) -> Self {
        Self { route, call }
    }

    /// Class identity of the owning handler.
    pub fn class(&self) -> &ClassKey {
        self.route.owner()
    }

    /// The resolved handler callable, when the route is mapped.
    pub fn handler(&self) -> Option<&MethodHandler> {
        self.route.handler()
    }

    /// Handler-side method name, when the route is mapped.
    pub fn handler_name(&self) -> Option<&str> {
        self.route.handler_method_name()
    }

    pub fn route(&self) -> &RouteMetadata {
        self.route
    }

    /// Positional call arguments. Always empty at guard time.
    pub fn args(&self) -> &[Payload] {
        &[]
    }

    pub fn request(&self) -> &RequestParts {
        self.call.request()
    }

    pub fn response(&self) -> &ResponseParts {
        self.call.response()
    }
}

/// Install the single guard hook. Must run strictly after the middleware
/// pipeline so authorization observes post-middleware state.
pub(crate) fn install<T: Transport + ?Sized>(
    transport: &mut T,
    guards: Vec<GuardBinding>,
    routes: Arc<RouteIndex>,
) {
    let count = guards.len();
    let guards = Arc::new(guards);

    let hook: BeforeHook = Box::new(move |ctx| {
        let guards = guards.clone();
        let routes = routes.clone();
        Box::pin(async move {
            let Some(key) = RouteKey::parse(ctx.request().path()) else {
                // Not a routed call; guards do not apply.
                return Ok(());
            };
            let Some(route) = routes.get(&key.path()) else {
                warn!("no route metadata found for {}", key);
                return Ok(());
            };
            if route.skips_guards() {
                debug!("guards skipped for {}", key);
                return Ok(());
            }
            if guards.is_empty() {
                return Ok(());
            }

            let guard_ctx = GuardContext::new(route, &*ctx);
            for binding in guards.iter() {
                match binding.instance.can_activate_dyn(&guard_ctx).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("guard {} rejected {}", binding.class.short_name(), key);
                        return Err(RpcError::permission_denied("Forbidden"));
                    }
                    Err(e) => {
                        warn!("guard {} failed on {}: {e}", binding.class.short_name(), key);
                        return Err(RpcError::permission_denied(e.to_string()));
                    }
                }
            }
            Ok(())
        })
    });
    transport.add_before_hook(hook);

    info!("guard pipeline initialized ({count} guard(s))");
}
