//! The binding context — registration, bind phase, pipeline installation.
//!
//! A [`WirebindServer`] is constructed once at startup and passed by
//! reference into registration calls; there is no process-wide state, so
//! multiple independent instances can coexist (and tests stay hermetic).
//! Phases are strictly ordered: registration → bind → middleware install →
//! guard install. Violations are fatal configuration errors, raised
//! synchronously so they are observed at process start, never mid-traffic.

use std::sync::Arc;

use tracing::{info, warn};
use wirebind_transport::Transport;

use crate::binder;
use crate::dispatch;
use crate::error::ConfigError;
use crate::guard::{self, Guard, GuardBinding, GuardDyn};
use crate::handler::ServiceHandler;
use crate::middleware::{self, Middleware, MiddlewareConfig, MiddlewareDyn};
use crate::routes::RouteIndex;
use crate::stores::{ClassKey, HandlerBinding, InstanceStore, RegisterOptions, ServiceStore};

/// Options for the bind phase.
#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    /// Accept-compression encodings, passed through to the transport
    /// unmodified.
    pub accept_compression: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Registering,
    Bound,
    MiddlewaresInstalled,
    GuardsInstalled,
}

/// Binds registered handlers to a transport and installs the middleware
/// and guard pipelines in front of them.
pub struct WirebindServer {
    services: ServiceStore,
    middlewares: InstanceStore<dyn MiddlewareDyn>,
    guards: InstanceStore<dyn GuardDyn>,
    routes: Option<Arc<RouteIndex>>,
    state: PipelineState,
}

impl WirebindServer {
    pub fn new() -> Self {
        Self {
            services: ServiceStore::new(),
            middlewares: InstanceStore::new("middleware"),
            guards: InstanceStore::new("guard"),
            routes: None,
            state: PipelineState::Registering,
        }
    }

    /// Register a service handler. The method-name mapping is computed
    /// here, once, and is read-only afterwards.
    pub fn register_service<H: ServiceHandler>(&mut self, handler: H) -> Result<(), ConfigError> {
        self.register_service_with(handler, RegisterOptions::default())
    }

    pub fn register_service_with<H: ServiceHandler>(
        &mut self,
        handler: H,
        options: RegisterOptions,
    ) -> Result<(), ConfigError> {
        self.ensure_registering("service registration")?;

        let class = ClassKey::of::<H>();
        let instance: Arc<H> = Arc::new(handler);
        let descriptor = instance.descriptor();
        let methods = Arc::clone(&instance).methods();
        let names: Vec<&str> = methods.iter().map(|m| m.name()).collect();
        let mapping = binder::discover_mappings(&names, &descriptor);

        info!(
            "registering handler {} for {}",
            class.short_name(),
            descriptor.type_name()
        );

        let binding = HandlerBinding::new(class, descriptor, instance, methods, mapping);
        self.services.register(binding, options)
    }

    /// Register a middleware instance, keyed by its class.
    pub fn register_middleware<M: Middleware>(&mut self, middleware: M) -> Result<(), ConfigError> {
        self.register_middleware_with(middleware, RegisterOptions::default())
    }

    pub fn register_middleware_with<M: Middleware>(
        &mut self,
        middleware: M,
        options: RegisterOptions,
    ) -> Result<(), ConfigError> {
        self.ensure_registering("middleware registration")?;
        self.middlewares
            .register(ClassKey::of::<M>(), Arc::new(middleware), options)
    }

    /// Register a guard instance, keyed by its class. Guards are unscoped:
    /// once registered, every guard runs for every route without a skip
    /// marker.
    pub fn register_guard<G: Guard>(&mut self, guard: G) -> Result<(), ConfigError> {
        self.register_guard_with(guard, RegisterOptions::default())
    }

    pub fn register_guard_with<G: Guard>(
        &mut self,
        guard: G,
        options: RegisterOptions,
    ) -> Result<(), ConfigError> {
        self.ensure_registering("guard registration")?;
        self.guards
            .register(ClassKey::of::<G>(), Arc::new(guard), options)
    }

    /// Bind phase: compute dispatch tables, populate the route metadata
    /// index, and register every service with the transport.
    pub fn bind<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        options: BindOptions,
    ) -> Result<(), ConfigError> {
        if self.state != PipelineState::Registering {
            return Err(ConfigError::AlreadyInitialized {
                what: "dispatch table",
            });
        }

        if self.services.is_empty() {
            warn!("no service handlers registered");
        }

        let tables = dispatch::build(self.services.bindings(), &transport.capabilities())?;
        transport.accept_compression(&options.accept_compression);
        for (descriptor, implementation) in tables.services {
            info!("registered {{/{}}} route", descriptor.type_name());
            transport.register_service(descriptor, implementation);
        }

        self.routes = Some(Arc::new(tables.routes));
        self.state = PipelineState::Bound;
        Ok(())
    }

    /// Install the middleware pipeline. Requires the bind phase; must run
    /// before the guard pipeline.
    pub fn install_middlewares<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        configs: Vec<MiddlewareConfig>,
    ) -> Result<(), ConfigError> {
        match self.state {
            PipelineState::Registering => Err(ConfigError::OrderingViolation {
                step: "middleware installation",
                requirement: "after the dispatch table is bound",
            }),
            PipelineState::Bound => {
                middleware::install(transport, configs, &self.middlewares);
                self.state = PipelineState::MiddlewaresInstalled;
                Ok(())
            }
            _ => Err(ConfigError::AlreadyInitialized {
                what: "middleware pipeline",
            }),
        }
    }

    /// Install the guard pipeline. Strictly the last pipeline step.
    pub fn install_guards<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), ConfigError> {
        match self.state {
            PipelineState::Registering | PipelineState::Bound => {
                Err(ConfigError::OrderingViolation {
                    step: "guard installation",
                    requirement: "after the middleware pipeline is installed",
                })
            }
            PipelineState::MiddlewaresInstalled => {
                let Some(routes) = self.routes.clone() else {
                    return Err(ConfigError::OrderingViolation {
                        step: "guard installation",
                        requirement: "after the dispatch table is bound",
                    });
                };
                let bindings: Vec<GuardBinding> = self
                    .guards
                    .iter()
                    .map(|(class, instance)| GuardBinding {
                        class: class.clone(),
                        instance: instance.clone(),
                    })
                    .collect();
                guard::install(transport, bindings, routes);
                self.state = PipelineState::GuardsInstalled;
                Ok(())
            }
            PipelineState::GuardsInstalled => Err(ConfigError::AlreadyInitialized {
                what: "guard pipeline",
            }),
        }
    }

    /// The route metadata index, available after the bind phase.
    pub fn routes(&self) -> Option<&RouteIndex> {
        self.routes.as_deref()
    }

    /// Number of registered guards.
    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    fn ensure_registering(&self, step: &'static str) -> Result<(), ConfigError> {
        if self.state == PipelineState::Registering {
            Ok(())
        } else {
            Err(ConfigError::OrderingViolation {
                step,
                requirement: "before the dispatch table is bound",
            })
        }
    }
}

impl Default for WirebindServer {
    fn default() -> Self {
        Self::new()
    }
}
