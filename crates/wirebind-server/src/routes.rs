//! Route metadata index — built once at bind time, read-only afterwards.
//!
//! One entry exists per declared RPC method, mapped or not, so the guard
//! pipeline can be consulted even for methods that will fail with
//! "unimplemented". Entries are never removed during a server's lifetime;
//! steady-state lookups need no lock.

use std::collections::HashMap;
use std::sync::Arc;

use wirebind_protocol::RouteKey;
use wirebind_transport::MethodHandler;

use crate::handler::ServiceHandler;
use crate::stores::ClassKey;

/// Resolved binding for one route.
pub struct RouteMetadata {
    key: RouteKey,
    owner: ClassKey,
    instance: Arc<dyn ServiceHandler>,
    handler_method_name: Option<String>,
    handler: Option<MethodHandler>,
    skip_guards: bool,
}

impl RouteMetadata {
    pub(crate) fn new(
        key: RouteKey,
        owner: ClassKey,
        instance: Arc<dyn ServiceHandler>,
        handler_method_name: Option<String>,
        handler: Option<MethodHandler>,
        skip_guards: bool,
    ) -> Self {
        Self {
            key,
            owner,
            instance,
            handler_method_name,
            handler,
            skip_guards,
        }
    }

    pub fn key(&self) -> &RouteKey {
        &self.key
    }

    /// Class identity of the owning handler.
    pub fn owner(&self) -> &ClassKey {
        &self.owner
    }

    pub fn instance(&self) -> &Arc<dyn ServiceHandler> {
        &self.instance
    }

    /// Handler-side method name, when the route is mapped.
    pub fn handler_method_name(&self) -> Option<&str> {
        self.handler_method_name.as_deref()
    }

    /// The bound callable, when the route is mapped.
    pub fn handler(&self) -> Option<&MethodHandler> {
        self.handler.as_ref()
    }

    pub fn is_mapped(&self) -> bool {
        self.handler.is_some()
    }

    /// Whether guards are bypassed for this route.
    pub fn skips_guards(&self) -> bool {
        self.skip_guards
    }
}

impl std::fmt::Debug for RouteMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMetadata")
            .field("key", &self.key)
            .field("owner", &self.owner)
            .field("handler_method_name", &self.handler_method_name)
            .field("skip_guards", &self.skip_guards)
            .finish()
    }
}

/// Route path → metadata, for every declared method of every bound service.
#[derive(Debug, Default)]
pub struct RouteIndex {
    routes: HashMap<String, RouteMetadata>,
}

impl RouteIndex {
    pub(crate) fn insert(&mut self, metadata: RouteMetadata) {
        self.routes.insert(metadata.key.path(), metadata);
    }

    /// Metadata for a route path (`/{service}/{Method}`), if bound.
    pub fn get(&self, path: &str) -> Option<&RouteMetadata> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteMetadata> {
        self.routes.values()
    }
}
