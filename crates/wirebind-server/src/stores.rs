//! Instance stores — insertion-ordered registries keyed by class identity.
//!
//! Registration is keyed by the concrete Rust type of the registered
//! instance ([`ClassKey`]), so a second accidental instantiation of the
//! same middleware or handler class is caught at startup. Stores are
//! mutated only during the registration phase and read-only afterwards.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

use wirebind_protocol::ServiceDescriptor;

use crate::error::ConfigError;
use crate::handler::{HandlerMethod, ServiceHandler};

/// Runtime identity of a registered class: its `TypeId` plus type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassKey {
    id: TypeId,
    name: &'static str,
}

impl ClassKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully-qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, for logs and error messages.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl std::fmt::Display for ClassKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Options accepted by every `register*` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Allow a second registration of the same class. The new instance
    /// replaces the stored one in place, preserving registration order.
    pub allow_multiple_instances: bool,
}

/// Insertion-ordered store of one instance per class.
pub(crate) struct InstanceStore<T: ?Sized> {
    kind: &'static str,
    entries: Vec<(ClassKey, Arc<T>)>,
}

impl<T: ?Sized> InstanceStore<T> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub(crate) fn register(
        &mut self,
        class: ClassKey,
        instance: Arc<T>,
        options: RegisterOptions,
    ) -> Result<(), ConfigError> {
        if let Some(pos) = self.entries.iter().position(|(key, _)| *key == class) {
            if !options.allow_multiple_instances {
                return Err(ConfigError::DuplicateRegistration {
                    kind: self.kind,
                    class: class.short_name().to_string(),
                });
            }
            self.entries[pos].1 = instance;
            return Ok(());
        }
        self.entries.push((class, instance));
        Ok(())
    }

    /// Registered instance for `class`, if any. Never fails.
    pub(crate) fn get(&self, class: &ClassKey) -> Option<Arc<T>> {
        self.entries
            .iter()
            .find(|(key, _)| key == class)
            .map(|(_, instance)| instance.clone())
    }

    /// (class, instance) pairs in registration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ClassKey, &Arc<T>)> {
        self.entries.iter().map(|(key, instance)| (key, instance))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A registered handler with everything the bind phase needs: the
/// instance, its declared method table, and the name mapping computed at
/// registration time. Read-only after the bind phase.
pub(crate) struct HandlerBinding {
    class: ClassKey,
    descriptor: ServiceDescriptor,
    instance: Arc<dyn ServiceHandler>,
    methods: Vec<HandlerMethod>,
    mapping: BTreeMap<String, String>,
}

impl HandlerBinding {
    pub(crate) fn new(
        class: ClassKey,
        descriptor: ServiceDescriptor,
        instance: Arc<dyn ServiceHandler>,
        methods: Vec<HandlerMethod>,
        mapping: BTreeMap<String, String>,
    ) -> Self {
        Self {
            class,
            descriptor,
            instance,
            methods,
            mapping,
        }
    }

    pub(crate) fn class(&self) -> &ClassKey {
        &self.class
    }

    pub(crate) fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub(crate) fn instance(&self) -> &Arc<dyn ServiceHandler> {
        &self.instance
    }

    pub(crate) fn methods(&self) -> &[HandlerMethod] {
        &self.methods
    }

    /// RPC method name → handler method name.
    pub(crate) fn mapping(&self) -> &BTreeMap<String, String> {
        &self.mapping
    }
}

/// Store of handler bindings, one per handler class.
pub(crate) struct ServiceStore {
    bindings: Vec<HandlerBinding>,
}

impl ServiceStore {
    pub(crate) fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub(crate) fn register(
        &mut self,
        binding: HandlerBinding,
        options: RegisterOptions,
    ) -> Result<(), ConfigError> {
        if let Some(pos) = self
            .bindings
            .iter()
            .position(|b| b.class == binding.class)
        {
            if !options.allow_multiple_instances {
                return Err(ConfigError::DuplicateRegistration {
                    kind: "service handler",
                    class: binding.class.short_name().to_string(),
                });
            }
            self.bindings[pos] = binding;
            return Ok(());
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub(crate) fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
