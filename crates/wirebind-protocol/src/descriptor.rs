//! Service and method descriptors — externally supplied RPC metadata.
//!
//! A [`ServiceDescriptor`] mirrors what a schema compiler emits for one
//! RPC service: a stable fully-qualified type name plus an ordered list of
//! method descriptors. Descriptors are immutable once constructed; the
//! binding layer only ever reads them.

use serde::{Deserialize, Serialize};

/// Call shape of a single RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl MethodKind {
    /// Whether the client sends a stream of request messages.
    pub fn client_streams(&self) -> bool {
        matches!(self, Self::ClientStreaming | Self::BidiStreaming)
    }

    /// Whether the server sends a stream of response messages.
    pub fn server_streams(&self) -> bool {
        matches!(self, Self::ServerStreaming | Self::BidiStreaming)
    }
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unary => "unary",
            Self::ClientStreaming => "client_streaming",
            Self::ServerStreaming => "server_streaming",
            Self::BidiStreaming => "bidi_streaming",
        };
        f.write_str(s)
    }
}

/// One remote-callable operation as declared by the service schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Declared method name in its schema casing (e.g. "Say").
    pub name: String,
    /// Conventional lowerCamel local name (e.g. "say").
    #[serde(rename = "localName")]
    pub local_name: String,
    /// Call shape.
    pub kind: MethodKind,
    /// Input message schema reference.
    pub input: String,
    /// Output message schema reference.
    pub output: String,
}

impl MethodDescriptor {
    /// Create a descriptor, deriving the local name from `name` by the
    /// lowerCamel convention (`Say` → `say`, `SayMany` → `sayMany`).
    pub fn new(
        name: impl Into<String>,
        kind: MethodKind,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let local_name = lower_first(&name);
        Self {
            name,
            local_name,
            kind,
            input: input.into(),
            output: output.into(),
        }
    }

    /// Override the conventional local name with an explicit one.
    pub fn with_local_name(mut self, local_name: impl Into<String>) -> Self {
        self.local_name = local_name.into();
        self
    }
}

/// Descriptor for one RPC service: stable type name plus its declared
/// methods, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Fully-qualified service type name (e.g. "connectrpc.eliza.v1.ElizaService").
    #[serde(rename = "typeName")]
    type_name: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(type_name: impl Into<String>, methods: Vec<MethodDescriptor>) -> Self {
        Self {
            type_name: type_name.into(),
            methods,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declared methods, in declaration order.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Look up a method by its declared (schema-cased) name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Lowercase the first character (`SayMany` → `sayMany`).
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the first character (`sayMany` → `SayMany`).
pub fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
