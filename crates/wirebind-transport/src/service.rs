//! Transport-facing handler callables and the per-service method table.
//!
//! [`MethodHandler`] is a sum type over the four method kinds; each
//! variant carries the exact signature the transport invokes for that
//! kind. A [`ServiceImpl`] maps lowerCamel local method names to their
//! handlers — the implementation object a Connect-style router consumes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use wirebind_protocol::{MethodKind, RpcError};

/// Message payload currency between transport and handlers.
pub type Payload = serde_json::Value;

/// Stream of request payloads (client-streaming input).
pub type PayloadStream = BoxStream<'static, Payload>;

/// Stream of response payloads (server-streaming output). Streams are
/// lazy: items are produced only as the peer polls, so dropping the
/// stream cancels the handler's production.
pub type ResponseStream = BoxStream<'static, Result<Payload, RpcError>>;

type UnaryFn = Arc<dyn Fn(Payload) -> BoxFuture<'static, Result<Payload, RpcError>> + Send + Sync>;
type ClientStreamingFn =
    Arc<dyn Fn(PayloadStream) -> BoxFuture<'static, Result<Payload, RpcError>> + Send + Sync>;
type ServerStreamingFn = Arc<dyn Fn(Payload) -> ResponseStream + Send + Sync>;
type BidiStreamingFn = Arc<dyn Fn(PayloadStream) -> ResponseStream + Send + Sync>;

/// A bound handler callable, shaped by its method kind.
#[derive(Clone)]
pub enum MethodHandler {
    Unary(UnaryFn),
    ClientStreaming(ClientStreamingFn),
    ServerStreaming(ServerStreamingFn),
    BidiStreaming(BidiStreamingFn),
}

impl MethodHandler {
    pub fn unary<F, Fut>(f: F) -> Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::Unary(Arc::new(move |payload| Box::pin(f(payload))))
    }

    pub fn client_streaming<F, Fut>(f: F) -> Self
    where
        F: Fn(PayloadStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::ClientStreaming(Arc::new(move |input| Box::pin(f(input))))
    }

    pub fn server_streaming<F, S>(f: F) -> Self
    where
        F: Fn(Payload) -> S + Send + Sync + 'static,
        S: futures_util::Stream<Item = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::ServerStreaming(Arc::new(move |payload| f(payload).boxed()))
    }

    pub fn bidi_streaming<F, S>(f: F) -> Self
    where
        F: Fn(PayloadStream) -> S + Send + Sync + 'static,
        S: futures_util::Stream<Item = Result<Payload, RpcError>> + Send + 'static,
    {
        Self::BidiStreaming(Arc::new(move |input| f(input).boxed()))
    }

    pub fn kind(&self) -> MethodKind {
        match self {
            Self::Unary(_) => MethodKind::Unary,
            Self::ClientStreaming(_) => MethodKind::ClientStreaming,
            Self::ServerStreaming(_) => MethodKind::ServerStreaming,
            Self::BidiStreaming(_) => MethodKind::BidiStreaming,
        }
    }
}

impl std::fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MethodHandler::{:?}", self.kind())
    }
}

/// Implementation object for one service: lowerCamel local method name →
/// handler callable. Every declared method is present after bind (unmapped
/// methods carry an unimplemented stub).
#[derive(Clone, Debug, Default)]
pub struct ServiceImpl {
    methods: BTreeMap<String, MethodHandler>,
}

impl ServiceImpl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, local_name: impl Into<String>, handler: MethodHandler) {
        self.methods.insert(local_name.into(), handler);
    }

    pub fn get(&self, local_name: &str) -> Option<&MethodHandler> {
        self.methods.get(local_name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}
