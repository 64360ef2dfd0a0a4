//! End-to-end pipeline tests — registration, bind, middleware and guard
//! installation, and full calls through the in-process transport.

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use serde_json::json;
use wirebind::server::BoxError;
use wirebind::transport::RequestParts;
use wirebind::{
    BindOptions, CallContext, ConfigError, Guard, GuardContext, HandlerMethod, LocalTransport,
    MethodDescriptor, MethodKind, Middleware, MiddlewareConfig, RpcCode, ServiceDescriptor,
    ServiceHandler, WirebindServer,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn eliza_descriptor() -> ServiceDescriptor {
    ServiceDescriptor::new(
        "connectrpc.eliza.v1.ElizaService",
        vec![
            MethodDescriptor::new("Say", MethodKind::Unary, "SayRequest", "SayResponse"),
            MethodDescriptor::new(
                "SayMany",
                MethodKind::ClientStreaming,
                "SayRequest",
                "SayResponses",
            ),
            MethodDescriptor::new(
                "ListenMany",
                MethodKind::ServerStreaming,
                "SayRequest",
                "SayResponse",
            ),
        ],
    )
}

/// Eliza-style echo handler. `say` is skip-marked for guards; `sayMany`
/// and `listenMany` are guarded. Every invocation bumps `calls`.
struct ElizaHandler {
    calls: Arc<AtomicUsize>,
}

impl ElizaHandler {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { calls: calls.clone() }, calls)
    }
}

impl ServiceHandler for ElizaHandler {
    fn descriptor(&self) -> ServiceDescriptor {
        eliza_descriptor()
    }

    fn methods(self: Arc<Self>) -> Vec<HandlerMethod> {
        let say_calls = self.calls.clone();
        let many_calls = self.calls.clone();
        let listen_calls = self.calls.clone();

        vec![
            HandlerMethod::unary("say", move |req| {
                let calls = say_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let sentence = req["sentence"].as_str().unwrap_or_default().to_string();
                    Ok(json!({ "sentence": format!("You said: {sentence}") }))
                }
            })
            .skip_guards(),
            HandlerMethod::client_streaming("sayMany", move |mut input| {
                let calls = many_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let mut responses = Vec::new();
                    while let Some(req) = input.next().await {
                        let sentence = req["sentence"].as_str().unwrap_or_default();
                        responses.push(json!({ "sentence": format!("You said: {sentence}") }));
                    }
                    Ok(json!({ "responses": responses }))
                }
            }),
            HandlerMethod::server_streaming("listenMany", move |req| {
                listen_calls.fetch_add(1, Ordering::SeqCst);
                let words: Vec<String> = req["sentence"]
                    .as_str()
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(String::from)
                    .collect();
                stream::iter(words).map(|word| Ok(json!({ "sentence": format!("Echo: {word}") })))
            }),
        ]
    }
}

/// Records every routed call it sees, in order.
struct LoggerMiddleware {
    events: Arc<Mutex<Vec<String>>>,
}

impl Middleware for LoggerMiddleware {
    fn handle(
        &self,
        ctx: &mut CallContext,
    ) -> impl std::future::Future<Output = Result<(), BoxError>> + Send {
        self.events
            .lock()
            .push(format!("logger:{}", ctx.request().path()));
        async { Ok(()) }
    }
}

struct DurationMiddleware {
    events: Arc<Mutex<Vec<String>>>,
}

impl Middleware for DurationMiddleware {
    fn handle(
        &self,
        ctx: &mut CallContext,
    ) -> impl std::future::Future<Output = Result<(), BoxError>> + Send {
        self.events
            .lock()
            .push(format!("duration:{}", ctx.request().path()));
        async { Ok(()) }
    }
}

/// Stamps a request id for later pipeline stages to observe.
struct RequestIdMiddleware;

impl Middleware for RequestIdMiddleware {
    fn handle(
        &self,
        ctx: &mut CallContext,
    ) -> impl std::future::Future<Output = Result<(), BoxError>> + Send {
        ctx.request_mut()
            .insert_extension("requestId", json!(uuid::Uuid::new_v4().to_string()));
        async { Ok(()) }
    }
}

struct FailingMiddleware;

impl Middleware for FailingMiddleware {
    fn handle(
        &self,
        _ctx: &mut CallContext,
    ) -> impl std::future::Future<Output = Result<(), BoxError>> + Send {
        async { Err("connection pool exhausted".into()) }
    }
}

struct DenyAllGuard;

impl Guard for DenyAllGuard {
    fn can_activate(
        &self,
        _ctx: &GuardContext<'_>,
    ) -> impl std::future::Future<Output = Result<bool, BoxError>> + Send {
        async { Ok(false) }
    }
}

/// Bearer-token check on the authorization header.
struct AuthGuard;

fn has_bearer_token(request: &RequestParts) -> bool {
    request
        .header("authorization")
        .map(|v| v.starts_with("Bearer "))
        .unwrap_or(false)
}

impl Guard for AuthGuard {
    fn can_activate(
        &self,
        ctx: &GuardContext<'_>,
    ) -> impl std::future::Future<Output = Result<bool, BoxError>> + Send {
        let ok = has_bearer_token(ctx.request());
        async move { Ok(ok) }
    }
}

/// Records what it observed and always allows.
struct RecordingGuard {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Guard for RecordingGuard {
    fn can_activate(
        &self,
        ctx: &GuardContext<'_>,
    ) -> impl std::future::Future<Output = Result<bool, BoxError>> + Send {
        let request_id = ctx
            .request()
            .extension("requestId")
            .and_then(|v| v.as_str())
            .unwrap_or("<missing>")
            .to_string();
        self.seen
            .lock()
            .push(format!("{}:{}", ctx.class(), request_id));
        async { Ok(true) }
    }
}

struct BrokenGuard;

impl Guard for BrokenGuard {
    fn can_activate(
        &self,
        _ctx: &GuardContext<'_>,
    ) -> impl std::future::Future<Output = Result<bool, BoxError>> + Send {
        async { Err("token store unavailable".into()) }
    }
}

/// Bind + install both pipelines in the canonical order.
fn install_pipelines(
    server: &mut WirebindServer,
    transport: &mut LocalTransport,
    configs: Vec<MiddlewareConfig>,
) {
    server.bind(transport, BindOptions::default()).unwrap();
    server.install_middlewares(transport, configs).unwrap();
    server.install_guards(transport).unwrap();
}

const SAY: &str = "/connectrpc.eliza.v1.ElizaService/Say";
const SAY_MANY: &str = "/connectrpc.eliza.v1.ElizaService/SayMany";

// ─────────────────────────────────────────────────────────────────────────────
// Scenario A — name mapping and dispatch
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn say_maps_and_dispatches() {
    init_tracing();
    let (handler, calls) = ElizaHandler::new();
    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    let mut transport = LocalTransport::new();
    server.bind(&mut transport, BindOptions::default()).unwrap();

    assert_eq!(transport.services().len(), 1);
    assert!(transport.has_route(SAY));

    let result = transport
        .call_unary(SAY, &[], json!({"sentence": "hello"}))
        .await
        .unwrap();
    assert_eq!(result["sentence"], "You said: hello");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario B — middleware scoping and ordering
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scoped_middleware_runs_only_for_its_routes_in_order() {
    init_tracing();
    let events = Arc::new(Mutex::new(Vec::new()));
    let (handler, _calls) = ElizaHandler::new();

    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    server
        .register_middleware(LoggerMiddleware { events: events.clone() })
        .unwrap();
    server
        .register_middleware(DurationMiddleware { events: events.clone() })
        .unwrap();

    let mut transport = LocalTransport::new();
    server.bind(&mut transport, BindOptions::default()).unwrap();
    server
        .install_middlewares(
            &mut transport,
            vec![
                MiddlewareConfig::global::<LoggerMiddleware>(),
                MiddlewareConfig::for_methods::<DurationMiddleware, _, _>(
                    &eliza_descriptor(),
                    ["sayMany"],
                ),
            ],
        )
        .unwrap();
    server.install_guards(&mut transport).unwrap();

    transport.call_unary(SAY, &[], json!({"sentence": "x"})).await.unwrap();
    assert_eq!(*events.lock(), vec![format!("logger:{SAY}")]);

    events.lock().clear();
    transport
        .call_client_streaming(
            SAY_MANY,
            &[],
            stream::iter(vec![json!({"sentence": "a"})]).boxed(),
        )
        .await
        .unwrap();
    assert_eq!(
        *events.lock(),
        vec![format!("logger:{SAY_MANY}"), format!("duration:{SAY_MANY}")]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario C — guards deny everything except skip-marked routes
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deny_all_guard_spares_only_skip_marked_routes() {
    init_tracing();
    let (handler, calls) = ElizaHandler::new();
    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    server.register_guard(DenyAllGuard).unwrap();

    let mut transport = LocalTransport::new();
    install_pipelines(&mut server, &mut transport, vec![]);

    // `say` carries the skip marker, so it succeeds.
    let result = transport
        .call_unary(SAY, &[], json!({"sentence": "hi"}))
        .await
        .unwrap();
    assert_eq!(result["sentence"], "You said: hi");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Every other route is denied before the handler runs.
    let err = transport
        .call_client_streaming(SAY_MANY, &[], stream::empty().boxed())
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcCode::PermissionDenied);
    assert_eq!(err.http_status(), 403);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn guards_run_even_for_unmapped_methods() {
    init_tracing();

    // Handler implementing nothing: all routes are unimplemented stubs.
    struct EmptyHandler;
    impl ServiceHandler for EmptyHandler {
        fn descriptor(&self) -> ServiceDescriptor {
            eliza_descriptor()
        }
        fn methods(self: Arc<Self>) -> Vec<HandlerMethod> {
            Vec::new()
        }
    }

    let mut server = WirebindServer::new();
    server.register_service(EmptyHandler).unwrap();
    server.register_guard(DenyAllGuard).unwrap();
    let mut transport = LocalTransport::new();
    install_pipelines(&mut server, &mut transport, vec![]);

    // The guard denies before the unimplemented stub is reached.
    let err = transport.call_unary(SAY, &[], json!({})).await.unwrap_err();
    assert_eq!(err.code, RpcCode::PermissionDenied);
}

// ─────────────────────────────────────────────────────────────────────────────
// Guard semantics
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bearer_auth_guard_checks_headers() {
    init_tracing();
    let (handler, _calls) = ElizaHandler::new();
    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    server.register_guard(AuthGuard).unwrap();
    let mut transport = LocalTransport::new();
    install_pipelines(&mut server, &mut transport, vec![]);

    let ok = transport
        .call_client_streaming(
            SAY_MANY,
            &[("Authorization", "Bearer secret")],
            stream::iter(vec![json!({"sentence": "a"})]).boxed(),
        )
        .await;
    assert!(ok.is_ok());

    let err = transport
        .call_client_streaming(SAY_MANY, &[], stream::empty().boxed())
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcCode::PermissionDenied);
}

#[tokio::test]
async fn guards_observe_post_middleware_state() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (handler, _calls) = ElizaHandler::new();

    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    server.register_middleware(RequestIdMiddleware).unwrap();
    server
        .register_guard(RecordingGuard { seen: seen.clone() })
        .unwrap();

    let mut transport = LocalTransport::new();
    install_pipelines(
        &mut server,
        &mut transport,
        vec![MiddlewareConfig::global::<RequestIdMiddleware>()],
    );

    transport
        .call_client_streaming(SAY_MANY, &[], stream::empty().boxed())
        .await
        .unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    // The guard saw the request id the middleware stamped.
    assert!(seen[0].starts_with("ElizaHandler:"));
    assert!(!seen[0].ends_with("<missing>"));
}

#[tokio::test]
async fn guard_errors_fail_closed() {
    init_tracing();
    let (handler, calls) = ElizaHandler::new();
    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    server.register_guard(BrokenGuard).unwrap();
    let mut transport = LocalTransport::new();
    install_pipelines(&mut server, &mut transport, vec![]);

    let err = transport
        .call_client_streaming(SAY_MANY, &[], stream::empty().boxed())
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcCode::PermissionDenied);
    assert!(err.message.contains("token store unavailable"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_route_paths_bypass_middleware_and_guards() {
    init_tracing();
    let events = Arc::new(Mutex::new(Vec::new()));
    let (handler, _calls) = ElizaHandler::new();

    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    server
        .register_middleware(LoggerMiddleware { events: events.clone() })
        .unwrap();
    server.register_guard(DenyAllGuard).unwrap();

    let mut transport = LocalTransport::new();
    install_pipelines(
        &mut server,
        &mut transport,
        vec![MiddlewareConfig::global::<LoggerMiddleware>()],
    );

    // A single-segment path is not a routed call: the deny-all guard does
    // not fire, the logger does not fire, and dispatch fails on lookup.
    let err = transport.call_unary("/health", &[], json!({})).await.unwrap_err();
    assert_eq!(err.code, RpcCode::Unimplemented);
    assert!(events.lock().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware failure semantics
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn middleware_error_aborts_before_handler() {
    init_tracing();
    let (handler, calls) = ElizaHandler::new();
    let mut server = WirebindServer::new();
    server.register_service(handler).unwrap();
    server.register_middleware(FailingMiddleware).unwrap();

    let mut transport = LocalTransport::new();
    install_pipelines(
        &mut server,
        &mut transport,
        vec![MiddlewareConfig::global::<FailingMiddleware>()],
    );

    let err = transport
        .call_unary(SAY, &[], json!({"sentence": "x"}))
        .await
        .unwrap_err();
    assert_eq!(err.code, RpcCode::Internal);
    assert!(err.message.contains("connection pool exhausted"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenario D and hermetic contexts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn duplicate_middleware_registration_fails_at_startup() {
    init_tracing();
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut server = WirebindServer::new();
    server
        .register_middleware(LoggerMiddleware { events: events.clone() })
        .unwrap();
    let err = server
        .register_middleware(LoggerMiddleware { events })
        .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateRegistration { .. }));
}

#[tokio::test]
async fn independent_servers_share_no_state() {
    init_tracing();
    let (first, first_calls) = ElizaHandler::new();
    let (second, second_calls) = ElizaHandler::new();

    let mut server_a = WirebindServer::new();
    server_a.register_service(first).unwrap();
    let mut transport_a = LocalTransport::new();
    server_a.bind(&mut transport_a, BindOptions::default()).unwrap();

    // Same handler class registers cleanly in a second context.
    let mut server_b = WirebindServer::new();
    server_b.register_service(second).unwrap();
    let mut transport_b = LocalTransport::new();
    server_b.bind(&mut transport_b, BindOptions::default()).unwrap();

    transport_a.call_unary(SAY, &[], json!({"sentence": "a"})).await.unwrap();
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    transport_b.call_unary(SAY, &[], json!({"sentence": "b"})).await.unwrap();
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}
