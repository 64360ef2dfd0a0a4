//! Fatal configuration errors, surfaced synchronously at startup.
//!
//! Everything here means the process is mis-wired and must not begin
//! accepting traffic. Degraded-but-survivable conditions (an unmapped RPC
//! method, a missing middleware instance) are logged instead and deferred
//! to call time.

/// Startup-time configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A second instance of the same class was registered. Two instances
    /// of one middleware double-execute its side effects, so this fails
    /// fast unless the caller opted into multiple instances.
    #[error(
        "{kind} `{class}` is already registered; this usually means the instance was \
         constructed twice (set allow_multiple_instances to opt in)"
    )]
    DuplicateRegistration { kind: &'static str, class: String },

    /// A phase ran out of order (e.g. guards installed before middleware).
    #[error("{step} must run {requirement}")]
    OrderingViolation {
        step: &'static str,
        requirement: &'static str,
    },

    /// A one-time initialization step was invoked again.
    #[error("{what} is already initialized")]
    AlreadyInitialized { what: &'static str },

    /// The service schema declares a method kind the active transport
    /// cannot expose.
    #[error(
        "service `{service}` declares bidi-streaming method `{method}`, \
         which the active transport does not support"
    )]
    UnsupportedMethodKind { service: String, method: String },
}
