//! Route keys — the canonical `/{serviceTypeName}/{MethodName}` path.
//!
//! The route key is the only identifier used to correlate an inbound
//! request with its bound handler metadata. The method segment keeps its
//! declared schema casing (e.g. PascalCase).

use serde::{Deserialize, Serialize};

/// Canonical route identifier for one bound RPC method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    service: String,
    method: String,
}

impl RouteKey {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Parse a request path into a route key.
    ///
    /// Accepts exactly two non-empty segments (`/{service}/{method}`).
    /// Anything else — missing leading slash, empty segments, extra
    /// segments — is not a routed call and yields `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let rest = path.strip_prefix('/')?;
        let (service, method) = rest.split_once('/')?;
        if service.is_empty() || method.is_empty() || method.contains('/') {
            return None;
        }
        Some(Self::new(service, method))
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The wire path form, `/{service}/{method}`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.service, self.method)
    }
}
