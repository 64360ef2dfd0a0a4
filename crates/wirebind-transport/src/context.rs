//! Per-call context threaded through the before-dispatch hooks.
//!
//! Each inbound call gets one [`CallContext`]. Middleware receives it
//! mutably and may stamp headers or extensions (e.g. a request id); the
//! guard pipeline reads it immutably afterwards, so authorization observes
//! post-middleware state.

use std::collections::BTreeMap;

use serde_json::Value;

/// Raw request view: path, headers, and middleware-stamped extensions.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    path: String,
    headers: BTreeMap<String, String>,
    extensions: serde_json::Map<String, Value>,
}

impl RequestParts {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header lookup, case-insensitive (keys are stored lowercased).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Extension values stamped by earlier pipeline stages.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub fn insert_extension(&mut self, key: impl Into<String>, value: Value) {
        self.extensions.insert(key.into(), value);
    }

    pub fn extensions(&self) -> &serde_json::Map<String, Value> {
        &self.extensions
    }
}

/// Raw response view available before dispatch. Hooks may set headers;
/// the status is derived from the call outcome by the transport.
#[derive(Debug, Clone, Default)]
pub struct ResponseParts {
    headers: BTreeMap<String, String>,
}

impl ResponseParts {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// The in-flight request/response pair handed to before-dispatch hooks.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    request: RequestParts,
    response: ResponseParts,
}

impl CallContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            request: RequestParts {
                path: path.into(),
                ..RequestParts::default()
            },
            response: ResponseParts::default(),
        }
    }

    pub fn request(&self) -> &RequestParts {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestParts {
        &mut self.request
    }

    pub fn response(&self) -> &ResponseParts {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseParts {
        &mut self.response
    }
}
