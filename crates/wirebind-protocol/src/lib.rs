//! Wirebind protocol types.
//!
//! This crate is the single source of truth for the metadata a transport
//! and the binding layer exchange: service descriptors with their declared
//! RPC methods, the canonical route-key path format, and the wire-level
//! error codes with their HTTP status mapping.

pub mod descriptor;
pub mod error;
pub mod route;

pub use descriptor::{MethodDescriptor, MethodKind, ServiceDescriptor};
pub use error::{RpcCode, RpcError};
pub use route::RouteKey;
