//! Method discovery — maps handler method names onto declared RPC methods.
//!
//! Pure and deterministic: identical inputs always produce identical
//! mappings. For each declared method, an exact match on the conventional
//! lowerCamel local name wins; otherwise the first case-insensitive match
//! on the declared name, in handler enumeration order, is used. Unmatched
//! methods stay unmapped — partial implementations of a service are legal
//! and fail per call, not at bind time.

use std::collections::BTreeMap;

use tracing::warn;
use wirebind_protocol::ServiceDescriptor;

/// Compute the RPC-method-name → handler-method-name mapping.
///
/// `handler_methods` must be in the handler's declaration order; ties
/// under the case-insensitive fallback resolve to the first match, and the
/// losing candidates are logged.
pub fn discover_mappings(
    handler_methods: &[&str],
    service: &ServiceDescriptor,
) -> BTreeMap<String, String> {
    let mut mappings = BTreeMap::new();

    for method in service.methods() {
        // Exact match on the lowerCamel local name.
        if let Some(name) = handler_methods.iter().find(|n| **n == method.local_name) {
            mappings.insert(method.name.clone(), (*name).to_string());
            continue;
        }

        // Fallback: case-insensitive match on the declared name.
        let mut candidates = handler_methods
            .iter()
            .filter(|n| n.eq_ignore_ascii_case(&method.name));
        if let Some(first) = candidates.next() {
            let ignored: Vec<&str> = candidates.copied().collect();
            if !ignored.is_empty() {
                warn!(
                    "ambiguous mapping for {}.{}: using `{}`, ignoring {:?}",
                    service.type_name(),
                    method.name,
                    first,
                    ignored
                );
            }
            mappings.insert(method.name.clone(), (*first).to_string());
        }
    }

    mappings
}
