//! Request correlation context.

use std::sync::Arc;

/// Immutable carrier for a request correlation identifier.
///
/// A context is created once per request and threaded along the call chain.
/// Binding an identifier never mutates shared state, so concurrent requests
/// each carry their own context without interfering.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    request_id: Option<Arc<str>>,
}

impl RequestContext {
    /// Create a context with no request identifier bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new context with `request_id` bound, leaving `self` untouched.
    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(Arc::from(request_id.into())),
        }
    }

    /// The bound request identifier, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
