//! Request-scoped context.
//!
//! [`RequestContext`] carries values derived by outer stages (trace id,
//! client identity) to inner stages and to the handler. It is immutable:
//! [`RequestContext::with_value`] returns a new context and leaves the
//! receiver untouched, so a value is only visible to the stages the derived
//! context is handed to, never to the stages that ran before it existed.
//!
//! Keys are a closed set of [`ContextKey`] variants rather than strings.
//! Applications that need their own request-scoped data use the typed
//! extension slots, keyed by Rust type.
//!
//! # Example
//!
//! ```
//! use bulwark_middleware::context::{ContextKey, RequestContext};
//!
//! let outer = RequestContext::new();
//! let inner = outer.with_value(ContextKey::TraceId, "abc123");
//!
//! assert_eq!(inner.trace_id(), Some("abc123"));
//! assert_eq!(outer.trace_id(), None);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Keys for values propagated through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ContextKey {
    /// Trace identifier for the request.
    TraceId,
    /// Resolved client identity (host part only).
    ClientIdentity,
}

type Extensions = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Immutable, append-only request context.
///
/// Cloning is cheap; derived contexts share storage with their parent until
/// a value is added.
#[derive(Clone, Default)]
pub struct RequestContext {
    values: Arc<HashMap<ContextKey, Arc<str>>>,
    extensions: Arc<Extensions>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new context with `key` bound to `value`.
    ///
    /// Bindings are append-only: if `key` is already bound the outer value
    /// stands and `value` is ignored.
    #[must_use]
    pub fn with_value(&self, key: ContextKey, value: impl Into<Arc<str>>) -> Self {
        if self.values.contains_key(&key) {
            return self.clone();
        }
        let mut values = HashMap::clone(&self.values);
        values.insert(key, value.into());
        Self {
            values: Arc::new(values),
            extensions: Arc::clone(&self.extensions),
        }
    }

    /// Returns the value bound to `key`, if any.
    #[must_use]
    pub fn value(&self, key: ContextKey) -> Option<&str> {
        self.values.get(&key).map(AsRef::as_ref)
    }

    /// Returns the trace id, if the trace stage ran.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.value(ContextKey::TraceId)
    }

    /// Returns the client identity, if the trace stage ran.
    #[must_use]
    pub fn client_identity(&self) -> Option<&str> {
        self.value(ContextKey::ClientIdentity)
    }

    /// Returns a new context carrying `value` in the slot for its type.
    ///
    /// As with [`RequestContext::with_value`], an occupied slot keeps its
    /// first value.
    #[must_use]
    pub fn with_extension<T: Send + Sync + 'static>(&self, value: T) -> Self {
        if self.extensions.contains_key(&TypeId::of::<T>()) {
            return self.clone();
        }
        let mut extensions = HashMap::clone(&self.extensions);
        extensions.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            values: Arc::clone(&self.values),
            extensions: Arc::new(extensions),
        }
    }

    /// Returns the extension of type `T`, if any.
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("values", &self.values)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
