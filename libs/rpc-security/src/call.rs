//! Minimal call handle and per-call context store.
//!
//! The RPC runtime owns the real call object; this is the surface the
//! security contexts need from it: which side initiated the call, and a
//! keyed store whose values are destroyed with the call.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Which side of the RPC a call object represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSide {
    Client,
    Server,
}

/// Well-known slots of the per-call context store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextSlot {
    /// Client or server security context.
    Security,
    /// Tracing/census data.
    Tracing,
}

/// Keyed per-call attachment store.
///
/// Replacing or removing a value drops it; dropping the store drops every
/// value it still holds.
#[derive(Default)]
pub struct CallContext {
    slots: HashMap<ContextSlot, Box<dyn Any + Send + Sync>>,
}

impl CallContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `slot`, if present and of type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, slot: ContextSlot) -> Option<&T> {
        self.slots.get(&slot).and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutable access to the value stored under `slot`, if of type `T`.
    pub fn get_mut<T: Any>(&mut self, slot: ContextSlot) -> Option<&mut T> {
        self.slots.get_mut(&slot).and_then(|v| v.downcast_mut::<T>())
    }

    /// Store `value` under `slot`, destroying any previous value.
    pub fn set<T: Any + Send + Sync>(&mut self, slot: ContextSlot, value: T) {
        if self.slots.insert(slot, Box::new(value)).is_some() {
            tracing::trace!(?slot, "replaced call context value");
        }
    }

    /// Destroy the value under `slot`. Returns whether one was present.
    pub fn remove(&mut self, slot: ContextSlot) -> bool {
        self.slots.remove(&slot).is_some()
    }

    #[must_use]
    pub fn contains(&self, slot: ContextSlot) -> bool {
        self.slots.contains_key(&slot)
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots.keys()).finish()
    }
}

/// An RPC call as seen by the security layer.
#[derive(Debug)]
pub struct Call {
    side: CallSide,
    method: String,
    context: CallContext,
}

impl Call {
    /// A call initiated by this process.
    #[must_use]
    pub fn client(method: impl Into<String>) -> Self {
        Self::new(CallSide::Client, method)
    }

    /// A call received by a server in this process.
    #[must_use]
    pub fn server(method: impl Into<String>) -> Self {
        Self::new(CallSide::Server, method)
    }

    #[must_use]
    pub fn new(side: CallSide, method: impl Into<String>) -> Self {
        Self {
            side,
            method: method.into(),
            context: CallContext::new(),
        }
    }

    #[must_use]
    pub fn side(&self) -> CallSide {
        self.side
    }

    #[must_use]
    pub fn is_client(&self) -> bool {
        self.side == CallSide::Client
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut CallContext {
        &mut self.context
    }
}
