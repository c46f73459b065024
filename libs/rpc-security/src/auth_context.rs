use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretSlice};

use crate::error::AuthContextError;
use crate::property_iter::PropertyIterator;

/// A single identity claim: a non-empty name and an opaque value.
///
/// Several properties in the same context may share a name. Values are
/// often credentials and are redacted from `Debug` output.
#[derive(Debug)]
pub struct Property {
    name: String,
    value: SecretSlice<u8>,
}

impl Property {
    /// Property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw property value.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        self.value.expose_secret()
    }

    /// Property value as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value()).ok()
    }

    fn new(name: String, value: Vec<u8>) -> Self {
        Self {
            name,
            value: SecretSlice::new(value.into_boxed_slice()),
        }
    }
}

/// Layered, reference-counted record of identity claims established by
/// authenticating a connection or a call.
///
/// A context is immutable once built. Cloning it acquires another handle to
/// the same node; dropping a handle releases it. When the last handle goes
/// away the node is destroyed and its parent handle released, so a chain
/// lives exactly as long as its longest-lived holder.
///
/// Contexts chain: a per-call token identity can sit on top of the
/// connection's transport identity without copying it.
///
/// ```
/// use rpc_security::AuthContext;
///
/// let transport = AuthContext::builder()
///     .string_property("transport_security_type", "tls")
///     .build()?;
///
/// let call = AuthContext::chained_to(&transport)
///     .string_property("user", "alice")
///     .peer_identity_property_name("user")
///     .build()?;
///
/// let names: Vec<&str> = call.property_iter().map(|p| p.name()).collect();
/// assert_eq!(names, ["user", "transport_security_type"]);
/// # Ok::<(), rpc_security::AuthContextError>(())
/// ```
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

struct Inner {
    properties: Vec<Property>,
    parent: Option<AuthContext>,
    peer_identity_property_name: Option<String>,
}

impl Drop for Inner {
    // Unwind the parent chain iteratively: the default recursive drop would
    // use one stack frame per uniquely-owned ancestor.
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(ctx) = next {
            next = Arc::into_inner(ctx.inner).and_then(|mut inner| inner.parent.take());
        }
    }
}

impl AuthContext {
    /// Start building a root context (no parent).
    #[must_use]
    pub fn builder() -> AuthContextBuilder {
        AuthContextBuilder::default()
    }

    /// Start building a context chained onto `parent`.
    ///
    /// The new context holds its own handle to `parent`.
    #[must_use]
    pub fn chained_to(parent: &AuthContext) -> AuthContextBuilder {
        AuthContextBuilder {
            parent: Some(parent.clone()),
            ..AuthContextBuilder::default()
        }
    }

    /// Acquire another handle to this context.
    #[must_use]
    pub fn acquire(&self) -> Self {
        self.clone()
    }

    /// Release this handle.
    ///
    /// The context and its chain are destroyed if this was the last handle.
    pub fn release(self) {
        drop(self);
    }

    /// Number of live handles to this node.
    ///
    /// Racy by nature when other threads hold handles; meant for audits and
    /// diagnostics.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether both handles point to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &AuthContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Properties of this node only, in insertion order.
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.inner.properties
    }

    /// The context this one is chained onto.
    #[must_use]
    pub fn parent(&self) -> Option<&AuthContext> {
        self.inner.parent.as_ref()
    }

    /// Name of the property holding the peer identity, if designated.
    ///
    /// The name need not match any property in the chain.
    #[must_use]
    pub fn peer_identity_property_name(&self) -> Option<&str> {
        self.inner.peer_identity_property_name.as_deref()
    }

    /// A context is authenticated when it designates a peer identity property.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.peer_identity_property_name.is_some()
    }

    /// Number of contexts in the chain, this one included.
    #[must_use]
    pub fn chain_depth(&self) -> usize {
        std::iter::successors(Some(self), |ctx| ctx.parent()).count()
    }

    /// Iterate over every property of this context, then of each ancestor.
    #[must_use]
    pub fn property_iter(&self) -> PropertyIterator<'_> {
        PropertyIterator::new(Some(self))
    }

    /// Iterate over the properties named `name` across the whole chain.
    #[must_use]
    pub fn find_properties_by_name(&self, name: &str) -> PropertyIterator<'_> {
        PropertyIterator::filtered(Some(self), name)
    }

    /// Iterate over the peer identity properties.
    ///
    /// Empty when no peer identity property name is designated.
    #[must_use]
    pub fn peer_identity(&self) -> PropertyIterator<'_> {
        PropertyIterator::peer_identity(Some(self))
    }
}

/// Acquire a handle to `ctx`; `None` stays `None`.
#[must_use]
pub fn auth_context_ref(ctx: Option<&AuthContext>) -> Option<AuthContext> {
    ctx.map(AuthContext::acquire)
}

/// Release a handle; releasing `None` does nothing.
pub fn auth_context_unref(ctx: Option<AuthContext>) {
    if let Some(ctx) = ctx {
        ctx.release();
    }
}

// Rendered as a flat list of layers, child first; recursing into the parent
// would use one stack frame per ancestor.
impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(std::iter::successors(Some(self), |ctx| ctx.parent()).map(Layer))
            .finish()
    }
}

struct Layer<'a>(&'a AuthContext);

impl fmt::Debug for Layer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("properties", &self.0.properties())
            .field(
                "peer_identity_property_name",
                &self.0.peer_identity_property_name(),
            )
            .finish()
    }
}

/// Builder for [`AuthContext`].
#[derive(Default)]
pub struct AuthContextBuilder {
    properties: Vec<Property>,
    parent: Option<AuthContext>,
    peer_identity_property_name: Option<String>,
}

impl AuthContextBuilder {
    /// Append a property with a raw value.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.properties.push(Property::new(name.into(), value.into()));
        self
    }

    /// Append a property whose value is a string.
    #[must_use]
    pub fn string_property(self, name: impl Into<String>, value: &str) -> Self {
        self.property(name, value)
    }

    /// Append several properties, preserving their order.
    #[must_use]
    pub fn properties<N, V>(mut self, props: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.properties.extend(
            props
                .into_iter()
                .map(|(name, value)| Property::new(name.into(), value.into())),
        );
        self
    }

    /// Designate the property name that carries the peer identity.
    #[must_use]
    pub fn peer_identity_property_name(mut self, name: impl Into<String>) -> Self {
        self.peer_identity_property_name = Some(name.into());
        self
    }

    /// Build the context with a reference count of one.
    ///
    /// # Errors
    ///
    /// - `EmptyPropertyName` if any property has an empty name
    /// - `EmptyPeerIdentityName` if the peer identity name is empty
    pub fn build(self) -> Result<AuthContext, AuthContextError> {
        if self.properties.iter().any(|p| p.name.is_empty()) {
            return Err(AuthContextError::EmptyPropertyName);
        }
        if self
            .peer_identity_property_name
            .as_deref()
            .is_some_and(str::is_empty)
        {
            return Err(AuthContextError::EmptyPeerIdentityName);
        }

        Ok(AuthContext {
            inner: Arc::new(Inner {
                properties: self.properties,
                parent: self.parent,
                peer_identity_property_name: self.peer_identity_property_name,
            }),
        })
    }
}
