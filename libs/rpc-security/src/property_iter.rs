//! Enumeration of the properties of an [`AuthContext`] chain.

use std::iter::FusedIterator;

use crate::auth_context::{AuthContext, Property};

/// Cursor over the properties of a context and all of its ancestors.
///
/// Properties are yielded child first, then parent, grandparent and so on;
/// within one context they come in insertion order. A filtered iterator
/// yields only properties whose name equals the filter exactly, but walks
/// the same chain.
///
/// The iterator borrows the context it was created from and never owns a
/// handle. An iterator created from `None` is empty.
#[derive(Debug, Clone)]
pub struct PropertyIterator<'a> {
    ctx: Option<&'a AuthContext>,
    index: usize,
    name: Option<String>,
}

impl<'a> PropertyIterator<'a> {
    /// Iterate over every property in the chain starting at `ctx`.
    #[must_use]
    pub fn new(ctx: Option<&'a AuthContext>) -> Self {
        Self {
            ctx,
            index: 0,
            name: None,
        }
    }

    /// Iterate over properties named `name` in the chain starting at `ctx`.
    #[must_use]
    pub fn filtered(ctx: Option<&'a AuthContext>, name: &str) -> Self {
        Self {
            ctx,
            index: 0,
            name: Some(name.to_owned()),
        }
    }

    /// Iterate over the peer identity properties of `ctx`.
    ///
    /// Empty if `ctx` is `None` or has no peer identity property name.
    #[must_use]
    pub fn peer_identity(ctx: Option<&'a AuthContext>) -> Self {
        match ctx.and_then(AuthContext::peer_identity_property_name) {
            Some(name) => Self::filtered(ctx, name),
            None => Self::empty(),
        }
    }

    /// An iterator that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(None)
    }

    /// The name filter, if any.
    #[must_use]
    pub fn filter_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<'a> Iterator for PropertyIterator<'a> {
    type Item = &'a Property;

    fn next(&mut self) -> Option<&'a Property> {
        loop {
            let ctx = self.ctx?;
            if let Some(prop) = ctx.properties().get(self.index) {
                self.index += 1;
                match self.name.as_deref() {
                    Some(name) if prop.name() != name => {}
                    _ => return Some(prop),
                }
            } else {
                // Exhausted this node: continue with the parent, or stop for good.
                self.ctx = ctx.parent();
                self.index = 0;
            }
        }
    }
}

impl FusedIterator for PropertyIterator<'_> {}
