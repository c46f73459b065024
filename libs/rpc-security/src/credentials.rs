//! Credentials abstraction consumed by the client security context.
//!
//! Concrete credentials (token refresh, TLS, service accounts) live outside
//! this crate; only their type and scope matter here.

use std::sync::Arc;

/// Where a set of credentials may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialsScope {
    /// Only adds per-request metadata; usable on a single call.
    RequestOnly,
    /// Also configures the channel (e.g. transport security).
    Channel,
}

/// Opaque credentials handle.
pub trait Credentials: Send + Sync {
    /// Short type name used in logs and errors, e.g. `"oauth2"` or `"ssl"`.
    fn credentials_type(&self) -> &str;

    /// Scope these credentials may be used at.
    fn scope(&self) -> CredentialsScope;

    /// Whether these credentials only produce request metadata.
    fn has_request_metadata_only(&self) -> bool {
        self.scope() == CredentialsScope::RequestOnly
    }
}

/// Shared handle to credentials. Clone to acquire, drop to release.
pub type CredentialsHandle = Arc<dyn Credentials>;
