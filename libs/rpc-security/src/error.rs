//! Error types for the RPC security core.

use thiserror::Error;

/// Errors returned when constructing an [`AuthContext`](crate::AuthContext).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthContextError {
    /// A property was added with an empty name.
    #[error("property name must not be empty")]
    EmptyPropertyName,

    /// The peer identity property name was set to an empty string.
    #[error("peer identity property name must not be empty")]
    EmptyPeerIdentityName,
}

/// Failure reported by an auth metadata processor.
///
/// Never carries a context: a failed processing run has no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    /// The processor rejected the call.
    #[error("metadata processing rejected: {0}")]
    Rejected(String),

    /// The processor dropped its completion without resolving it.
    #[error("metadata processor abandoned the completion")]
    Abandoned,
}

/// Errors returned by the per-call security operations.
///
/// A call operation that fails leaves the call's context state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// A client-only operation was invoked on a server call.
    #[error("method is client-side only")]
    NotOnClientSideCall,

    /// A server-only operation was invoked on a client call.
    #[error("method is server-side only")]
    NotOnServerSideCall,

    /// The credentials grant more than per-call scope.
    #[error("incompatible credentials to set on a call: '{credentials_type}' is not request-only")]
    IncompatibleCredentials { credentials_type: String },

    /// The registered metadata processor did not authenticate the call.
    #[error("call authentication failed: {0}")]
    Unauthenticated(#[from] ProcessingError),
}
