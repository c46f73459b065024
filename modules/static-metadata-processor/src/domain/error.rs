//! Reasons a call is not authenticated.

use rpc_security::AuthContextError;
use thiserror::Error;

/// Why the processor refused a call.
///
/// Messages never include the presented token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no token in metadata key '{key}'")]
    MissingToken { key: String },

    #[error("token in metadata key '{key}' is not valid UTF-8")]
    MalformedToken { key: String },

    #[error("token is empty")]
    EmptyToken,

    #[error("unknown token")]
    UnknownToken,

    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] AuthContextError),
}
