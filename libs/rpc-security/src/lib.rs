#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! RPC Security Context
//!
//! Post-authentication identity for RPC calls:
//!
//! - [`AuthContext`] - chainable, reference-counted set of identity properties
//! - [`PropertyIterator`] - enumeration of a context chain, optionally by name
//! - [`AuthMetadataProcessor`] - pluggable hook turning call metadata into an
//!   [`AuthContext`], resolved asynchronously and exactly once
//! - [`set_credentials`] - per-call client credentials
//! - [`set_auth_context`] / [`call_auth_context`] - per-call server identity
//!
//! ## Usage
//!
//! ```ignore
//! use rpc_security::{register_auth_metadata_processor, authenticate_call, global_registry};
//!
//! // Server setup, before accepting calls
//! register_auth_metadata_processor(Arc::new(my_processor));
//!
//! // Per call, in the transport
//! authenticate_call(&mut call, global_registry(), Some(&tls_ctx), &metadata).await?;
//!
//! // In the handler
//! let ctx = call_auth_context(&call);
//! for user in ctx.iter().flat_map(AuthContext::peer_identity) { /* ... */ }
//! ```

pub mod auth_context;
pub mod call;
pub mod client_context;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod metadata;
pub mod processor;
pub mod property_iter;
pub mod server_context;

pub use auth_context::{
    AuthContext, AuthContextBuilder, Property, auth_context_ref, auth_context_unref,
};
pub use call::{Call, CallContext, CallSide, ContextSlot};
pub use client_context::{ClientSecurityContext, client_security_context, set_credentials};
pub use credentials::{Credentials, CredentialsHandle, CredentialsScope};
pub use error::{AuthContextError, CallError, ProcessingError};
pub use metadata::{Metadata, MetadataEntry};
pub use processor::{
    AuthMetadataProcessor, MetadataProcessorRegistry, ProcessingDone, ProcessingOutcome,
    completion, global_registry, register_auth_metadata_processor,
};
pub use property_iter::PropertyIterator;
pub use server_context::{
    ServerSecurityContext, authenticate_call, call_auth_context, set_auth_context,
};
