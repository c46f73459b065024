#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static Auth Metadata Processor
//!
//! An [`AuthMetadataProcessor`](rpc_security::AuthMetadataProcessor) that maps
//! the token carried in call metadata to a configured identity. Intended for
//! development and testing.
//!
//! ## Modes
//!
//! - **`accept_all`** (default): Accepts any non-empty token, returns the
//!   configured default identity.
//!
//! - **`static_tokens`**: Maps specific tokens to specific identities. Useful
//!   for E2E tests with distinct users.
//!
//! Produced contexts are chained onto the transport context (e.g. the TLS
//! peer) unless `chain_transport_context` is `false`.
//!
//! ## Configuration
//!
//! ```yaml
//! metadata_key: authorization
//! token_prefix: "Bearer "
//! mode: static_tokens
//! peer_identity_property: user
//! tokens:
//!   - token: e2e-token-alice
//!     identity:
//!       properties:
//!         - { name: user, value: alice }
//!         - { name: role, value: admin }
//! ```
//!
//! Any key can be overridden with `RPC_SECURITY_STATIC_`-prefixed environment
//! variables, e.g. `RPC_SECURITY_STATIC_MODE=accept_all`.

pub mod config;
pub mod domain;
pub mod module;

pub use config::{ConfigError, StaticProcessorConfig};
pub use module::{InitError, StaticMetadataProcessor};
