//! Domain layer for the static auth metadata processor.

pub mod error;
pub mod processor;
pub mod service;

pub use error::Rejection;
pub use service::Service;
