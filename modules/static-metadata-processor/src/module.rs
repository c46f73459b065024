//! Static auth metadata processor module.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use rpc_security::{AuthMetadataProcessor, MetadataProcessorRegistry, global_registry};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, ProcessorMode, StaticProcessorConfig};
use crate::domain::Service;

/// Errors raised while initializing the module.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("static metadata processor already initialized")]
    AlreadyInitialized,
}

/// Static auth metadata processor module.
///
/// Builds a [`Service`] from configuration and registers it as the auth
/// metadata processor of a [`MetadataProcessorRegistry`]. Initialize once,
/// during server setup.
#[derive(Debug, Default)]
pub struct StaticMetadataProcessor {
    service: OnceLock<Arc<Service>>,
}

impl StaticMetadataProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `cfg` and register the processor with `registry`.
    ///
    /// # Errors
    ///
    /// - `Config` if `cfg` is invalid; nothing is registered
    /// - `AlreadyInitialized` on a second call
    pub fn init(
        &self,
        registry: &MetadataProcessorRegistry,
        cfg: &StaticProcessorConfig,
    ) -> Result<(), InitError> {
        info!("Initializing static_metadata_processor");

        cfg.validate()?;
        if cfg.mode == ProcessorMode::AcceptAll {
            warn!(
                "Static metadata processor is running in `accept_all` mode: \
                 every non-empty token is accepted with a hardcoded identity. \
                 Do NOT use this mode in production."
            );
        }

        info!(
            metadata_key = %cfg.metadata_key,
            mode = ?cfg.mode,
            chain_transport_context = cfg.chain_transport_context,
            token_count = cfg.tokens.len(),
            "Loaded processor configuration"
        );

        let service = Arc::new(Service::from_config(cfg));
        self.service
            .set(Arc::clone(&service))
            .map_err(|_| InitError::AlreadyInitialized)?;

        let processor: Arc<dyn AuthMetadataProcessor> = service;
        registry.register(processor);

        info!("Static metadata processor initialized");
        Ok(())
    }

    /// Load configuration from `path` and the environment, then register
    /// with the process-wide registry.
    ///
    /// # Errors
    ///
    /// Same as [`StaticProcessorConfig::load`] and [`init`](Self::init).
    pub fn init_global(&self, path: Option<&Path>) -> Result<(), InitError> {
        let cfg = StaticProcessorConfig::load(path)?;
        self.init(global_registry(), &cfg)
    }

    /// The service built by [`init`](Self::init), if initialized.
    #[must_use]
    pub fn service(&self) -> Option<&Arc<Service>> {
        self.service.get()
    }
}
