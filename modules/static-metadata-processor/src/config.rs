//! Configuration for the static auth metadata processor.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of environment variables overriding file configuration,
/// e.g. `RPC_SECURITY_STATIC_MODE=static_tokens`.
pub const ENV_PREFIX: &str = "RPC_SECURITY_STATIC_";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticProcessorConfig {
    /// Metadata key carrying the token.
    pub metadata_key: String,

    /// Prefix stripped from the metadata value when present.
    pub token_prefix: Option<String>,

    /// Authentication mode.
    pub mode: ProcessorMode,

    /// Chain the produced context onto the transport context, if any.
    pub chain_transport_context: bool,

    /// Property name designated as the peer identity of produced contexts.
    pub peer_identity_property: String,

    /// Identity returned in `accept_all` mode.
    pub default_identity: IdentityConfig,

    /// Static token-to-identity mappings for `static_tokens` mode.
    pub tokens: Vec<TokenMapping>,
}

impl Default for StaticProcessorConfig {
    fn default() -> Self {
        Self {
            metadata_key: "authorization".to_owned(),
            token_prefix: Some("Bearer ".to_owned()),
            mode: ProcessorMode::AcceptAll,
            chain_transport_context: true,
            peer_identity_property: "user".to_owned(),
            default_identity: IdentityConfig::default(),
            tokens: Vec::new(),
        }
    }
}

/// Authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorMode {
    /// Accept any non-empty token and return the default identity.
    #[default]
    AcceptAll,
    /// Map specific tokens to specific identities.
    StaticTokens,
}

/// Properties attached to an authenticated call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub properties: Vec<PropertyConfig>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            properties: vec![PropertyConfig {
                name: "user".to_owned(),
                value: "anonymous".to_owned(),
            }],
        }
    }
}

/// A single identity property.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyConfig {
    pub name: String,
    pub value: String,
}

/// Maps a static token to a specific identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenMapping {
    /// The token value to match, after prefix stripping.
    pub token: String,
    /// The identity to attach when this token is presented.
    pub identity: IdentityConfig,
}

impl StaticProcessorConfig {
    /// Load configuration from defaults, an optional YAML file and
    /// [`ENV_PREFIX`]-prefixed environment variables, in that order.
    ///
    /// Nested keys use `__` in variable names.
    ///
    /// # Errors
    ///
    /// - `MissingFile` if `path` is given but does not exist
    /// - `Load` if a source cannot be parsed or has unknown keys
    /// - `Invalid` if the merged configuration fails [`validate`](Self::validate)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }

        let cfg: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// `Invalid` when a key or property name is empty, or a token is empty
    /// or mapped twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_key.is_empty() {
            return Err(ConfigError::Invalid("metadata_key must not be empty".to_owned()));
        }
        if self.peer_identity_property.is_empty() {
            return Err(ConfigError::Invalid(
                "peer_identity_property must not be empty".to_owned(),
            ));
        }
        validate_identity("default_identity", &self.default_identity)?;

        let mut seen = HashSet::with_capacity(self.tokens.len());
        for (i, mapping) in self.tokens.iter().enumerate() {
            if mapping.token.is_empty() {
                return Err(ConfigError::Invalid(format!("tokens[{i}]: token must not be empty")));
            }
            if !seen.insert(mapping.token.as_str()) {
                return Err(ConfigError::Invalid(format!("tokens[{i}]: duplicate token")));
            }
            validate_identity(&format!("tokens[{i}].identity"), &mapping.identity)?;
        }
        Ok(())
    }
}

fn validate_identity(path: &str, identity: &IdentityConfig) -> Result<(), ConfigError> {
    match identity.properties.iter().position(|p| p.name.is_empty()) {
        Some(i) => Err(ConfigError::Invalid(format!(
            "{path}.properties[{i}]: name must not be empty"
        ))),
        None => Ok(()),
    }
}
