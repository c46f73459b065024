//! Service implementation for the static auth metadata processor.

use rpc_security::{AuthContext, AuthContextBuilder, AuthContextError, Metadata};
use secrecy::{ExposeSecret, SecretString};

use super::error::Rejection;
use crate::config::{IdentityConfig, ProcessorMode, StaticProcessorConfig};

/// Static auth metadata service.
///
/// Resolves the token carried in call metadata to an identity:
/// - `accept_all`: any non-empty token maps to the default identity
/// - `static_tokens`: specific tokens map to specific identities
#[derive(Debug)]
pub struct Service {
    metadata_key: String,
    token_prefix: Option<String>,
    mode: ProcessorMode,
    chain_transport_context: bool,
    peer_identity_property: String,
    default_identity: IdentityConfig,
    tokens: Vec<StaticToken>,
}

#[derive(Debug)]
struct StaticToken {
    token: SecretString,
    identity: IdentityConfig,
}

impl Service {
    /// Create a service from processor configuration.
    #[must_use]
    pub fn from_config(cfg: &StaticProcessorConfig) -> Self {
        let tokens = cfg
            .tokens
            .iter()
            .map(|m| StaticToken {
                token: SecretString::from(m.token.clone()),
                identity: m.identity.clone(),
            })
            .collect();

        Self {
            metadata_key: cfg.metadata_key.clone(),
            token_prefix: cfg.token_prefix.clone(),
            mode: cfg.mode,
            chain_transport_context: cfg.chain_transport_context,
            peer_identity_property: cfg.peer_identity_property.clone(),
            default_identity: cfg.default_identity.clone(),
            tokens,
        }
    }

    /// Extract the token from the first metadata entry under the configured
    /// key, stripping the configured prefix when present.
    ///
    /// # Errors
    ///
    /// - `MissingToken` if no entry exists under the key
    /// - `MalformedToken` if the value is not valid UTF-8
    /// - `EmptyToken` if nothing is left after prefix stripping
    pub fn extract_token<'a>(&self, metadata: &'a Metadata) -> Result<&'a str, Rejection> {
        let value = metadata
            .get(&self.metadata_key)
            .ok_or_else(|| Rejection::MissingToken {
                key: self.metadata_key.clone(),
            })?;
        let raw = std::str::from_utf8(value).map_err(|_| Rejection::MalformedToken {
            key: self.metadata_key.clone(),
        })?;

        let token = self
            .token_prefix
            .as_deref()
            .and_then(|prefix| raw.strip_prefix(prefix))
            .unwrap_or(raw)
            .trim();

        if token.is_empty() {
            return Err(Rejection::EmptyToken);
        }
        Ok(token)
    }

    /// Authenticate one call and build its context.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] explaining why the call is refused.
    pub fn authenticate(
        &self,
        transport_ctx: Option<&AuthContext>,
        metadata: &Metadata,
    ) -> Result<AuthContext, Rejection> {
        let token = self.extract_token(metadata)?;

        let identity = match self.mode {
            ProcessorMode::AcceptAll => &self.default_identity,
            ProcessorMode::StaticTokens => self
                .tokens
                .iter()
                .find(|t| t.token.expose_secret() == token)
                .map(|t| &t.identity)
                .ok_or(Rejection::UnknownToken)?,
        };

        self.build_context(transport_ctx, identity)
            .map_err(Rejection::from)
    }

    fn build_context(
        &self,
        transport_ctx: Option<&AuthContext>,
        identity: &IdentityConfig,
    ) -> Result<AuthContext, AuthContextError> {
        let builder = match transport_ctx {
            Some(parent) if self.chain_transport_context => AuthContext::chained_to(parent),
            _ => AuthContextBuilder::default(),
        };

        identity
            .properties
            .iter()
            .fold(builder, |b, p| b.string_property(p.name.as_str(), &p.value))
            .peer_identity_property_name(self.peer_identity_property.as_str())
            .build()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use rpc_security::Property;

    use crate::config::{PropertyConfig, TokenMapping};

    fn default_config() -> StaticProcessorConfig {
        StaticProcessorConfig::default()
    }

    fn identity(pairs: &[(&str, &str)]) -> IdentityConfig {
        IdentityConfig {
            properties: pairs
                .iter()
                .map(|(name, value)| PropertyConfig {
                    name: (*name).to_owned(),
                    value: (*value).to_owned(),
                })
                .collect(),
        }
    }

    fn bearer(token: &str) -> Metadata {
        Metadata::new().with("authorization", format!("Bearer {token}"))
    }

    fn transport() -> AuthContext {
        AuthContext::builder()
            .string_property("x509_common_name", "client.example.com")
            .build()
            .unwrap()
    }

    fn pairs(ctx: &AuthContext) -> Vec<(String, String)> {
        ctx.property_iter()
            .map(|p| (p.name().to_owned(), p.value_str().unwrap().to_owned()))
            .collect()
    }

    #[test]
    fn accept_all_mode_returns_default_identity() {
        let service = Service::from_config(&default_config());

        let ctx = service.authenticate(None, &bearer("any-token-value")).unwrap();
        assert_eq!(pairs(&ctx), [("user".to_owned(), "anonymous".to_owned())]);
        assert_eq!(ctx.peer_identity_property_name(), Some("user"));
        assert!(ctx.parent().is_none());
    }

    #[test]
    fn accept_all_mode_rejects_empty_token() {
        let service = Service::from_config(&default_config());

        let result = service.authenticate(None, &bearer(""));
        assert_eq!(result.unwrap_err(), Rejection::EmptyToken);
    }

    #[test]
    fn missing_metadata_rejected() {
        let service = Service::from_config(&default_config());

        let md = Metadata::new().with("x-request-id", "1");
        assert_eq!(
            service.authenticate(None, &md).unwrap_err(),
            Rejection::MissingToken {
                key: "authorization".to_owned()
            }
        );
    }

    #[test]
    fn static_tokens_mode_returns_mapped_identity() {
        let cfg = StaticProcessorConfig {
            mode: ProcessorMode::StaticTokens,
            tokens: vec![TokenMapping {
                token: "token-user-a".to_owned(),
                identity: identity(&[("user", "alice"), ("role", "admin")]),
            }],
            ..default_config()
        };
        let service = Service::from_config(&cfg);

        let ctx = service.authenticate(None, &bearer("token-user-a")).unwrap();
        assert_eq!(
            pairs(&ctx),
            [
                ("user".to_owned(), "alice".to_owned()),
                ("role".to_owned(), "admin".to_owned()),
            ]
        );
    }

    #[test]
    fn static_tokens_mode_rejects_unknown_token() {
        let cfg = StaticProcessorConfig {
            mode: ProcessorMode::StaticTokens,
            tokens: vec![TokenMapping {
                token: "known-token".to_owned(),
                identity: IdentityConfig::default(),
            }],
            ..default_config()
        };
        let service = Service::from_config(&cfg);

        let result = service.authenticate(None, &bearer("unknown-token"));
        assert_eq!(result.unwrap_err(), Rejection::UnknownToken);
    }

    #[test]
    fn chains_onto_transport_context() {
        let service = Service::from_config(&default_config());
        let t = transport();

        let ctx = service.authenticate(Some(&t), &bearer("tok")).unwrap();
        assert!(ctx.parent().unwrap().ptr_eq(&t));
        assert_eq!(
            pairs(&ctx),
            [
                ("user".to_owned(), "anonymous".to_owned()),
                ("x509_common_name".to_owned(), "client.example.com".to_owned()),
            ]
        );
    }

    #[test]
    fn chaining_can_be_disabled() {
        let cfg = StaticProcessorConfig {
            chain_transport_context: false,
            ..default_config()
        };
        let service = Service::from_config(&cfg);
        let t = transport();

        let ctx = service.authenticate(Some(&t), &bearer("tok")).unwrap();
        assert!(ctx.parent().is_none());
        assert_eq!(t.ref_count(), 1);
    }

    #[test]
    fn prefix_is_optional() {
        let cfg = StaticProcessorConfig {
            metadata_key: "x-api-key".to_owned(),
            token_prefix: None,
            mode: ProcessorMode::StaticTokens,
            tokens: vec![TokenMapping {
                token: "k-123".to_owned(),
                identity: identity(&[("service", "billing")]),
            }],
            peer_identity_property: "service".to_owned(),
            ..default_config()
        };
        let service = Service::from_config(&cfg);

        let md = Metadata::new().with("x-api-key", "k-123");
        let ctx = service.authenticate(None, &md).unwrap();
        assert_eq!(
            ctx.peer_identity().next().and_then(Property::value_str),
            Some("billing")
        );
    }

    #[test]
    fn debug_hides_tokens() {
        let cfg = StaticProcessorConfig {
            mode: ProcessorMode::StaticTokens,
            tokens: vec![TokenMapping {
                token: "super-secret".to_owned(),
                identity: IdentityConfig::default(),
            }],
            ..default_config()
        };
        let rendered = format!("{:?}", Service::from_config(&cfg));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn non_utf8_token_is_malformed() {
        let service = Service::from_config(&default_config());

        let md = Metadata::new().with("authorization", &[0xff_u8, 0xfe][..]);
        assert_eq!(
            service.authenticate(None, &md).unwrap_err(),
            Rejection::MalformedToken {
                key: "authorization".to_owned()
            }
        );
    }

    #[test]
    fn unprefixed_value_used_as_is() {
        let service = Service::from_config(&default_config());
        let md = Metadata::new().with("authorization", "raw-token");
        assert_eq!(service.extract_token(&md).unwrap(), "raw-token");
    }
}
