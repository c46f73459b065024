//! Well-known property names.
//!
//! Transports and processors that agree on these names let applications
//! query identities without knowing which layer produced them.

/// Kind of transport security the connection was established with.
pub const TRANSPORT_SECURITY_TYPE_PROPERTY_NAME: &str = "transport_security_type";

/// `transport_security_type` value for TLS connections.
pub const SSL_TRANSPORT_SECURITY_TYPE: &str = "ssl";

/// Common name of the peer's X.509 certificate subject.
pub const X509_CN_PROPERTY_NAME: &str = "x509_common_name";

/// One subject alternative name of the peer's X.509 certificate.
pub const X509_SAN_PROPERTY_NAME: &str = "x509_subject_alternative_name";
