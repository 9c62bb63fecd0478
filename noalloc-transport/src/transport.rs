//! Concrete network collaborators for the exchange orchestrator.
//!
//! - [`HttpsConnectionProvider`] opens TCP connections, with rustls when TLS
//!   is enabled.
//! - [`HyperWireEngine`] speaks HTTP/1.1 over them via hyper's
//!   connection-level client.
//!
//! # Feature Flags
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots` for convenience
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates

mod connector;
mod engine;

pub use connector::{
    HttpsConnectionProvider, build_https_connector, default_tls_config, has_tls_support,
};
pub use engine::{HyperExchange, HyperWireEngine};

// Re-export rustls types that users might need for TLS configuration
pub use rustls::ClientConfig as TlsClientConfig;
