//! Builder for [`HttpTransport`].
//!
//! Provides a fluent API over [`TransportConfig`] plus the pieces that
//! cannot be deserialized: a custom rustls configuration and a request id
//! generator.

use std::sync::Arc;

use noalloc_transport_core::TransportError;
use rustls::ClientConfig;

use crate::client::{DefaultTransport, HttpTransport};
use crate::config::{PortSelection, TransportConfig};
use crate::request_id::RequestIdGenerator;
use crate::response::DuplicateHeaderPolicy;
use crate::transport::{HttpsConnectionProvider, HyperWireEngine, default_tls_config};

/// Builder for creating an [`HttpTransport`].
///
/// # Example
///
/// ```ignore
/// use noalloc_transport::TransportBuilder;
///
/// let transport = TransportBuilder::new()
///     .port_from_uri(443)
///     .read_buffer_capacity(16 * 1024)
///     .build()?;
/// ```
#[derive(Default)]
pub struct TransportBuilder {
    config: TransportConfig,
    /// Custom rustls configuration; the feature-gated default otherwise.
    tls_config: Option<ClientConfig>,
    id_generator: Option<Arc<dyn RequestIdGenerator>>,
    title_case_headers: bool,
}

impl std::fmt::Debug for TransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("config", &self.config)
            .field("tls_config", &self.tls_config.is_some())
            .field("id_generator", &self.id_generator.is_some())
            .field("title_case_headers", &self.title_case_headers)
            .finish()
    }
}

impl TransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration, e.g. one loaded from a file.
    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Capacity of the per-exchange read buffer.
    ///
    /// Response content must be strictly smaller than this.
    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.read_buffer_capacity = capacity;
        self
    }

    /// Always connect to `port`, whatever the URI says.
    pub fn fixed_port(mut self, port: u16) -> Self {
        self.config.port = PortSelection::Fixed { port };
        self
    }

    /// Connect to the URI's port. Without one, the scheme's well-known port
    /// is used, or `default` for schemes other than `http` and `https`.
    pub fn port_from_uri(mut self, default: u16) -> Self {
        self.config.port = PortSelection::FromUri { default };
        self
    }

    pub fn duplicate_headers(mut self, policy: DuplicateHeaderPolicy) -> Self {
        self.config.duplicate_headers = policy;
        self
    }

    /// Use plain TCP instead of TLS.
    ///
    /// Use this for development/testing against local servers.
    pub fn plaintext(mut self) -> Self {
        self.config.tls = false;
        self
    }

    /// Use a custom rustls configuration.
    ///
    /// The configuration's ALPN list must be empty; HTTP/1.1 is negotiated
    /// by the connector.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Generator for client request ids of responses whose message carried none.
    pub fn request_id_generator<G: RequestIdGenerator + 'static>(mut self, generator: G) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    /// Write request header names in Title-Case.
    pub fn title_case_headers(mut self, enabled: bool) -> Self {
        self.title_case_headers = enabled;
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] if the configuration is invalid or
    /// no TLS configuration can be built.
    pub fn build(self) -> Result<DefaultTransport, TransportError> {
        self.config.validate()?;

        let tls_config = match self.tls_config {
            Some(config) => config,
            None => default_tls_config()?,
        };

        let provider = HttpsConnectionProvider::new(tls_config, self.config.tls);
        let engine = HyperWireEngine::new().title_case_headers(self.title_case_headers);

        tracing::debug!(
            tls = self.config.tls,
            read_buffer_capacity = self.config.read_buffer_capacity,
            "building http transport"
        );

        let transport = HttpTransport::from_parts(provider, engine, self.config)?;
        Ok(match self.id_generator {
            Some(generator) => transport.with_request_id_generator(generator),
            None => transport,
        })
    }
}
