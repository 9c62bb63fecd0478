//! Transport configuration.
//!
//! [`TransportConfig`] can be built in code through
//! [`TransportBuilder`](crate::TransportBuilder) or deserialized from any
//! serde format. Every field has a default, so a partial document is fine:
//!
//! ```ignore
//! let config: TransportConfig = serde_json::from_str(r#"{
//!     "read_buffer_capacity": 8192,
//!     "port": { "mode": "from_uri", "default": 443 },
//!     "duplicate_headers": "merge"
//! }"#)?;
//! ```

use http::Uri;
use noalloc_transport_core::TransportError;
use serde::Deserialize;

use crate::response::DuplicateHeaderPolicy;

/// Default read buffer capacity in bytes.
pub const DEFAULT_READ_BUFFER_CAPACITY: usize = 4096;

/// Default port when the port is fixed.
pub const DEFAULT_PORT: u16 = 443;

/// How the port of the remote endpoint is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PortSelection {
    /// Always connect to this port.
    Fixed { port: u16 },
    /// Use the port in the request URI. Without one, `http` URIs use 80,
    /// `https` URIs use 443 and any other scheme uses `default`.
    FromUri { default: u16 },
}

impl Default for PortSelection {
    fn default() -> Self {
        PortSelection::Fixed { port: DEFAULT_PORT }
    }
}

impl PortSelection {
    /// The port to connect to for `uri`.
    pub fn resolve(&self, uri: &Uri) -> u16 {
        match *self {
            PortSelection::Fixed { port } => port,
            PortSelection::FromUri { default } => uri
                .port_u16()
                .or_else(|| match uri.scheme_str() {
                    Some("http") => Some(80),
                    Some("https") => Some(443),
                    _ => None,
                })
                .unwrap_or(default),
        }
    }
}

/// Settings shared by every exchange a transport runs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Capacity of the per-exchange read buffer. Response content must be
    /// strictly smaller than this.
    pub read_buffer_capacity: usize,
    /// Port selection for the connection provider.
    pub port: PortSelection,
    /// Handling of repeated response header names.
    pub duplicate_headers: DuplicateHeaderPolicy,
    /// Whether connections are secured with TLS.
    pub tls: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            read_buffer_capacity: DEFAULT_READ_BUFFER_CAPACITY,
            port: PortSelection::default(),
            duplicate_headers: DuplicateHeaderPolicy::default(),
            tls: true,
        }
    }
}

impl TransportConfig {
    /// Check that the configuration can drive an exchange.
    pub fn validate(&self) -> Result<(), TransportError> {
        // A buffer of one byte could never hold a final chunk.
        if self.read_buffer_capacity < 2 {
            return Err(TransportError::Config(format!(
                "read_buffer_capacity must be at least 2, got {}",
                self.read_buffer_capacity
            )));
        }
        let port = match self.port {
            PortSelection::Fixed { port } => port,
            PortSelection::FromUri { default } => default,
        };
        if port == 0 {
            return Err(TransportError::Config("port must not be 0".into()));
        }
        Ok(())
    }
}
