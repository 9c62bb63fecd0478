//! Connection provider and TLS setup.
//!
//! [`HttpsConnectionProvider`] opens TCP connections, optionally secured
//! with rustls, through hyper-rustls' connector.
//!
//! # Feature Flags
//!
//! TLS needs both a crypto provider and root certificates:
//!
//! - **Crypto providers** (choose one):
//!   - `tls-ring` - ring (default with `tls`)
//!   - `tls-aws-lc` - AWS LC
//!
//! - **Root certificates** (choose one):
//!   - `tls-native-roots` - system root certificates (default with `tls`)
//!   - `tls-webpki-roots` - bundled Mozilla root certificates
//!
//! Without a feature-gated provider, a process-wide default installed via
//! `CryptoProvider::install_default()` is used.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder, MaybeHttpsStream};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use noalloc_transport_core::{BoxError, ConnectionProvider, TransportError};
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tower_service::Service;

/// Check if TLS features are properly configured.
///
/// Returns true if both a crypto provider AND root certificates are available.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(any(feature = "tls-ring", feature = "tls-aws-lc"))
        && cfg!(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))
}

/// Feature-gated provider first, then the process default.
fn crypto_provider() -> Option<Arc<rustls::crypto::CryptoProvider>> {
    #[cfg(feature = "tls-ring")]
    return Some(Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
    return Some(Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    #[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
    rustls::crypto::CryptoProvider::get_default().cloned()
}

/// Build the default TLS configuration from the enabled features.
///
/// Fails with [`TransportError::Config`] when no crypto provider is
/// available.
pub fn default_tls_config() -> Result<ClientConfig, TransportError> {
    let provider = crypto_provider().ok_or_else(|| {
        TransportError::Config(
            "TLS requires a crypto provider: enable `tls-ring` or `tls-aws-lc`, \
             or install one with `CryptoProvider::install_default()`"
                .into(),
        )
    })?;

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::Config(e.to_string()))?;

    Ok(builder.with_root_certificates(build_root_store()).with_no_client_auth())
}

/// Build the root certificate store from enabled features.
#[allow(unused_mut)]
fn build_root_store() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();

    // Native roots win when both features are on.
    #[cfg(feature = "tls-native-roots")]
    {
        let native_certs = rustls_native_certs::load_native_certs();
        if !native_certs.errors.is_empty() {
            tracing::debug!(errors = ?native_certs.errors, "errors loading native certs");
        }
        roots.add_parsable_certificates(native_certs.certs);
    }

    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    roots
}

/// Build an HTTP/1.1-only connector that speaks TLS for `https` URIs and
/// plain TCP for `http` URIs.
pub fn build_https_connector(tls_config: ClientConfig) -> HttpsConnector<HttpConnector> {
    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .build()
}

/// Connection provider backed by hyper-rustls.
///
/// After [`release_all`](ConnectionProvider::release_all) the provider is
/// closed and every further `connect` fails.
pub struct HttpsConnectionProvider {
    connector: HttpsConnector<HttpConnector>,
    tls: bool,
    closed: AtomicBool,
}

impl HttpsConnectionProvider {
    /// Create a provider. `tls` selects between TLS and plain TCP.
    pub fn new(tls_config: ClientConfig, tls: bool) -> Self {
        Self {
            connector: build_https_connector(tls_config),
            tls,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ConnectionProvider for HttpsConnectionProvider {
    type Connection = MaybeHttpsStream<TokioIo<TcpStream>>;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Connection, BoxError> {
        if self.is_closed() {
            return Err("connection provider has been released".into());
        }

        let scheme = if self.tls { "https" } else { "http" };
        let uri: Uri = format!("{scheme}://{host}:{port}").parse()?;

        let mut connector = self.connector.clone();
        std::future::poll_fn(|cx| connector.poll_ready(cx)).await?;
        let connection = connector.call(uri).await?;
        tracing::trace!(host, port, tls = self.tls, "connection established");
        Ok(connection)
    }

    async fn release_all(&self) {
        // Connections are owned by their exchanges, so there is no pool to
        // drain; closing only stops new connections.
        self.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for HttpsConnectionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsConnectionProvider")
            .field("tls", &self.tls)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
