//! The pipeline-facing transport.
//!
//! [`HttpTransport`] owns a connection provider, a wire engine and the
//! transport configuration. Each [`process`](HttpTransport::process) call
//! runs a fresh [`ExchangeOrchestrator`] with its own read buffer, so a
//! transport can be cloned and used from many tasks at once.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::Uri;
use noalloc_transport_core::{
    ConnectionProvider, PipelineMessage, RequestMethod, TransportError, WireEngine,
};

use crate::builder::TransportBuilder;
use crate::config::TransportConfig;
use crate::orchestrator::ExchangeOrchestrator;
use crate::request_id::{RandomRequestId, RequestIdGenerator};
use crate::response::ResponseModel;
use crate::transport::{HttpsConnectionProvider, HyperWireEngine};

/// The transport returned by [`TransportBuilder::build`].
pub type DefaultTransport = HttpTransport<HttpsConnectionProvider, HyperWireEngine>;

struct Inner<P, E> {
    provider: P,
    engine: E,
    config: TransportConfig,
}

/// HTTP/1.1 transport for a request pipeline.
///
/// Cloning is cheap: clones share the provider, engine and configuration.
///
/// # Example
///
/// ```ignore
/// use noalloc_transport::{HttpTransport, RequestMethod};
///
/// let transport = HttpTransport::builder().build()?;
/// let message = transport.create_message(RequestMethod::Get, "https://example.com/".parse()?);
/// let response = transport.process(&message).await?;
/// println!("{} {:?}", response.status(), response.content());
/// ```
pub struct HttpTransport<P, E> {
    inner: Arc<Inner<P, E>>,
    id_generator: Arc<dyn RequestIdGenerator>,
}

impl<P, E> Clone for HttpTransport<P, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            id_generator: Arc::clone(&self.id_generator),
        }
    }
}

impl DefaultTransport {
    /// Create a [`TransportBuilder`] with default settings.
    pub fn builder() -> TransportBuilder {
        TransportBuilder::new()
    }

    /// Create a transport with default settings: TLS on, port 443, a
    /// 4096-byte read buffer.
    pub fn new() -> Result<Self, TransportError> {
        TransportBuilder::new().build()
    }
}

impl<P, E> HttpTransport<P, E>
where
    P: ConnectionProvider,
    E: WireEngine<P::Connection>,
{
    /// Assemble a transport from its collaborators.
    ///
    /// Fails if `config` does not validate.
    pub fn from_parts(
        provider: P,
        engine: E,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                provider,
                engine,
                config,
            }),
            id_generator: Arc::new(RandomRequestId),
        })
    }

    /// Replace the generator used for responses without a client request id.
    pub fn with_request_id_generator(mut self, id_generator: Arc<dyn RequestIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Create an empty message for `method` and `uri`.
    pub fn create_message(&self, method: RequestMethod, uri: Uri) -> PipelineMessage {
        PipelineMessage::new(method, uri)
    }

    /// Run one exchange for `message`.
    pub async fn process(
        &self,
        message: &PipelineMessage,
    ) -> Result<ResponseModel, TransportError> {
        ExchangeOrchestrator::new(
            &self.inner.provider,
            &self.inner.engine,
            &self.inner.config,
            Arc::clone(&self.id_generator),
        )
        .execute(message)
        .await
    }

    /// Release every resource held by the connection provider.
    pub async fn shutdown(&self) {
        self.inner.provider.release_all().await;
        tracing::debug!("transport shut down");
    }
}

impl<P, E> tower_service::Service<PipelineMessage> for HttpTransport<P, E>
where
    P: ConnectionProvider + 'static,
    E: WireEngine<P::Connection> + 'static,
{
    type Response = ResponseModel;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<ResponseModel, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, message: PipelineMessage) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.process(&message).await })
    }
}

impl<P, E> std::fmt::Debug for HttpTransport<P, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
