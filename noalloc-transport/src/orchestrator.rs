//! Exchange orchestration.
//!
//! [`ExchangeOrchestrator`] runs one message through the phases of one
//! exchange:
//!
//! ```text
//! connect -> open -> write head -> write body -> complete
//!         -> status -> headers -> content segments -> trailers -> dispose
//! ```
//!
//! Every suspension point races the message's cancellation token, and the
//! exchange is disposed exactly once on every path out of the read and write
//! phases.

use std::future::Future;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{Method, Version};
use noalloc_transport_core::{
    CancellationToken, ConnectionProvider, Exchange, Phase, PipelineMessage, TransportError,
    VersionPolicy, WireEngine,
};
use tracing::Instrument;

use crate::config::TransportConfig;
use crate::request;
use crate::request_id::RequestIdGenerator;
use crate::response::ResponseModel;

/// Fixed-capacity buffer shared by every content read of one exchange.
///
/// Reads land in the unfilled tail. Filling the tail completely means the
/// content did not fit.
#[derive(Debug)]
pub(crate) struct ReadBuffer {
    buf: BytesMut,
    filled: usize,
}

impl ReadBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::zeroed(capacity),
            filled: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn unfilled_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Record a read of `n` bytes into the unfilled tail.
    fn commit(&mut self, n: usize) -> Result<(), TransportError> {
        if n >= self.buf.len() - self.filled {
            return Err(TransportError::ContentTooLarge {
                capacity: self.capacity(),
            });
        }
        self.filled += n;
        Ok(())
    }

    /// Split the filled bytes off the buffer without copying.
    fn take_filled(&mut self) -> Bytes {
        let filled = std::mem::take(&mut self.filled);
        self.buf.split_to(filled).freeze()
    }
}

/// Race `fut` against cancellation of the exchange.
async fn cancellable<T, F>(
    cancel: &CancellationToken,
    phase: Phase,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(%phase, "exchange cancelled");
            Err(TransportError::Cancelled { phase })
        }
        result = fut => result,
    }
}

/// Drives a single message through a single exchange.
///
/// An orchestrator is consumed by [`execute`](Self::execute), so it can never
/// run a second message. Independent orchestrators share nothing mutable and
/// may run in parallel.
pub struct ExchangeOrchestrator<'a, P, E> {
    provider: &'a P,
    engine: &'a E,
    config: &'a TransportConfig,
    id_generator: Arc<dyn RequestIdGenerator>,
    read_buffer: ReadBuffer,
}

impl<'a, P, E> ExchangeOrchestrator<'a, P, E>
where
    P: ConnectionProvider,
    E: WireEngine<P::Connection>,
{
    pub fn new(
        provider: &'a P,
        engine: &'a E,
        config: &'a TransportConfig,
        id_generator: Arc<dyn RequestIdGenerator>,
    ) -> Self {
        Self {
            provider,
            engine,
            config,
            id_generator,
            read_buffer: ReadBuffer::new(config.read_buffer_capacity),
        }
    }

    /// Execute `message` and return the assembled response.
    pub async fn execute(self, message: &PipelineMessage) -> Result<ResponseModel, TransportError> {
        let method = request::wire_method(message.method())?;
        let content_length = request::content_length(message)?;
        request::check_headers(message)?;

        let host = message
            .uri()
            .host()
            .ok_or_else(|| TransportError::InvalidUri(format!("`{}` has no host", message.uri())))?
            .to_owned();
        let port = self.config.port.resolve(message.uri());

        let span = tracing::info_span!(
            "http.exchange",
            http.request.method = %method,
            server.address = %host,
            server.port = port,
            otel.kind = "client",
        );

        async move {
            let result = self.run(message, method, &host, port, content_length).await;
            match &result {
                Ok(response) => tracing::debug!(status = response.status(), "exchange complete"),
                Err(err) => tracing::warn!(error = %err, "exchange failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        mut self,
        message: &PipelineMessage,
        method: Method,
        host: &str,
        port: u16,
        content_length: u64,
    ) -> Result<ResponseModel, TransportError> {
        let cancel = message.cancellation();

        let connection = cancellable(cancel, Phase::Connect, async {
            self.provider
                .connect(host, port)
                .await
                .map_err(|source| TransportError::ConnectionFailed {
                    host: host.to_owned(),
                    port,
                    source,
                })
        })
        .await?;
        tracing::trace!("connected");

        let mut exchange = cancellable(
            cancel,
            Phase::Open,
            self.engine.open(connection, Version::HTTP_11, VersionPolicy::Exact),
        )
        .await?;

        let result = self.drive(&mut exchange, message, &method, content_length).await;
        exchange.dispose().await;
        tracing::trace!("exchange disposed");
        result
    }

    async fn drive(
        &mut self,
        exchange: &mut E::Exchange,
        message: &PipelineMessage,
        method: &Method,
        content_length: u64,
    ) -> Result<ResponseModel, TransportError> {
        let cancel = message.cancellation();

        request::write_head(exchange, method, message, content_length)?;
        if let Some(content) = message.content().filter(|_| content_length > 0) {
            let body = cancellable(
                cancel,
                Phase::MaterializeContent,
                request::materialize(content, content_length),
            )
            .await?;
            cancellable(cancel, Phase::WriteBody, exchange.write_body(body)).await?;
        }
        cancellable(cancel, Phase::CompleteRequest, exchange.complete_request()).await?;
        tracing::trace!(content_length, "request written");

        let mut response =
            ResponseModel::new(self.config.duplicate_headers, self.id_generator.clone());
        if let Some(id) = message.client_request_id() {
            response.set_client_request_id(id);
        }

        let status = cancellable(cancel, Phase::ReadStatus, exchange.read_status()).await?;
        tracing::trace!(status = status.code.as_u16(), "status received");
        response.set_status(status);

        if cancellable(cancel, Phase::ReadHeaders, exchange.read_to_headers()).await? {
            cancellable(cancel, Phase::ReadHeaders, exchange.read_headers(&mut response)).await?;
        }

        if cancellable(cancel, Phase::ReadContent, exchange.read_to_content()).await? {
            loop {
                let n = cancellable(
                    cancel,
                    Phase::ReadContent,
                    exchange.read_content(self.read_buffer.unfilled_mut()),
                )
                .await?;
                // A short read is the final chunk of the segment; 0 is its end.
                self.read_buffer.commit(n)?;

                let next = exchange.read_to_next_content_segment();
                if !cancellable(cancel, Phase::ReadContent, next).await? {
                    break;
                }
            }
            response.set_content(self.read_buffer.take_filled());
        }

        if cancellable(cancel, Phase::ReadTrailers, exchange.read_to_trailing_headers()).await? {
            cancellable(cancel, Phase::ReadTrailers, exchange.read_headers(&mut response)).await?;
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockEngine, MockProvider, Script};
    use crate::request_id::SequentialRequestId;
    use http::{StatusCode, Uri};
    use noalloc_transport_core::{BoxError, RequestMethod, StreamContent};

    fn ids() -> Arc<dyn RequestIdGenerator> {
        Arc::new(SequentialRequestId::new("id"))
    }

    fn get(uri: &'static str) -> PipelineMessage {
        PipelineMessage::new(RequestMethod::Get, Uri::from_static(uri))
    }

    async fn execute(
        provider: &MockProvider,
        config: &TransportConfig,
        message: &PipelineMessage,
    ) -> Result<ResponseModel, TransportError> {
        ExchangeOrchestrator::new(provider, &MockEngine, config, ids())
            .execute(message)
            .await
    }

    #[test]
    fn test_read_buffer_commit() {
        let mut buffer = ReadBuffer::new(8);
        buffer.commit(3).unwrap();
        assert_eq!(buffer.unfilled_mut().len(), 5);
        buffer.commit(0).unwrap();
        assert!(matches!(
            buffer.commit(5),
            Err(TransportError::ContentTooLarge { capacity: 8 })
        ));
        assert_eq!(buffer.take_filled().len(), 3);
    }

    #[tokio::test]
    async fn test_small_body_single_read() {
        let provider = MockProvider::new(
            Script::ok()
                .header("content-type", "text/plain")
                .header("content-length", "17")
                .segment(b"hello world test!"),
        );
        let config = TransportConfig::default();

        let response = execute(&provider, &config, &get("https://example.com/blob")).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("content-type"), Some("text/plain"));
        assert_eq!(response.content().unwrap().as_ref(), b"hello world test!");

        let journal = provider.journal();
        let reads: Vec<_> = journal.iter().filter(|c| matches!(c, Call::ReadContent(_))).collect();
        assert_eq!(reads, vec![&Call::ReadContent(4096)]);
        assert_eq!(provider.dispose_count(), 1);
    }

    #[tokio::test]
    async fn test_request_line_per_method() {
        let cases = [
            (RequestMethod::Get, Method::GET),
            (RequestMethod::Put, Method::PUT),
            (RequestMethod::Post, Method::POST),
            (RequestMethod::Delete, Method::DELETE),
        ];
        let config = TransportConfig::default();

        for (method, token) in cases {
            let provider = MockProvider::new(Script::ok());
            let uri = Uri::from_static("https://example.com/a?b=c");
            let message = PipelineMessage::new(method, uri);
            execute(&provider, &config, &message).await.unwrap();

            let lines: Vec<_> = provider
                .journal()
                .into_iter()
                .filter(|c| matches!(c, Call::RequestLine(..)))
                .collect();
            assert_eq!(
                lines,
                vec![Call::RequestLine(token, "https://example.com/a?b=c".into())]
            );
        }
    }

    #[tokio::test]
    async fn test_write_phase_order() {
        let provider = MockProvider::new(Script::ok());
        let config = TransportConfig::default();
        let uri = Uri::from_static("https://example.com/blob");
        let message = PipelineMessage::new(RequestMethod::Put, uri)
            .with_header("x-b", "2")
            .with_header("x-a", "1")
            .with_content("payload");

        execute(&provider, &config, &message).await.unwrap();

        let journal = provider.journal();
        assert_eq!(
            &journal[..6],
            &[
                Call::Connect("example.com".into(), 443),
                Call::Configure(7, false),
                Call::RequestLine(Method::PUT, "https://example.com/blob".into()),
                Call::Header("x-b".into(), "2".into()),
                Call::Header("x-a".into(), "1".into()),
                Call::Body(Bytes::from_static(b"payload")),
            ]
        );
        assert_eq!(journal[6], Call::Complete);
    }

    #[tokio::test]
    async fn test_no_body_written_without_content() {
        let provider = MockProvider::new(Script::ok());
        execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap();

        let journal = provider.journal();
        assert!(journal.contains(&Call::Configure(0, false)));
        assert!(!journal.iter().any(|c| matches!(c, Call::Body(_))));
    }

    #[tokio::test]
    async fn test_missing_header_value_no_network() {
        let provider = MockProvider::new(Script::ok());
        let mut message = get("https://example.com/");
        message.headers_mut().reserve("x-ms-client-request-id");

        let err = execute(&provider, &TransportConfig::default(), &message).await.unwrap_err();

        assert!(matches!(err, TransportError::MissingHeaderValue { .. }));
        assert!(provider.journal().is_empty());
    }

    #[tokio::test]
    async fn test_indeterminate_length_no_network() {
        let provider = MockProvider::new(Script::ok());
        let uri = Uri::from_static("https://example.com/");
        let message = PipelineMessage::new(RequestMethod::Post, uri)
            .with_content(StreamContent::new(futures::stream::empty()));

        let err = execute(&provider, &TransportConfig::default(), &message).await.unwrap_err();

        assert!(matches!(err, TransportError::IndeterminateContentLength));
        assert!(provider.journal().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_method_no_network() {
        let provider = MockProvider::new(Script::ok());
        let uri = Uri::from_static("https://example.com/");
        let message = PipelineMessage::new(RequestMethod::Connect, uri);

        let err = execute(&provider, &TransportConfig::default(), &message).await.unwrap_err();

        assert!(matches!(err, TransportError::UnsupportedMethod(_)));
        assert!(provider.journal().is_empty());
    }

    #[tokio::test]
    async fn test_body_of_exactly_capacity_is_too_large() {
        let provider = MockProvider::new(Script::ok().segment(&[b'x'; 4096]));

        let err = execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::ContentTooLarge { capacity: 4096 }));
        assert_eq!(provider.dispose_count(), 1);
    }

    #[tokio::test]
    async fn test_configurable_capacity() {
        let config = TransportConfig {
            read_buffer_capacity: 16,
            ..TransportConfig::default()
        };

        let provider = MockProvider::new(Script::ok().segment(b"hello world test!"));
        let err = execute(&provider, &config, &get("https://example.com/")).await.unwrap_err();
        assert!(matches!(err, TransportError::ContentTooLarge { capacity: 16 }));

        let provider = MockProvider::new(Script::ok().segment(b"fifteen bytes!!"));
        let response = execute(&provider, &config, &get("https://example.com/")).await.unwrap();
        assert_eq!(response.content().unwrap().len(), 15);
    }

    #[tokio::test]
    async fn test_multiple_segments_accumulate() {
        let script = Script::ok().segment(b"hello ").segment(b"").segment(b"world");
        let provider = MockProvider::new(script);

        let response = execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap();

        assert_eq!(response.content().unwrap().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_segments_overflowing_buffer() {
        let config = TransportConfig {
            read_buffer_capacity: 8,
            ..TransportConfig::default()
        };
        let provider = MockProvider::new(Script::ok().segment(b"12345").segment(b"678"));

        let err = execute(&provider, &config, &get("https://example.com/")).await.unwrap_err();
        assert!(matches!(err, TransportError::ContentTooLarge { capacity: 8 }));
    }

    #[tokio::test]
    async fn test_no_content_phase() {
        let provider = MockProvider::new(Script::status(StatusCode::NO_CONTENT));

        let response = execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap();

        assert_eq!(response.status(), 204);
        assert!(response.content().is_none());
        assert!(!provider.journal().iter().any(|c| matches!(c, Call::ReadContent(_))));
    }

    #[tokio::test]
    async fn test_trailers_feed_same_sink() {
        let provider = MockProvider::new(
            Script::ok()
                .header("content-type", "text/plain")
                .segment(b"body")
                .trailer("x-checksum", "abc"),
        );

        let response = execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap();

        assert_eq!(response.headers().get("content-type"), Some("text/plain"));
        assert_eq!(response.headers().get("x-checksum"), Some("abc"));
    }

    #[tokio::test]
    async fn test_duplicate_header_fails_and_disposes() {
        let provider = MockProvider::new(Script::ok().header("x-a", "1").header("X-A", "2"));

        let err = execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::DuplicateHeader(_)));
        assert_eq!(provider.dispose_count(), 1);
    }

    #[tokio::test]
    async fn test_header_decode_error() {
        let provider = MockProvider::new(Script::ok().raw_header(b"x-bad", &[0xff]));

        let err = execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::HeaderDecodeError { .. }));
        assert_eq!(provider.dispose_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_content_read() {
        let token = CancellationToken::new();
        let script = Script::ok()
            .segment(b"never delivered")
            .cancel_on_content(token.clone());
        let provider = MockProvider::new(script);
        let message = get("https://example.com/").with_cancellation(token);

        let err = execute(&provider, &TransportConfig::default(), &message).await.unwrap_err();

        assert!(matches!(err, TransportError::Cancelled { phase: Phase::ReadContent }));
        assert_eq!(provider.dispose_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_materialization() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let chunks = futures::stream::once(async move {
            trigger.cancel();
            std::future::pending::<Result<Bytes, BoxError>>().await
        });
        let provider = MockProvider::new(Script::ok());
        let uri = Uri::from_static("https://example.com/");
        let message = PipelineMessage::new(RequestMethod::Put, uri)
            .with_content(StreamContent::with_length(chunks, 10))
            .with_cancellation(token);

        let err = execute(&provider, &TransportConfig::default(), &message)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::Cancelled {
                phase: Phase::MaterializeContent
            }
        ));
        assert_eq!(provider.dispose_count(), 1);
        assert!(!provider.journal().iter().any(|call| matches!(call, Call::Body(_))));
    }

    #[tokio::test]
    async fn test_cancel_before_connect() {
        let token = CancellationToken::new();
        token.cancel();
        let provider = MockProvider::new(Script::ok());
        let message = get("https://example.com/").with_cancellation(token);

        let err = execute(&provider, &TransportConfig::default(), &message).await.unwrap_err();

        assert!(matches!(err, TransportError::Cancelled { phase: Phase::Connect }));
        assert_eq!(provider.dispose_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_failed() {
        let provider = MockProvider::refusing();

        let err = execute(&provider, &TransportConfig::default(), &get("https://example.com/"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::ConnectionFailed { ref host, port: 443, .. } if host == "example.com"
        ));
    }

    #[tokio::test]
    async fn test_port_from_uri() {
        let provider = MockProvider::new(Script::ok());
        let config = TransportConfig {
            port: crate::config::PortSelection::FromUri { default: 443 },
            ..TransportConfig::default()
        };

        execute(&provider, &config, &get("https://example.com:8443/")).await.unwrap();

        assert_eq!(provider.journal()[0], Call::Connect("example.com".into(), 8443));
    }

    #[tokio::test]
    async fn test_uri_without_host() {
        let provider = MockProvider::new(Script::ok());
        let message = get("/relative/path");

        let err = execute(&provider, &TransportConfig::default(), &message).await.unwrap_err();

        assert!(matches!(err, TransportError::InvalidUri(_)));
        assert!(provider.journal().is_empty());
    }

    #[tokio::test]
    async fn test_client_request_id() {
        let config = TransportConfig::default();

        let provider = MockProvider::new(Script::ok());
        let message = get("https://example.com/").with_client_request_id("caller-7");
        let response = execute(&provider, &config, &message).await.unwrap();
        assert_eq!(response.client_request_id(), "caller-7");

        let provider = MockProvider::new(Script::ok());
        let response = execute(&provider, &config, &get("https://example.com/")).await.unwrap();
        assert_eq!(response.client_request_id(), "id-1");
    }

    #[tokio::test]
    async fn test_independent_orchestrators() {
        let config = TransportConfig::default();
        let first = MockProvider::new(Script::ok().segment(b"first response"));
        let second = MockProvider::new(Script::ok().segment(b"second"));

        let a = execute(&first, &config, &get("https://a.example.com/")).await.unwrap();
        let b = execute(&second, &config, &get("https://b.example.com/")).await.unwrap();

        assert_eq!(a.content().unwrap().as_ref(), b"first response");
        assert_eq!(b.content().unwrap().as_ref(), b"second");
        assert_eq!(first.dispose_count(), 1);
        assert_eq!(second.dispose_count(), 1);
    }
}
