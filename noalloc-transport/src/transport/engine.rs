//! HTTP/1.1 wire engine on top of hyper's connection-level client.
//!
//! [`HyperWireEngine`] performs the HTTP/1.1 handshake on a connection and
//! spawns hyper's connection driver. [`HyperExchange`] buffers the request
//! head and body until `complete_request`, then hands the request to hyper
//! and exposes the response through the phase-by-phase [`Exchange`] calls.

use bytes::{Buf, Bytes};
use futures::future::BoxFuture;
use http::header::{CONTENT_LENGTH, HOST};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Uri, Version};
use http_body::Body as _;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper::rt::{Read, Write};
use noalloc_transport_core::{
    Exchange, HeaderSink, Phase, ResponseStatus, TransportError, VersionPolicy, WireEngine,
};
use tokio::task::JoinHandle;

type ResponseFuture = BoxFuture<'static, hyper::Result<Response<Incoming>>>;

/// HTTP/1.1 wire engine backed by `hyper::client::conn::http1`.
///
/// Only HTTP/1.1 is spoken. Under [`VersionPolicy::Exact`] any other
/// requested version is refused before the connection is touched.
#[derive(Clone, Debug, Default)]
pub struct HyperWireEngine {
    title_case_headers: bool,
}

impl HyperWireEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write header names in Title-Case instead of lower case.
    pub fn title_case_headers(mut self, enabled: bool) -> Self {
        self.title_case_headers = enabled;
        self
    }

    fn supports(version: Version, policy: VersionPolicy) -> bool {
        match policy {
            VersionPolicy::Exact => version == Version::HTTP_11,
            VersionPolicy::OrLower => version >= Version::HTTP_11,
            VersionPolicy::OrHigher => version <= Version::HTTP_11,
        }
    }
}

impl<C> WireEngine<C> for HyperWireEngine
where
    C: Read + Write + Unpin + Send + 'static,
{
    type Exchange = HyperExchange;

    async fn open(
        &self,
        connection: C,
        version: Version,
        policy: VersionPolicy,
    ) -> Result<HyperExchange, TransportError> {
        if !Self::supports(version, policy) {
            return Err(TransportError::UnsupportedVersion(version));
        }

        let mut builder = http1::Builder::new();
        builder.title_case_headers(self.title_case_headers);
        let (sender, conn) = builder
            .handshake::<C, Full<Bytes>>(connection)
            .await
            .map_err(|e| TransportError::wire(Phase::Open, e))?;

        let driver = tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(error = %err, "http/1.1 connection closed with error");
            }
        });

        Ok(HyperExchange::new(sender, driver))
    }
}

/// One HTTP/1.1 request/response over a connection owned by a spawned
/// hyper driver task.
///
/// Dropping the exchange aborts the driver, which closes the connection.
pub struct HyperExchange {
    sender: SendRequest<Full<Bytes>>,
    driver: JoinHandle<()>,
    content_length: u64,
    method: Method,
    target: Option<Uri>,
    authority: Option<HeaderValue>,
    headers: HeaderMap,
    body: Bytes,
    response: Option<ResponseFuture>,
    head: Option<HeaderMap>,
    staged: Option<HeaderMap>,
    incoming: Option<Incoming>,
    pending: Bytes,
    trailers: Option<HeaderMap>,
}

impl HyperExchange {
    fn new(sender: SendRequest<Full<Bytes>>, driver: JoinHandle<()>) -> Self {
        Self {
            sender,
            driver,
            content_length: 0,
            method: Method::GET,
            target: None,
            authority: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            response: None,
            head: None,
            staged: None,
            incoming: None,
            pending: Bytes::new(),
            trailers: None,
        }
    }

    fn stage(&mut self, headers: Option<HeaderMap>) -> bool {
        self.staged = headers;
        self.staged.as_ref().is_some_and(|h| !h.is_empty())
    }
}

/// Reduce an absolute URI to the origin form sent on the request line.
fn origin_form(uri: &Uri) -> Result<Uri, http::Error> {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| pq.starts_with('/'))
        .unwrap_or("/");
    Uri::builder().path_and_query(path).build()
}

impl Exchange for HyperExchange {
    fn configure(&mut self, content_length: u64, _has_trailing_headers: bool) {
        // hyper only emits request trailers for chunked bodies, and request
        // bodies here always carry a length.
        self.content_length = content_length;
    }

    fn write_request_line(&mut self, method: &Method, uri: &Uri) -> Result<(), TransportError> {
        let target =
            origin_form(uri).map_err(|e| TransportError::wire(Phase::WriteRequestLine, e))?;
        self.authority = uri
            .authority()
            .map(|authority| HeaderValue::from_str(authority.as_str()))
            .transpose()
            .map_err(|e| TransportError::wire(Phase::WriteRequestLine, e))?;
        self.method = method.clone();
        self.target = Some(target);
        Ok(())
    }

    fn write_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::wire(Phase::WriteHeaders, e))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| TransportError::wire(Phase::WriteHeaders, e))?;
        self.headers.append(name, value);
        Ok(())
    }

    async fn write_body(&mut self, body: Bytes) -> Result<(), TransportError> {
        if body.len() as u64 != self.content_length {
            return Err(TransportError::wire(
                Phase::WriteBody,
                format!("body is {} bytes but {} were configured", body.len(), self.content_length),
            ));
        }
        self.body = body;
        Ok(())
    }

    async fn complete_request(&mut self) -> Result<(), TransportError> {
        let target = self
            .target
            .take()
            .ok_or_else(|| {
                TransportError::wire(Phase::CompleteRequest, "request line was not written")
            })?;

        if !self.headers.contains_key(HOST) {
            if let Some(authority) = self.authority.take() {
                self.headers.insert(HOST, authority);
            }
        }
        if self.content_length > 0 && !self.headers.contains_key(CONTENT_LENGTH) {
            self.headers.insert(CONTENT_LENGTH, HeaderValue::from(self.content_length));
        }

        let mut request = Request::new(Full::new(std::mem::take(&mut self.body)));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = target;
        *request.version_mut() = Version::HTTP_11;
        *request.headers_mut() = std::mem::take(&mut self.headers);

        self.sender
            .ready()
            .await
            .map_err(|e| TransportError::wire(Phase::CompleteRequest, e))?;
        self.response = Some(Box::pin(self.sender.send_request(request)));
        Ok(())
    }

    async fn read_status(&mut self) -> Result<ResponseStatus, TransportError> {
        let response = self
            .response
            .take()
            .ok_or_else(|| TransportError::wire(Phase::ReadStatus, "request was not completed"))?
            .await
            .map_err(|e| TransportError::wire(Phase::ReadStatus, e))?;

        let (parts, body) = response.into_parts();
        // hyper only records the reason phrase when it differs from the canonical one.
        let reason = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .or_else(|| parts.status.canonical_reason().map(str::to_owned));

        self.head = Some(parts.headers);
        self.incoming = Some(body);
        Ok(ResponseStatus {
            code: parts.status,
            reason,
        })
    }

    async fn read_to_headers(&mut self) -> Result<bool, TransportError> {
        let head = self.head.take();
        Ok(self.stage(head))
    }

    async fn read_headers<S>(&mut self, sink: &mut S) -> Result<(), TransportError>
    where
        S: HeaderSink + Send,
    {
        if let Some(headers) = self.staged.take() {
            for (name, value) in headers.iter() {
                sink.on_header(name.as_str().as_bytes(), value.as_bytes())?;
            }
        }
        Ok(())
    }

    async fn read_to_content(&mut self) -> Result<bool, TransportError> {
        Ok(self.incoming.as_ref().is_some_and(|body| !body.is_end_stream()))
    }

    async fn read_content(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        let mut filled = 0;
        while filled < buffer.len() {
            if !self.pending.is_empty() {
                let n = self.pending.len().min(buffer.len() - filled);
                buffer[filled..filled + n].copy_from_slice(&self.pending[..n]);
                self.pending.advance(n);
                filled += n;
                continue;
            }

            let Some(body) = self.incoming.as_mut() else {
                break;
            };
            match body.frame().await {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => self.pending = data,
                    Err(frame) => {
                        if let Ok(trailers) = frame.into_trailers() {
                            self.trailers = Some(trailers);
                        }
                    }
                },
                Some(Err(err)) => return Err(TransportError::wire(Phase::ReadContent, err)),
                None => self.incoming = None,
            }
        }
        Ok(filled)
    }

    async fn read_to_next_content_segment(&mut self) -> Result<bool, TransportError> {
        // An HTTP/1.1 message has exactly one body.
        Ok(false)
    }

    async fn read_to_trailing_headers(&mut self) -> Result<bool, TransportError> {
        // Drain whatever is left so trailers behind unread data are seen.
        while let Some(body) = self.incoming.as_mut() {
            match body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(trailers) = frame.into_trailers() {
                        self.trailers = Some(trailers);
                    }
                }
                Some(Err(err)) => return Err(TransportError::wire(Phase::ReadTrailers, err)),
                None => self.incoming = None,
            }
        }
        self.pending = Bytes::new();
        let trailers = self.trailers.take();
        Ok(self.stage(trailers))
    }

    async fn dispose(self) {
        tracing::trace!("disposing http/1.1 exchange");
        drop(self);
    }
}

impl Drop for HyperExchange {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl std::fmt::Debug for HyperExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperExchange")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("content_length", &self.content_length)
            .field("response_pending", &self.response.is_some())
            .field("body_open", &self.incoming.is_some())
            .finish_non_exhaustive()
    }
}
