//! Contracts for the collaborators the transport drives.
//!
//! - [`ConnectionProvider`]: yields connected, secured byte streams per endpoint
//! - [`WireEngine`]: opens an [`Exchange`] over one connection
//! - [`Exchange`]: the phase-by-phase HTTP/1.1 operations of one request/response
//! - [`HeaderSink`]: receives parsed header bytes from the engine
//!
//! The read side of an [`Exchange`] is driven by explicit "advance" calls.
//! Each `read_to_*` call moves the exchange to the next phase and reports
//! whether that phase has anything to read.

use std::future::Future;

use bytes::Bytes;
use http::{Method, StatusCode, Uri, Version};

use crate::{BoxError, TransportError};

/// How strictly an engine must honour the requested protocol version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Use exactly the requested version or fail.
    #[default]
    Exact,
    /// The requested version or any lower one.
    OrLower,
    /// The requested version or any higher one.
    OrHigher,
}

/// Status line of the final response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseStatus {
    pub code: StatusCode,
    pub reason: Option<String>,
}

impl ResponseStatus {
    /// Status with no explicit reason phrase.
    pub fn new(code: StatusCode) -> Self {
        Self { code, reason: None }
    }
}

/// Source of connected duplex streams.
///
/// Connections are handed out for exactly one exchange. Pooling and reuse are
/// entirely the provider's business.
pub trait ConnectionProvider: Send + Sync {
    type Connection: Send + 'static;

    /// Connect to `host:port`.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Connection, BoxError>> + Send;

    /// Tear down everything the provider holds. Later connects may fail.
    fn release_all(&self) -> impl Future<Output = ()> + Send;
}

/// Receives header name/value bytes as the engine parses them.
pub trait HeaderSink {
    fn on_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), TransportError>;
}

/// Opens exchanges over connections of type `C`.
pub trait WireEngine<C>: Send + Sync {
    type Exchange: Exchange;

    /// Open an exchange that owns `connection`.
    fn open(
        &self,
        connection: C,
        version: Version,
        policy: VersionPolicy,
    ) -> impl Future<Output = Result<Self::Exchange, TransportError>> + Send;
}

/// One request/response cycle over a single connection.
///
/// Calls must follow the phase order: `configure`, `write_request_line`,
/// `write_header`*, `write_body`?, `complete_request`, `read_status`,
/// then the `read_to_*`/`read_*` pairs. Every exchange must end with
/// [`dispose`](Self::dispose); engines should also release the connection on
/// drop so an abandoned exchange does not leak it.
pub trait Exchange: Send {
    /// Declare the request body length and whether request trailers follow.
    fn configure(&mut self, content_length: u64, has_trailing_headers: bool);

    fn write_request_line(&mut self, method: &Method, uri: &Uri) -> Result<(), TransportError>;

    fn write_header(&mut self, name: &str, value: &str) -> Result<(), TransportError>;

    /// Write the whole request body in one call.
    fn write_body(
        &mut self,
        body: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Finish the request; nothing more may be written.
    fn complete_request(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Advance past informational responses to the final status line.
    fn read_status(
        &mut self,
    ) -> impl Future<Output = Result<ResponseStatus, TransportError>> + Send;

    /// Advance to the response headers. Returns false if there are none.
    fn read_to_headers(&mut self) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Feed the headers of the current header phase to `sink`.
    fn read_headers<S>(
        &mut self,
        sink: &mut S,
    ) -> impl Future<Output = Result<(), TransportError>> + Send
    where
        S: HeaderSink + Send;

    /// Advance to the response content. Returns false if there is no content.
    fn read_to_content(&mut self) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Read content of the current segment into `buffer`.
    ///
    /// The engine fills `buffer` completely unless the segment ends first, so
    /// a short read means the segment is finished. Returns 0 at the end of
    /// the segment.
    fn read_content(
        &mut self,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<usize, TransportError>> + Send;

    /// Advance to the next content segment. Returns false if none follows.
    fn read_to_next_content_segment(
        &mut self,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Advance to trailing headers. Returns false if there are none.
    fn read_to_trailing_headers(
        &mut self,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Release the exchange and the connection it owns.
    fn dispose(self) -> impl Future<Output = ()> + Send;
}
