//! Pipeline messages submitted to the transport.

use http::Uri;
use tokio_util::sync::CancellationToken;

use crate::{RequestContent, RequestMethod};

/// Ordered request headers.
///
/// Names compare case-insensitively and appear at most once. A header may be
/// reserved without a value (see [`reserve`](Self::reserve)); sending a
/// request that still carries a reserved header is a caller error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, Option<String>)>,
}

impl RequestHeaders {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header value, replacing any existing value in place.
    pub fn set<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.put(name.into(), Some(value.into()));
    }

    /// Reserve a header slot whose value is filled in later.
    ///
    /// An existing value for the same name is cleared.
    pub fn reserve<N: Into<String>>(&mut self, name: N) {
        self.put(name.into(), None);
    }

    fn put(&mut self, name: String, value: Option<String>) {
        match self.position(&name) {
            Some(index) => self.entries[index].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Get a header value. Returns `None` for absent and reserved headers.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|index| self.entries[index].1.as_deref())
    }

    /// Check if a header name is present, with or without a value.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove a header. Returns true if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Iterate headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Returns the number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One request submitted to the transport, together with its cancellation
/// signal.
///
/// # Example
///
/// ```ignore
/// use noalloc_transport_core::{PipelineMessage, RequestMethod};
///
/// let mut message = PipelineMessage::new(RequestMethod::Put, "https://example.com/blob".parse()?)
///     .with_content("hello world");
/// message.headers_mut().set("content-type", "text/plain");
/// ```
pub struct PipelineMessage {
    method: RequestMethod,
    uri: Uri,
    headers: RequestHeaders,
    content: Option<Box<dyn RequestContent>>,
    client_request_id: Option<String>,
    cancellation: CancellationToken,
}

impl PipelineMessage {
    /// Create a message with no headers, no content and a fresh cancellation token.
    pub fn new(method: RequestMethod, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: RequestHeaders::new(),
            content: None,
            client_request_id: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach request content.
    pub fn with_content<C: RequestContent + 'static>(mut self, content: C) -> Self {
        self.content = Some(Box::new(content));
        self
    }

    /// Add a header.
    pub fn with_header<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.headers.set(name, value);
        self
    }

    /// Use the given token as this message's cancellation signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Assign the client request id that the response will report.
    pub fn with_client_request_id<S: Into<String>>(mut self, id: S) -> Self {
        self.client_request_id = Some(id.into());
        self
    }

    pub fn method(&self) -> &RequestMethod {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &RequestHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut RequestHeaders {
        &mut self.headers
    }

    pub fn content(&self) -> Option<&dyn RequestContent> {
        self.content.as_deref()
    }

    pub fn set_content<C: RequestContent + 'static>(&mut self, content: C) {
        self.content = Some(Box::new(content));
    }

    pub fn client_request_id(&self) -> Option<&str> {
        self.client_request_id.as_deref()
    }

    pub fn set_client_request_id<S: Into<String>>(&mut self, id: S) {
        self.client_request_id = Some(id.into());
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl std::fmt::Debug for PipelineMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMessage")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field(
                "content_length",
                &self.content.as_ref().map(|c| c.try_compute_length()),
            )
            .field("client_request_id", &self.client_request_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
