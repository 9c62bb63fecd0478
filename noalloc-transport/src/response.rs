//! Response model assembled from wire-engine callbacks.
//!
//! [`ResponseModel`] implements [`HeaderSink`], so the wire engine feeds it
//! header bytes directly. Names and values are decoded to text as they
//! arrive; invalid UTF-8 fails the exchange.

use std::fmt;
use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use noalloc_transport_core::{HeaderSink, ResponseStatus, TransportError};
use serde::Deserialize;

use crate::request_id::RequestIdGenerator;

/// What to do when a response repeats a header name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateHeaderPolicy {
    /// Fail the exchange with [`TransportError::DuplicateHeader`].
    #[default]
    Reject,
    /// Keep every value, in arrival order.
    Merge,
}

#[derive(Clone, Debug)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

/// Response headers (and trailers) with case-insensitive lookup.
///
/// Lookups are linear scans; responses carry few enough headers that this
/// beats hashing.
#[derive(Clone, Debug, Default)]
pub struct ResponseHeaders {
    entries: Vec<HeaderEntry>,
}

impl ResponseHeaders {
    /// Create empty headers.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn insert(
        &mut self,
        name: String,
        value: String,
        policy: DuplicateHeaderPolicy,
    ) -> Result<(), TransportError> {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.name.eq_ignore_ascii_case(&name))
        {
            None => {
                self.entries.push(HeaderEntry {
                    name,
                    values: vec![value],
                });
                Ok(())
            }
            Some(entry) => match policy {
                DuplicateHeaderPolicy::Reject => Err(TransportError::DuplicateHeader(name)),
                DuplicateHeaderPolicy::Merge => {
                    entry.values.push(value);
                    Ok(())
                }
            },
        }
    }

    /// Get the first value of a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entry(name)
            .and_then(|entry| entry.values.first())
            .map(String::as_str)
    }

    /// Get all values for a header (only more than one under the merge policy).
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> {
        self.entry(name)
            .into_iter()
            .flat_map(|entry| entry.values.iter().map(String::as_str))
    }

    /// Check if a header exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Iterate over every name/value pair in arrival order of the names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|entry| {
            entry
                .values
                .iter()
                .map(move |value| (entry.name.as_str(), value.as_str()))
        })
    }

    /// Returns the number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of one exchange.
///
/// Content is held as [`Bytes`] split off the exchange's read buffer, so it
/// is never larger than the configured read buffer capacity.
pub struct ResponseModel {
    status: u16,
    reason: Option<String>,
    headers: ResponseHeaders,
    content: Option<Bytes>,
    client_request_id: OnceLock<String>,
    id_generator: Arc<dyn RequestIdGenerator>,
    duplicate_headers: DuplicateHeaderPolicy,
}

impl ResponseModel {
    /// Create an empty response that reports status 0 until a status is set.
    pub fn new(
        duplicate_headers: DuplicateHeaderPolicy,
        id_generator: Arc<dyn RequestIdGenerator>,
    ) -> Self {
        Self {
            status: 0,
            reason: None,
            headers: ResponseHeaders::new(),
            content: None,
            client_request_id: OnceLock::new(),
            id_generator,
            duplicate_headers,
        }
    }

    pub(crate) fn set_status(&mut self, status: ResponseStatus) {
        self.status = status.code.as_u16();
        self.reason = status.reason;
    }

    pub(crate) fn set_content(&mut self, content: Bytes) {
        self.content = Some(content);
    }

    /// The response status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The reason phrase, if the server sent one.
    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Response headers, including any trailers.
    pub fn headers(&self) -> &ResponseHeaders {
        &self.headers
    }

    /// The response content, if the response had a content phase.
    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    /// A readable stream over the content. Empty if there was no content.
    ///
    /// `Cursor<Bytes>` implements both `std::io::Read` and
    /// `tokio::io::AsyncRead`.
    pub fn content_stream(&self) -> Cursor<Bytes> {
        Cursor::new(self.content.clone().unwrap_or_default())
    }

    /// Consume the response and return its content.
    pub fn into_content(self) -> Option<Bytes> {
        self.content
    }

    /// The client request id, generated on first access if none was assigned.
    pub fn client_request_id(&self) -> &str {
        self.client_request_id
            .get_or_init(|| self.id_generator.next_id())
    }

    /// Assign the client request id.
    pub fn set_client_request_id<S: Into<String>>(&mut self, id: S) {
        self.client_request_id = OnceLock::from(id.into());
    }
}

impl HeaderSink for ResponseModel {
    fn on_header(&mut self, name: &[u8], value: &[u8]) -> Result<(), TransportError> {
        let name = std::str::from_utf8(name)
            .map_err(|source| TransportError::HeaderDecodeError { field: "name", source })?;
        let value = std::str::from_utf8(value)
            .map_err(|source| TransportError::HeaderDecodeError { field: "value", source })?;
        self.headers
            .insert(name.to_owned(), value.to_owned(), self.duplicate_headers)
    }
}

impl fmt::Debug for ResponseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseModel")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .field("content_len", &self.content.as_ref().map(Bytes::len))
            .field("client_request_id", &self.client_request_id.get())
            .finish_non_exhaustive()
    }
}
