//! Transport error types.
//!
//! This module provides the error types shared by the adapter and the wire contracts:
//! - [`TransportError`]: terminal failure of one exchange
//! - [`Phase`]: the exchange phase a failure or cancellation happened in

use std::fmt;
use std::str::Utf8Error;

/// Boxed error used to carry failures from external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The phases of one exchange, in the order they are driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Connect,
    Open,
    WriteRequestLine,
    WriteHeaders,
    MaterializeContent,
    WriteBody,
    CompleteRequest,
    ReadStatus,
    ReadHeaders,
    ReadContent,
    ReadTrailers,
}

impl Phase {
    /// Get the string representation of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Open => "open",
            Phase::WriteRequestLine => "write_request_line",
            Phase::WriteHeaders => "write_headers",
            Phase::MaterializeContent => "materialize_content",
            Phase::WriteBody => "write_body",
            Phase::CompleteRequest => "complete_request",
            Phase::ReadStatus => "read_status",
            Phase::ReadHeaders => "read_headers",
            Phase::ReadContent => "read_content",
            Phase::ReadTrailers => "read_trailers",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a single exchange.
///
/// Every variant is local to the exchange that produced it. Nothing in this
/// workspace retries on any of them; that is left to the calling pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection provider could not establish a connection.
    #[error("failed to connect to {host}:{port}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: BoxError,
    },

    /// The request method has no wire mapping.
    #[error("unsupported request method `{0}`")]
    UnsupportedMethod(String),

    /// A request header was reserved but never given a value.
    #[error("request header `{name}` has no value")]
    MissingHeaderValue { name: String },

    /// The request content cannot report its length up front.
    #[error("request content length cannot be computed up front")]
    IndeterminateContentLength,

    /// The request content produced a different number of bytes than it declared.
    #[error("request content declared {declared} bytes but produced {actual}")]
    ContentLengthMismatch { declared: u64, actual: u64 },

    /// The request content source failed while being materialized.
    #[error("request content failed")]
    Content(#[source] BoxError),

    /// A response header name or value is not valid UTF-8.
    #[error("response header {field} is not valid UTF-8")]
    HeaderDecodeError {
        field: &'static str,
        #[source]
        source: Utf8Error,
    },

    /// A response header name was seen twice under the reject policy.
    #[error("duplicate response header `{0}`")]
    DuplicateHeader(String),

    /// The response content does not fit in the read buffer.
    #[error("response content exceeds the {capacity}-byte read buffer")]
    ContentTooLarge { capacity: usize },

    /// The caller cancelled the exchange.
    #[error("exchange cancelled during {phase}")]
    Cancelled { phase: Phase },

    /// The request URI cannot be used to reach an endpoint.
    #[error("invalid request uri: {0}")]
    InvalidUri(String),

    /// The wire engine cannot speak the requested protocol version.
    #[error("protocol version {0:?} is not supported")]
    UnsupportedVersion(http::Version),

    /// The wire engine failed while driving a phase.
    #[error("wire failure during {phase}")]
    Wire {
        phase: Phase,
        #[source]
        source: BoxError,
    },

    /// Invalid transport configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// Create a wire error for the given phase.
    pub fn wire<E: Into<BoxError>>(phase: Phase, source: E) -> Self {
        TransportError::Wire {
            phase,
            source: source.into(),
        }
    }

    /// The phase this error is tied to, if it carries one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            TransportError::ConnectionFailed { .. } => Some(Phase::Connect),
            TransportError::Cancelled { phase } | TransportError::Wire { phase, .. } => {
                Some(*phase)
            }
            TransportError::ContentTooLarge { .. } => Some(Phase::ReadContent),
            TransportError::Content(_) | TransportError::ContentLengthMismatch { .. } => {
                Some(Phase::MaterializeContent)
            }
            _ => None,
        }
    }

    /// Returns true if the exchange ended because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled { .. })
    }
}
