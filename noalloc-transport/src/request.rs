//! Request adapter: maps a [`PipelineMessage`] onto wire-engine writes.
//!
//! Everything here is a pure function of the message. Validation runs before
//! a connection is opened, so a rejected message never touches the network.

use bytes::{Bytes, BytesMut};
use http::Method;
use noalloc_transport_core::{
    Exchange, PipelineMessage, RequestContent, RequestMethod, TransportError,
};

/// Upper bound on the buffer reserved before any content is written.
///
/// A declared length is only a claim; past this size the buffer grows with
/// the bytes the content actually produces.
const MAX_UPFRONT_CAPACITY: usize = 64 * 1024;

/// Map an abstract method to its wire token.
///
/// `CONNECT` and `TRACE` are refused: tunnelling and loop-back diagnostics
/// need connection handling this adapter does not do.
pub(crate) fn wire_method(method: &RequestMethod) -> Result<Method, TransportError> {
    match method {
        RequestMethod::Get => Ok(Method::GET),
        RequestMethod::Head => Ok(Method::HEAD),
        RequestMethod::Post => Ok(Method::POST),
        RequestMethod::Put => Ok(Method::PUT),
        RequestMethod::Delete => Ok(Method::DELETE),
        RequestMethod::Patch => Ok(Method::PATCH),
        RequestMethod::Options => Ok(Method::OPTIONS),
        RequestMethod::Trace | RequestMethod::Connect => {
            Err(TransportError::UnsupportedMethod(method.to_string()))
        }
        RequestMethod::Custom(token) => match Method::from_bytes(token.as_bytes()) {
            Ok(method) if method != Method::CONNECT && method != Method::TRACE => Ok(method),
            _ => Err(TransportError::UnsupportedMethod(token.clone())),
        },
    }
}

/// The declared content length of the message, 0 without content.
pub(crate) fn content_length(message: &PipelineMessage) -> Result<u64, TransportError> {
    match message.content() {
        None => Ok(0),
        Some(content) => content
            .try_compute_length()
            .ok_or(TransportError::IndeterminateContentLength),
    }
}

/// Fail on the first header that was reserved but never given a value.
pub(crate) fn check_headers(message: &PipelineMessage) -> Result<(), TransportError> {
    match message.headers().iter().find(|(_, value)| value.is_none()) {
        Some((name, _)) => Err(TransportError::MissingHeaderValue {
            name: name.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Configure the exchange and write the request line and headers.
pub(crate) fn write_head<X: Exchange>(
    exchange: &mut X,
    method: &Method,
    message: &PipelineMessage,
    content_length: u64,
) -> Result<(), TransportError> {
    exchange.configure(content_length, false);
    exchange.write_request_line(method, message.uri())?;
    for (name, value) in message.headers().iter() {
        let value = value.ok_or_else(|| TransportError::MissingHeaderValue {
            name: name.to_owned(),
        })?;
        exchange.write_header(name, value)?;
    }
    Ok(())
}

/// Write the content into one buffer of exactly `length` bytes.
pub(crate) async fn materialize(
    content: &dyn RequestContent,
    length: u64,
) -> Result<Bytes, TransportError> {
    let capacity = usize::try_from(length).map_err(|_| {
        TransportError::Content(format!("content length {length} does not fit in memory").into())
    })?;

    let mut buffer = BytesMut::with_capacity(capacity.min(MAX_UPFRONT_CAPACITY));
    content
        .write_to(&mut buffer, length)
        .await
        .map_err(TransportError::Content)?;

    let actual = buffer.len() as u64;
    if actual != length {
        return Err(TransportError::ContentLengthMismatch {
            declared: length,
            actual,
        });
    }
    Ok(buffer.freeze())
}
