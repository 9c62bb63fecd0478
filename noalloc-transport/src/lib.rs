//! HTTP/1.1 transport for a request pipeline.
//!
//! The transport takes a [`PipelineMessage`], drives one HTTP/1.1
//! request/response exchange through a [`ConnectionProvider`] and a
//! [`WireEngine`], and returns a [`ResponseModel`] with the status, headers
//! and content of the response.
//!
//! Response content is read into one fixed-capacity buffer per exchange and
//! handed out without copying. Content must be strictly smaller than the
//! buffer; larger responses fail with [`TransportError::ContentTooLarge`].
//!
//! ## Example
//!
//! ```ignore
//! use noalloc_transport::{HttpTransport, RequestMethod};
//!
//! let transport = HttpTransport::builder()
//!     .port_from_uri(443)
//!     .build()?;
//!
//! let message = transport
//!     .create_message(RequestMethod::Put, "https://example.com/items/1".parse()?)
//!     .with_header("content-type", "application/json")
//!     .with_content(r#"{"name":"one"}"#);
//!
//! let response = transport.process(&message).await?;
//! println!("{} {}", response.status(), response.client_request_id());
//! ```
//!
//! ## Cancellation
//!
//! Every message carries a [`CancellationToken`]. It is checked at each
//! suspension point of the exchange; a cancelled exchange fails with
//! [`TransportError::Cancelled`] and the connection is still disposed.
//!
//! ```ignore
//! let token = CancellationToken::new();
//! let message = transport
//!     .create_message(RequestMethod::Get, uri)
//!     .with_cancellation(token.clone());
//!
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     token.cancel();
//! });
//! let result = transport.process(&message).await;
//! ```
//!
//! ## Custom collaborators
//!
//! [`HttpTransport::from_parts`] accepts any [`ConnectionProvider`] and
//! [`WireEngine`] pair, so the orchestration can run over something other
//! than TCP and hyper.

mod builder;
mod client;
mod config;
#[cfg(test)]
mod mock;
mod orchestrator;
mod request;
mod request_id;
mod response;
pub mod transport;

pub use builder::TransportBuilder;
pub use client::{DefaultTransport, HttpTransport};
pub use config::{DEFAULT_PORT, DEFAULT_READ_BUFFER_CAPACITY, PortSelection, TransportConfig};
pub use orchestrator::ExchangeOrchestrator;
pub use request_id::{RandomRequestId, RequestIdGenerator, SequentialRequestId};
pub use response::{DuplicateHeaderPolicy, ResponseHeaders, ResponseModel};

// Re-export the contracts and message types
pub use noalloc_transport_core::{
    BoxError, CancellationToken, ConnectionProvider, Exchange, HeaderSink, Phase, PipelineMessage,
    RequestContent, RequestHeaders, RequestMethod, ResponseStatus, StreamContent, TransportError,
    VersionPolicy, WireEngine,
};

// Re-export commonly used external types
pub use bytes::Bytes;
pub use http::Uri;
