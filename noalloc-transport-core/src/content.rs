//! Request content sources.
//!
//! A [`RequestContent`] is written into a single pre-sized buffer before the
//! request body goes out, so every source must know its length up front.
//! [`StreamContent`] adapts an async byte stream and may or may not declare a
//! length; an undeclared length is rejected by the transport.

use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::BoxError;

/// Content produced more bytes than it was allowed to.
#[derive(Debug, thiserror::Error)]
#[error("content exceeds its limit of {limit} bytes")]
pub struct ContentOverflow {
    pub limit: u64,
}

/// A readable, length-bounded request body.
pub trait RequestContent: Send + Sync {
    /// The exact number of bytes [`write_to`](Self::write_to) will produce,
    /// or `None` if it cannot be known before writing.
    fn try_compute_length(&self) -> Option<u64>;

    /// Append the content to `target`, writing at most `limit` bytes.
    ///
    /// Fails with [`ContentOverflow`] as soon as the content would pass
    /// `limit`; nothing past the limit is appended.
    fn write_to<'a>(
        &'a self,
        target: &'a mut BytesMut,
        limit: u64,
    ) -> BoxFuture<'a, Result<(), BoxError>>;
}

fn write_slice(target: &mut BytesMut, data: &[u8], limit: u64) -> Result<(), BoxError> {
    if data.len() as u64 > limit {
        return Err(ContentOverflow { limit }.into());
    }
    target.extend_from_slice(data);
    Ok(())
}

impl RequestContent for Bytes {
    fn try_compute_length(&self) -> Option<u64> {
        Some(self.len() as u64)
    }

    fn write_to<'a>(
        &'a self,
        target: &'a mut BytesMut,
        limit: u64,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        Box::pin(futures::future::ready(write_slice(target, self, limit)))
    }
}

macro_rules! slice_content {
    ($($ty:ty),*) => {
        $(
            impl RequestContent for $ty {
                fn try_compute_length(&self) -> Option<u64> {
                    Some(AsRef::<[u8]>::as_ref(self).len() as u64)
                }

                fn write_to<'a>(
                    &'a self,
                    target: &'a mut BytesMut,
                    limit: u64,
                ) -> BoxFuture<'a, Result<(), BoxError>> {
                    let written = write_slice(target, AsRef::<[u8]>::as_ref(self), limit);
                    Box::pin(futures::future::ready(written))
                }
            }
        )*
    };
}

slice_content!(Vec<u8>, String, &'static [u8], &'static str);

/// Request content backed by an async stream of byte chunks.
///
/// The stream is consumed by the first write; writing the same content twice
/// fails.
pub struct StreamContent {
    length: Option<u64>,
    stream: Mutex<Option<BoxStream<'static, Result<Bytes, BoxError>>>>,
}

impl StreamContent {
    /// Create content whose length is unknown until the stream ends.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            length: None,
            stream: Mutex::new(Some(stream.boxed())),
        }
    }

    /// Create content that declares its total length up front.
    pub fn with_length<S>(stream: S, length: u64) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            length: Some(length),
            stream: Mutex::new(Some(stream.boxed())),
        }
    }
}

impl RequestContent for StreamContent {
    fn try_compute_length(&self) -> Option<u64> {
        self.length
    }

    fn write_to<'a>(
        &'a self,
        target: &'a mut BytesMut,
        limit: u64,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        let taken = match self.stream.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        Box::pin(async move {
            let mut stream = taken.ok_or("stream content was already consumed")?;
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                written += chunk.len() as u64;
                if written > limit {
                    return Err(ContentOverflow { limit }.into());
                }
                target.extend_from_slice(&chunk);
            }
            Ok::<(), BoxError>(())
        })
    }
}

impl std::fmt::Debug for StreamContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContent")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}
