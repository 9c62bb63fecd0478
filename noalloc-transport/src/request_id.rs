//! Client request id generation.
//!
//! Responses that were not given a client request id by the caller generate
//! one lazily through a [`RequestIdGenerator`] injected into the transport.

use std::sync::atomic::{AtomicU64, Ordering};

/// Produces client request ids.
pub trait RequestIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random version 4 UUIDs in their hyphenated text form.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomRequestId;

impl RequestIdGenerator for RandomRequestId {
    fn next_id(&self) -> String {
        let mut bytes: [u8; 16] = rand::random();
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;

        let mut id = String::with_capacity(36);
        for (index, byte) in bytes.iter().enumerate() {
            if matches!(index, 4 | 6 | 8 | 10) {
                id.push('-');
            }
            id.push_str(&format!("{byte:02x}"));
        }
        id
    }
}

/// Deterministic ids of the form `{prefix}-{n}`, counting from 1.
#[derive(Debug)]
pub struct SequentialRequestId {
    prefix: String,
    next: AtomicU64,
}

impl SequentialRequestId {
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl RequestIdGenerator for SequentialRequestId {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}
