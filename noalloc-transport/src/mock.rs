//! Scripted connection provider and wire engine for orchestrator tests.
//!
//! Every call the orchestrator makes is appended to a shared journal so tests
//! can assert on exact phase order, write counts and disposal.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, StatusCode, Uri, Version};
use noalloc_transport_core::{
    BoxError, CancellationToken, ConnectionProvider, Exchange, HeaderSink, ResponseStatus,
    TransportError, VersionPolicy, WireEngine,
};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Connect(String, u16),
    Configure(u64, bool),
    RequestLine(Method, String),
    Header(String, String),
    Body(Bytes),
    Complete,
    ReadContent(usize),
    Dispose,
}

type RawHeader = (Vec<u8>, Vec<u8>);

/// The response a mock connection will play back.
#[derive(Clone, Debug)]
pub(crate) struct Script {
    status: StatusCode,
    headers: Vec<RawHeader>,
    segments: Vec<Vec<u8>>,
    trailers: Vec<RawHeader>,
    cancel_on_content: Option<CancellationToken>,
}

impl Script {
    pub(crate) fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    pub(crate) fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            segments: Vec::new(),
            trailers: Vec::new(),
            cancel_on_content: None,
        }
    }

    pub(crate) fn header(self, name: &str, value: &str) -> Self {
        self.raw_header(name.as_bytes(), value.as_bytes())
    }

    pub(crate) fn raw_header(mut self, name: &[u8], value: &[u8]) -> Self {
        self.headers.push((name.to_vec(), value.to_vec()));
        self
    }

    pub(crate) fn segment(mut self, data: &[u8]) -> Self {
        self.segments.push(data.to_vec());
        self
    }

    pub(crate) fn trailer(mut self, name: &str, value: &str) -> Self {
        self.trailers.push((name.as_bytes().to_vec(), value.as_bytes().to_vec()));
        self
    }

    /// Cancel `token` from inside the first content read, then never complete it.
    pub(crate) fn cancel_on_content(mut self, token: CancellationToken) -> Self {
        self.cancel_on_content = Some(token);
        self
    }
}

pub(crate) struct MockProvider {
    script: Mutex<Option<Script>>,
    journal: Arc<Mutex<Vec<Call>>>,
    disposed: Arc<AtomicUsize>,
    refuse: bool,
}

impl MockProvider {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            journal: Arc::default(),
            disposed: Arc::default(),
            refuse: false,
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(Script::ok())
        }
    }

    pub(crate) fn journal(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }

    pub(crate) fn dispose_count(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockConnection {
    script: Script,
    journal: Arc<Mutex<Vec<Call>>>,
    disposed: Arc<AtomicUsize>,
}

impl ConnectionProvider for MockProvider {
    type Connection = MockConnection;

    async fn connect(&self, host: &str, port: u16) -> Result<MockConnection, BoxError> {
        self.journal.lock().unwrap().push(Call::Connect(host.to_owned(), port));
        if self.refuse {
            return Err("connection refused".into());
        }
        let script = self.script.lock().unwrap().take().ok_or("script already played")?;
        Ok(MockConnection {
            script,
            journal: self.journal.clone(),
            disposed: self.disposed.clone(),
        })
    }

    async fn release_all(&self) {}
}

pub(crate) struct MockEngine;

impl WireEngine<MockConnection> for MockEngine {
    type Exchange = MockExchange;

    async fn open(
        &self,
        connection: MockConnection,
        version: Version,
        policy: VersionPolicy,
    ) -> Result<MockExchange, TransportError> {
        if version != Version::HTTP_11 || policy != VersionPolicy::Exact {
            return Err(TransportError::UnsupportedVersion(version));
        }
        Ok(MockExchange {
            conn: connection,
            staged: Vec::new(),
            segment: 0,
            offset: 0,
        })
    }
}

pub(crate) struct MockExchange {
    conn: MockConnection,
    staged: Vec<RawHeader>,
    segment: usize,
    offset: usize,
}

impl MockExchange {
    fn record(&self, call: Call) {
        self.conn.journal.lock().unwrap().push(call);
    }
}

impl Exchange for MockExchange {
    fn configure(&mut self, content_length: u64, has_trailing_headers: bool) {
        self.record(Call::Configure(content_length, has_trailing_headers));
    }

    fn write_request_line(&mut self, method: &Method, uri: &Uri) -> Result<(), TransportError> {
        self.record(Call::RequestLine(method.clone(), uri.to_string()));
        Ok(())
    }

    fn write_header(&mut self, name: &str, value: &str) -> Result<(), TransportError> {
        self.record(Call::Header(name.to_owned(), value.to_owned()));
        Ok(())
    }

    async fn write_body(&mut self, body: Bytes) -> Result<(), TransportError> {
        self.record(Call::Body(body));
        Ok(())
    }

    async fn complete_request(&mut self) -> Result<(), TransportError> {
        self.record(Call::Complete);
        Ok(())
    }

    async fn read_status(&mut self) -> Result<ResponseStatus, TransportError> {
        Ok(ResponseStatus::new(self.conn.script.status))
    }

    async fn read_to_headers(&mut self) -> Result<bool, TransportError> {
        self.staged = self.conn.script.headers.clone();
        Ok(!self.staged.is_empty())
    }

    async fn read_headers<S>(&mut self, sink: &mut S) -> Result<(), TransportError>
    where
        S: HeaderSink + Send,
    {
        for (name, value) in std::mem::take(&mut self.staged) {
            sink.on_header(&name, &value)?;
        }
        Ok(())
    }

    async fn read_to_content(&mut self) -> Result<bool, TransportError> {
        Ok(!self.conn.script.segments.is_empty())
    }

    async fn read_content(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        self.record(Call::ReadContent(buffer.len()));
        if let Some(token) = &self.conn.script.cancel_on_content {
            token.cancel();
            return std::future::pending().await;
        }
        let data = &self.conn.script.segments[self.segment][self.offset..];
        let n = data.len().min(buffer.len());
        buffer[..n].copy_from_slice(&data[..n]);
        self.offset += n;
        Ok(n)
    }

    async fn read_to_next_content_segment(&mut self) -> Result<bool, TransportError> {
        self.segment += 1;
        self.offset = 0;
        Ok(self.segment < self.conn.script.segments.len())
    }

    async fn read_to_trailing_headers(&mut self) -> Result<bool, TransportError> {
        self.staged = self.conn.script.trailers.clone();
        Ok(!self.staged.is_empty())
    }

    async fn dispose(self) {
        self.record(Call::Dispose);
        self.conn.disposed.fetch_add(1, Ordering::SeqCst);
    }
}
