//! Streaming response writer.
//!
//! The status line and headers are serialized lazily, on the first body write,
//! flush or finalize. Until then the handler can keep editing headers; once
//! [`ResponseWriter::write_header`] runs, a snapshot of the headers is frozen
//! and later edits no longer reach the wire.
//!
//! Framing is settled at serialization time:
//!
//! | situation                                         | framing                     |
//! |---------------------------------------------------|-----------------------------|
//! | status 1xx, 204, 304                              | no body                     |
//! | request method HEAD                               | body bytes dropped          |
//! | `Content-Length` set by the handler               | fixed length                |
//! | `Transfer-Encoding: chunked` set by the handler   | chunked                     |
//! | finalized before any body byte                    | `Content-Length: 0`         |
//! | keep-alive HTTP/1.1 request                       | chunked                     |
//! | anything else                                     | until close                 |

use futures::channel::oneshot;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, StatusCode, Version};
use tokio::io::AsyncWrite;
use tracing::{debug, trace, warn};

use crate::codec::{HeaderEncoder, PayloadEncoder, detect_content_type, is_chunked};
use crate::connection::body::DrainBudget;
use crate::connection::hijack::{Hijacked, OnHijack};
use crate::connection::message_writer::MessageWriter;
use crate::ensure;
use crate::protocol::{RequestHead, SendError, has_connection_token};
use crate::utils::Scratch;

/// Pooled response state, reset for every request.
#[derive(Debug)]
pub struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    snapshot: HeaderMap,
    encoder: PayloadEncoder,
    written: u64,
    wrote_header: bool,
    header_sent: bool,
    flushed: bool,
    hijacked: bool,
    must_close: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            snapshot: HeaderMap::new(),
            encoder: PayloadEncoder::default(),
            written: 0,
            wrote_header: false,
            header_sent: false,
            flushed: false,
            hijacked: false,
            must_close: false,
        }
    }
}

impl ResponseState {
    /// Clears everything but keeps the header map allocations.
    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.snapshot.clear();
        self.encoder = PayloadEncoder::default();
        self.written = 0;
        self.wrote_header = false;
        self.header_sent = false;
        self.flushed = false;
        self.hijacked = false;
        self.must_close = false;
    }
}

/// What the response writer needs to know about the request it answers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestInfo {
    keep_alive: bool,
    is_head: bool,
    version: Version,
}

impl From<&RequestHead> for RequestInfo {
    fn from(head: &RequestHead) -> Self {
        Self { keep_alive: head.is_keep_alive(), is_head: head.is_head(), version: head.version() }
    }
}

/// The response sink handed to a handler.
pub struct ResponseWriter<'a, R, W> {
    writer: MessageWriter<'a, W>,
    state: &'a mut ResponseState,
    scratch: &'a mut Scratch,
    hijack: &'a mut Option<oneshot::Sender<Hijacked<R, W>>>,
    request: RequestInfo,
    high_water: usize,
    budget: &'a DrainBudget,
}

impl<'a, R, W> ResponseWriter<'a, R, W>
where
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(
        writer: MessageWriter<'a, W>,
        state: &'a mut ResponseState,
        scratch: &'a mut Scratch,
        hijack: &'a mut Option<oneshot::Sender<Hijacked<R, W>>>,
        request: RequestInfo,
        high_water: usize,
        budget: &'a DrainBudget,
    ) -> Self {
        Self { writer, state, scratch, hijack, request, high_water, budget }
    }

    /// The status that is or will be sent.
    pub fn status(&self) -> StatusCode {
        self.state.status
    }

    /// The live header map.
    pub fn headers(&self) -> &HeaderMap {
        &self.state.headers
    }

    /// The live header map. Edits made after the header was written are
    /// kept here but not sent.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.state.headers
    }

    /// Body bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.state.written
    }

    pub fn is_header_written(&self) -> bool {
        self.state.wrote_header
    }

    pub fn is_flushed(&self) -> bool {
        self.state.flushed
    }

    pub fn is_hijacked(&self) -> bool {
        self.state.hijacked
    }

    /// True when the connection has to close after this response.
    pub(crate) fn must_close(&self) -> bool {
        self.state.must_close
    }

    /// Records the status and freezes the headers. Only the first call
    /// counts; later calls are logged and ignored.
    pub fn write_header(&mut self, status: StatusCode) -> Result<(), SendError> {
        ensure!(!self.state.hijacked, SendError::Hijacked);

        if self.state.wrote_header {
            warn!(status = %self.state.status, ignored = %status, "superfluous write_header call");
            return Ok(());
        }

        self.state.status = status;
        self.freeze();
        Ok(())
    }

    /// Writes body bytes, committing the header first if needed. Returns the
    /// number of bytes accepted, which is all of `data`.
    ///
    /// # Errors
    ///
    /// [`SendError::BodyNotAllowed`] for a non-empty write when the status
    /// forbids a body, [`SendError::Hijacked`] after [`hijack`](Self::hijack),
    /// and transport failures when the buffer is pushed out.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, SendError> {
        ensure!(!self.state.hijacked, SendError::Hijacked);

        if !self.state.wrote_header {
            self.freeze();
        }
        if !self.state.header_sent {
            self.commit(data, false);
        }

        if self.state.encoder.is_no_body() {
            ensure!(data.is_empty(), SendError::body_not_allowed(self.state.status));
            return Ok(0);
        }

        self.state.encoder.encode(data, self.writer.buffer_mut(), self.scratch);
        self.state.written += data.len() as u64;
        self.writer.write_if_above(self.high_water).await?;
        Ok(data.len())
    }

    /// Commits the header (implying 200) and pushes everything buffered to
    /// the transport.
    pub async fn flush(&mut self) -> Result<(), SendError> {
        ensure!(!self.state.hijacked, SendError::Hijacked);

        if !self.state.wrote_header {
            self.freeze();
        }
        if !self.state.header_sent {
            self.commit(&[], false);
        }

        self.writer.flush().await?;
        self.state.flushed = true;
        Ok(())
    }

    /// Takes the connection away from the engine.
    ///
    /// The returned future resolves once the handler has returned; see
    /// [`hijack`](crate::connection::hijack) for how to use it. Response bytes
    /// still buffered at that point are handed over unsent.
    pub fn hijack(&mut self) -> Result<OnHijack<R, W>, SendError> {
        ensure!(!self.state.hijacked, SendError::Hijacked);

        let (sender, on_hijack) = OnHijack::channel();
        *self.hijack = Some(sender);
        self.state.hijacked = true;
        trace!("connection marked as hijacked");
        Ok(on_hijack)
    }

    /// Completes the response: commits the header if nothing did yet, writes
    /// the chunked terminator when chunked, and flushes.
    pub(crate) async fn finalize(&mut self) -> Result<(), SendError> {
        ensure!(!self.state.hijacked, SendError::Hijacked);

        if !self.state.wrote_header {
            self.freeze();
        }
        if !self.state.header_sent {
            self.commit(&[], true);
        }

        if !self.state.encoder.finish(self.writer.buffer_mut()) {
            self.state.must_close = true;
        }
        self.writer.flush().await?;
        self.state.flushed = true;
        Ok(())
    }

    fn freeze(&mut self) {
        let state = &mut *self.state;
        state.wrote_header = true;
        state.snapshot.clear();
        for (name, value) in &state.headers {
            state.snapshot.append(name.clone(), value.clone());
        }
    }

    /// Serializes the frozen header into the write buffer and picks the body
    /// framing. `first` is the first body write, `complete` means the
    /// response ends without any body bytes.
    fn commit(&mut self, first: &[u8], complete: bool) {
        let request = self.request;
        let state = &mut *self.state;
        let status = state.status;
        let headers = &mut state.snapshot;

        let body_allowed = body_allowed_for(status);
        if body_allowed && !headers.contains_key(CONTENT_TYPE) && !headers.contains_key(TRANSFER_ENCODING) {
            headers.insert(CONTENT_TYPE, detect_content_type(first));
        }

        let encoder = if !body_allowed {
            headers.remove(TRANSFER_ENCODING);
            PayloadEncoder::no_body()
        } else if request.is_head {
            PayloadEncoder::discard()
        } else if let Some(length) = declared_length(headers) {
            PayloadEncoder::fix_length(length)
        } else if headers.contains_key(TRANSFER_ENCODING) {
            if is_chunked(headers.get(TRANSFER_ENCODING)) {
                PayloadEncoder::chunked()
            } else {
                state.must_close = true;
                PayloadEncoder::until_close()
            }
        } else if complete {
            headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            PayloadEncoder::fix_length(0)
        } else if request.keep_alive && request.version == Version::HTTP_11 {
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            PayloadEncoder::chunked()
        } else {
            state.must_close = true;
            PayloadEncoder::until_close()
        };

        if self.budget.is_exceeded() {
            debug!("unread request body exceeds the drain limit, closing after this response");
            state.must_close = true;
        }

        if !request.keep_alive || state.must_close || has_connection_token(headers, "close") {
            state.must_close = true;
            if !has_connection_token(headers, "close") {
                headers.insert(CONNECTION, HeaderValue::from_static("close"));
            }
        } else if request.version == Version::HTTP_10 {
            headers.entry(CONNECTION).or_insert(HeaderValue::from_static("keep-alive"));
        }

        HeaderEncoder.encode(status, headers, self.writer.buffer_mut());
        trace!(%status, chunked = encoder.is_chunked(), must_close = state.must_close, "response header committed");

        state.encoder = encoder;
        state.header_sent = true;
    }
}

impl<R, W> std::fmt::Debug for ResponseWriter<'_, R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter").field("state", &self.state).field("request", &self.request).finish_non_exhaustive()
    }
}

fn body_allowed_for(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

/// The `Content-Length` set by the handler. An unparseable value is dropped.
fn declared_length(headers: &mut HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_LENGTH)?;
    let length = value.to_str().ok().and_then(|s| s.trim().parse::<u64>().ok());
    if length.is_none() {
        warn!(value = ?value, "dropping invalid response content-length");
        headers.remove(CONTENT_LENGTH);
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SCRATCH_LEN;
    use bytes::BytesMut;
    use http::Method;
    use http::Uri;
    use std::time::Duration;
    use tokio::time::Instant;

    type Writer<'a> = ResponseWriter<'a, (), Vec<u8>>;

    struct Fixture {
        io: Vec<u8>,
        buffer: BytesMut,
        state: ResponseState,
        scratch: Scratch,
        hijack: Option<oneshot::Sender<Hijacked<(), Vec<u8>>>>,
        request: RequestInfo,
        high_water: usize,
        budget: DrainBudget,
    }

    impl Fixture {
        fn new(method: Method, version: Version, connection: Option<&'static str>) -> Self {
            let mut head = RequestHead::default();
            head.set_start_line(method, Uri::from_static("/"), version);
            if let Some(value) = connection {
                head.headers_mut().insert(CONNECTION, HeaderValue::from_static(value));
            }
            head.update_flags();

            Self {
                io: Vec::new(),
                buffer: BytesMut::new(),
                state: ResponseState::default(),
                scratch: [0; SCRATCH_LEN],
                hijack: None,
                request: RequestInfo::from(&head),
                high_water: 2048,
                budget: DrainBudget::new(u64::MAX),
            }
        }

        fn keep_alive() -> Self {
            Self::new(Method::GET, Version::HTTP_11, None)
        }

        fn writer(&mut self) -> Writer<'_> {
            let writer = MessageWriter::new(&mut self.io, &mut self.buffer, Instant::now() + Duration::from_secs(5));
            ResponseWriter::new(
                writer,
                &mut self.state,
                &mut self.scratch,
                &mut self.hijack,
                self.request,
                self.high_water,
                &self.budget,
            )
        }

        fn output(&self) -> &str {
            std::str::from_utf8(&self.io).unwrap()
        }
    }

    #[tokio::test]
    async fn keep_alive_writes_are_chunked() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        writer.write(b"hello").await.unwrap();
        writer.write(b" world").await.unwrap();
        writer.finalize().await.unwrap();
        assert_eq!(writer.written(), 11);
        assert!(!writer.must_close());

        assert_eq!(
            fixture.output(),
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ntransfer-encoding: chunked\r\n\r\n\
             5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn empty_response_gets_zero_length() {
        let mut fixture = Fixture::keep_alive();
        fixture.writer().finalize().await.unwrap();

        assert_eq!(
            fixture.output(),
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: 0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn declared_length_and_type() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        writer.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from_static("5"));
        writer.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        writer.write_header(StatusCode::CREATED).unwrap();
        writer.write(b"{\"a\"").await.unwrap();
        writer.write(b"}").await.unwrap();
        writer.finalize().await.unwrap();

        assert_eq!(
            fixture.output(),
            "HTTP/1.1 201 Created\r\ncontent-length: 5\r\ncontent-type: application/json\r\n\r\n{\"a\"}"
        );
    }

    #[tokio::test]
    async fn headers_frozen_after_write_header() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        writer.headers_mut().insert("x-before", HeaderValue::from_static("1"));
        writer.write_header(StatusCode::ACCEPTED).unwrap();
        writer.headers_mut().insert("x-after", HeaderValue::from_static("1"));
        writer.write_header(StatusCode::NOT_FOUND).unwrap();
        assert_eq!(writer.status(), StatusCode::ACCEPTED);
        writer.finalize().await.unwrap();

        let output = fixture.output();
        assert!(output.starts_with("HTTP/1.1 202 Accepted\r\n"));
        assert!(output.contains("x-before: 1\r\n"));
        assert!(!output.contains("x-after"));
    }

    #[tokio::test]
    async fn no_content_refuses_body() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        writer.write_header(StatusCode::NO_CONTENT).unwrap();
        let result = writer.write(b"nope").await;
        assert!(matches!(result, Err(SendError::BodyNotAllowed { .. })));
        assert_eq!(writer.write(b"").await.unwrap(), 0);
        writer.finalize().await.unwrap();

        assert_eq!(fixture.output(), "HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[tokio::test]
    async fn head_response_has_no_body() {
        let mut fixture = Fixture::new(Method::HEAD, Version::HTTP_11, None);
        let mut writer = fixture.writer();

        writer.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from_static("11"));
        writer.write(b"hello world").await.unwrap();
        writer.finalize().await.unwrap();
        assert_eq!(writer.written(), 11);

        assert_eq!(
            fixture.output(),
            "HTTP/1.1 200 OK\r\ncontent-length: 11\r\ncontent-type: text/plain; charset=utf-8\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn close_delimited_without_keep_alive() {
        let mut fixture = Fixture::new(Method::GET, Version::HTTP_10, None);
        let mut writer = fixture.writer();

        writer.write(b"<html>").await.unwrap();
        writer.finalize().await.unwrap();
        assert!(writer.must_close());

        assert_eq!(
            fixture.output(),
            "HTTP/1.1 200 OK\r\ncontent-type: text/html; charset=utf-8\r\nconnection: close\r\n\r\n<html>"
        );
    }

    #[tokio::test]
    async fn http_10_keep_alive_is_echoed() {
        let mut fixture = Fixture::new(Method::GET, Version::HTTP_10, Some("keep-alive"));
        let mut writer = fixture.writer();

        writer.finalize().await.unwrap();
        assert!(!writer.must_close());

        assert!(fixture.output().contains("connection: keep-alive\r\n"));
    }

    #[tokio::test]
    async fn handler_close_forces_close() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        writer.headers_mut().insert(CONNECTION, HeaderValue::from_static("Close"));
        writer.finalize().await.unwrap();

        assert!(writer.must_close());
    }

    #[tokio::test]
    async fn undrainable_request_body_announces_close() {
        let mut fixture = Fixture::keep_alive();
        fixture.budget = DrainBudget::new(8);
        fixture.budget.track(Some(100));
        let mut writer = fixture.writer();

        writer.write(b"ignored").await.unwrap();
        writer.finalize().await.unwrap();
        assert!(writer.must_close());

        let output = fixture.output();
        assert!(output.contains("transfer-encoding: chunked\r\nconnection: close\r\n\r\n"));
        assert!(output.ends_with("7\r\nignored\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn short_fixed_length_body_closes() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        writer.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from_static("10"));
        writer.write(b"short").await.unwrap();
        writer.finalize().await.unwrap();

        assert!(writer.must_close());
    }

    #[tokio::test]
    async fn buffer_pushed_at_high_water() {
        let mut fixture = Fixture::keep_alive();
        fixture.high_water = 64;
        let mut writer = fixture.writer();

        writer.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from_static("100"));
        writer.write(&[b'a'; 100]).await.unwrap();
        assert!(!writer.is_flushed());
        drop(writer);

        assert!(fixture.buffer.is_empty());
        assert!(fixture.io.ends_with(&[b'a'; 100]));
    }

    #[tokio::test]
    async fn flush_commits_header() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        writer.flush().await.unwrap();
        assert!(writer.is_header_written());
        assert!(writer.is_flushed());
        drop(writer);

        assert!(fixture.output().ends_with("transfer-encoding: chunked\r\n\r\n"));
    }

    #[tokio::test]
    async fn hijack_is_one_way() {
        let mut fixture = Fixture::keep_alive();
        let mut writer = fixture.writer();

        let _on_hijack = writer.hijack().unwrap();
        assert!(writer.is_hijacked());

        assert!(matches!(writer.hijack(), Err(SendError::Hijacked)));
        assert!(matches!(writer.write(b"x").await, Err(SendError::Hijacked)));
        assert!(matches!(writer.write_header(StatusCode::OK), Err(SendError::Hijacked)));
        assert!(matches!(writer.flush().await, Err(SendError::Hijacked)));
        drop(writer);

        assert!(fixture.hijack.is_some());
        assert!(fixture.io.is_empty());
    }

    #[test]
    fn reset_clears_response_state() {
        let mut state = ResponseState::default();
        state.status = StatusCode::NOT_FOUND;
        state.headers.insert("x-a", HeaderValue::from_static("1"));
        state.hijacked = true;
        state.must_close = true;

        state.reset();

        assert_eq!(state.status, StatusCode::OK);
        assert!(state.headers.is_empty());
        assert!(!state.hijacked);
        assert!(!state.must_close);
    }
}
