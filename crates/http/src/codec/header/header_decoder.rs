//! Request head parsing.
//!
//! `httparse` validates the start line and header section in place. The head
//! bytes are then split off the read buffer once and every header value
//! becomes a shared slice of that split, so no header bytes are copied.

use std::mem::MaybeUninit;
use std::ops::Range;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use httparse::{Error, Status};
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHead};

/// Maximum number of header fields in one request.
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size of the start line plus the header section.
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Byte offsets of one field's name and value inside the head.
#[derive(Clone, Copy, Default)]
struct FieldSpan {
    name: (usize, usize),
    value: (usize, usize),
}

impl FieldSpan {
    fn locate(head: &[u8], field: &httparse::Header<'_>) -> Self {
        Self { name: offsets(head, field.name.as_bytes()), value: offsets(head, field.value) }
    }

    fn name(&self) -> Range<usize> {
        self.name.0..self.name.1
    }

    fn value(&self) -> Range<usize> {
        self.value.0..self.value.1
    }
}

/// Position of `part` inside `whole`; `part` must be a subslice of `whole`.
fn offsets(whole: &[u8], part: &[u8]) -> (usize, usize) {
    let start = part.as_ptr() as usize - whole.as_ptr() as usize;
    (start, start + part.len())
}

/// Parses request heads into a reused [`RequestHead`].
///
/// On success the head bytes are consumed from the source buffer and whatever
/// follows (body bytes, pipelined requests) stays in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder;

impl HeaderDecoder {
    /// Returns the body framing once a full head is buffered, `None` while
    /// more input is needed.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidLine`] for a malformed start line or a version other
    /// than HTTP/1.0 and HTTP/1.1. Header section problems map to
    /// [`ParseError::InvalidHeader`], [`ParseError::TooManyHeaders`] or
    /// [`ParseError::TooLargeHeader`], and a bad `Content-Length` to
    /// [`ParseError::InvalidContentLength`].
    pub fn decode(&mut self, src: &mut BytesMut, head: &mut RequestHead) -> Result<Option<PayloadSize>, ParseError> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut slots: [MaybeUninit<httparse::Header<'_>>; MAX_HEADER_NUM] = [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut []);

        let head_len = match req.parse_with_uninit_headers(src, &mut slots) {
            Ok(Status::Complete(len)) => len,
            Err(e) => return Err(classify_error(src, e)),
            Ok(Status::Partial) => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

        let (method, uri, version) = start_line(&req)?;

        let field_count = req.headers.len();
        let mut spans = [FieldSpan::default(); MAX_HEADER_NUM];
        for (span, field) in spans.iter_mut().zip(req.headers.iter()) {
            *span = FieldSpan::locate(src, field);
        }

        let bytes = src.split_to(head_len).freeze();
        trace!(head_len, field_count, "parsed request head");

        head.set_start_line(method, uri, version);
        fill_headers(head.headers_mut(), &bytes, &spans[..field_count])?;
        head.update_flags();

        let payload_size = parse_payload(head.headers())?;
        head.set_payload_size(payload_size);
        Ok(Some(payload_size))
    }
}

fn start_line(req: &httparse::Request<'_, '_>) -> Result<(Method, Uri, Version), ParseError> {
    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        other => return Err(ParseError::invalid_line(format!("unsupported http version {other:?}"))),
    };

    let method = req.method.ok_or_else(|| ParseError::invalid_line("missing method"))?;
    let method = Method::from_bytes(method.as_bytes()).map_err(ParseError::invalid_line)?;

    let target = req.path.ok_or_else(|| ParseError::invalid_line("missing request target"))?;
    let uri = Uri::try_from(target).map_err(ParseError::invalid_line)?;

    Ok((method, uri, version))
}

fn fill_headers(headers: &mut HeaderMap, bytes: &Bytes, spans: &[FieldSpan]) -> Result<(), ParseError> {
    headers.reserve(spans.len());
    for span in spans {
        let name = HeaderName::from_bytes(&bytes[span.name()]).map_err(ParseError::invalid_header)?;

        // SAFETY: httparse only accepts header values made of visible
        // ASCII, obs-text, spaces and tabs, which is what HeaderValue allows.
        let value = unsafe { HeaderValue::from_maybe_shared_unchecked(bytes.slice(span.value())) };
        headers.append(name, value);
    }
    Ok(())
}

/// Maps an httparse failure to a request-line or a header error.
///
/// httparse reports both with the same error kinds, so the start line is
/// parsed again on its own. It stops short of the header section there, so a
/// start line that parses cleanly means the failure came from a header.
fn classify_error(src: &[u8], e: Error) -> ParseError {
    if e == Error::TooManyHeaders {
        return ParseError::too_many_headers(MAX_HEADER_NUM);
    }

    let Some(line_end) = src.iter().position(|b| *b == b'\n') else {
        return ParseError::invalid_line(e);
    };
    match httparse::Request::new(&mut []).parse(&src[..=line_end]) {
        Ok(_) | Err(Error::TooManyHeaders) => ParseError::invalid_header(e),
        Err(_) => ParseError::invalid_line(e),
    }
}

/// Works out the body framing of a request.
///
/// Any `Transfer-Encoding` overrides `Content-Length`. Its final coding has to
/// be `chunked`, since no other coding tells where the body ends. Without it,
/// every `Content-Length` value must be the same non-negative integer, and
/// with neither header the request has no body.
fn parse_payload(headers: &HeaderMap) -> Result<PayloadSize, ParseError> {
    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#section-6.3
    if let Some(last) = headers.get_all(TRANSFER_ENCODING).iter().next_back() {
        ensure!(is_chunked(Some(last)), ParseError::unsupported_transfer_encoding(String::from_utf8_lossy(last.as_bytes())));
        return Ok(PayloadSize::Chunked);
    }

    let mut declared: Option<u64> = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let text = value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
        let length = text
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::invalid_content_length(format!("value {text} is not u64")))?;

        if let Some(first) = declared.filter(|first| *first != length) {
            return Err(ParseError::invalid_content_length(format!("conflicting values {first} and {length}")));
        }
        declared = Some(length);
    }

    Ok(PayloadSize::from_content_length(declared))
}

/// True when the last coding of a `Transfer-Encoding` value is `chunked`.
pub(crate) fn is_chunked(value: Option<&HeaderValue>) -> bool {
    value
        .and_then(|value| value.as_bytes().rsplit(|b| *b == b',').next())
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
