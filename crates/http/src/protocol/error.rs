use http::StatusCode;
use std::io;
use thiserror::Error;

/// Top level error surfaced by a connection.
///
/// Request-side failures (parsing, reading the body, read deadlines) are
/// [`ParseError`]s, response-side failures (writing, write deadlines, misuse
/// of a hijacked writer) are [`SendError`]s.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    /// Returns true for errors that are a normal part of a connection's life:
    /// the peer going away, a deadline expiring or a failed socket read.
    ///
    /// These end the connection quietly; everything else is reported to the
    /// configured diagnostics sink.
    pub fn is_lifecycle(&self) -> bool {
        match self {
            HttpError::RequestError { source } => source.is_lifecycle(),
            HttpError::ResponseError { source } => source.is_lifecycle(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid request line: {reason}")]
    InvalidLine { reason: String },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("unsupported transfer-encoding: {value}")]
    UnsupportedTransferEncoding { value: String },

    #[error("invalid chunked body: {reason}")]
    InvalidChunk { reason: &'static str },

    #[error("connection closed in the middle of a message")]
    UnexpectedEof,

    #[error("read deadline exceeded")]
    Timeout,

    #[error("read error: {source}")]
    Read {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_line<S: ToString>(str: S) -> Self {
        Self::InvalidLine { reason: str.to_string() }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn unsupported_transfer_encoding<S: ToString>(value: S) -> Self {
        Self::UnsupportedTransferEncoding { value: value.to_string() }
    }

    pub fn invalid_chunk(reason: &'static str) -> Self {
        Self::InvalidChunk { reason }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Read { source: e.into() }
    }

    pub fn is_invalid_line(&self) -> bool {
        matches!(self, ParseError::InvalidLine { .. })
    }

    /// Peer hang-ups, timeouts and socket read failures. A clean EOF between
    /// requests never becomes an error at all.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, ParseError::UnexpectedEof | ParseError::Timeout | ParseError::Read { .. })
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("connection has been hijacked")]
    Hijacked,

    #[error("connection was dropped before the hijack completed")]
    HijackCanceled,

    #[error("response status {status} does not allow a body")]
    BodyNotAllowed { status: StatusCode },

    #[error("write deadline exceeded")]
    Timeout,

    #[error("write error: {source}")]
    Write {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn body_not_allowed(status: StatusCode) -> Self {
        Self::BodyNotAllowed { status }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Write { source: e.into() }
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(self, SendError::Timeout)
    }
}
