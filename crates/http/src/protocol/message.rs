use bytes::Bytes;

/// One step of a decoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    Chunk(Bytes),
    /// The body framing is complete; nothing past this point belongs to the body.
    Eof,
}

impl PayloadItem {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        !self.is_eof()
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Chunk(bytes) => Some(bytes),
            Self::Eof => None,
        }
    }
}

/// How the request body is framed, derived from its head.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// `Content-Length` greater than zero.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// No body at all, including `Content-Length: 0`.
    Empty,
}

impl PayloadSize {
    /// Framing for an optional, already validated `Content-Length`.
    pub fn from_content_length(length: Option<u64>) -> Self {
        match length {
            None | Some(0) => Self::Empty,
            Some(n) => Self::Length(n),
        }
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        *self == Self::Chunked
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::Empty
    }
}
